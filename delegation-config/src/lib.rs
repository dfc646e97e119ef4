//! # Delegation Config
//!
//! Settings for services that issue or accept delegation tokens: which scope
//! policy to apply, where the RSA key pair lives, whether unsigned tokens are
//! acceptable and how long issued tokens last.
//!
//! Configuration can be built in code or loaded from JSON, TOML, a Java-style
//! properties file or environment variables.
//!
//! ```no_run
//! use delegation_config::DelegationConfig;
//!
//! let config = DelegationConfig::builder()
//!     .scope_validator("prefix")
//!     .key_dir("/etc/delegation/keys")
//!     .require_signature(true)
//!     .build()
//!     .expect("invalid configuration");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Property naming the scope validator in a properties file.
pub const SCOPE_VALIDATOR_PROPERTY: &str = "delegation_token::DelegationToken.scopeValidator";
pub const KEY_DIR_PROPERTY: &str = "delegation_token::DelegationToken.keyDir";
pub const REQUIRE_SIGNATURE_PROPERTY: &str = "delegation_token::DelegationToken.requireSignature";
pub const LIFETIME_PROPERTY: &str = "delegation_token::DelegationToken.lifetime";
pub const CLOCK_SKEW_PROPERTY: &str = "delegation_token::DelegationToken.clockSkew";

pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

// Keeps the lifetime representable as a chrono duration in milliseconds.
const MAX_SECS: u64 = (i64::MAX / 1000) as u64;

/// Configuration for issuing and validating delegation tokens
///
/// Every field has a usable default: exact scope matching, no keys (tokens go
/// out unsigned and unsigned tokens are accepted), a one hour lifetime and no
/// clock skew allowance. Once a verification key is configured, unsigned
/// tokens are refused unless `require_signature` is explicitly `false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Registered name of the scope validator (`exact`, `prefix`, or a custom one)
    #[serde(default)]
    pub scope_validator: Option<String>,
    /// Directory holding `DelegationPriv.key` and/or `DelegationPub.key`
    #[serde(default)]
    pub key_dir: Option<PathBuf>,
    /// Reject tokens that carry no signature.
    ///
    /// Unset means "required whenever a verification key is available"; see
    /// [`DelegationConfig::requires_signature`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_signature: Option<bool>,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    /// Seconds a token may be past its expiry and still be accepted
    #[serde(default)]
    pub clock_skew_secs: u64,
}

fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            scope_validator: None,
            key_dir: None,
            require_signature: None,
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            clock_skew_secs: 0,
        }
    }
}

/// Builder for DelegationConfig
///
/// ```
/// use delegation_config::DelegationConfig;
///
/// let config = DelegationConfig::builder()
///     .token_lifetime_secs(600)
///     .clock_skew_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.token_lifetime_secs, 600);
///
/// // Start over from an existing configuration
/// let strict = config.to_builder().require_signature(true).build().unwrap();
/// assert_eq!(strict.require_signature, Some(true));
/// ```
#[derive(Default, Debug)]
pub struct DelegationConfigBuilder {
    config: DelegationConfig,
}

impl DelegationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DelegationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Set the scope validator by registered name
    pub fn scope_validator(mut self, name: impl Into<String>) -> Self {
        self.config.scope_validator = Some(name.into());
        self
    }

    /// Set the directory the key pair is loaded from
    pub fn key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.key_dir = Some(dir.into());
        self
    }

    pub fn require_signature(mut self, require: bool) -> Self {
        self.config.require_signature = Some(require);
        self
    }

    pub fn token_lifetime_secs(mut self, secs: u64) -> Self {
        self.config.token_lifetime_secs = secs;
        self
    }

    pub fn clock_skew_secs(mut self, secs: u64) -> Self {
        self.config.clock_skew_secs = secs;
        self
    }

    /// Build the configuration, validating every field
    pub fn build(self) -> Result<DelegationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Errors that can occur when working with delegation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyScopeValidator,
    EmptyKeyDir,
    InvalidLifetime(u64),
    InvalidClockSkew(u64),
    InvalidValue { key: String, value: String },
    IOError(String),
    ParseError(String),
    EnvVarError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyScopeValidator => {
                write!(f, "Scope validator name is empty. Remove the setting to use exact scope matching or name a registered validator.")
            }
            ConfigError::EmptyKeyDir => {
                write!(f, "Key directory is empty. Remove the setting or point it at the directory holding the delegation key pair.")
            }
            ConfigError::InvalidLifetime(secs) => {
                write!(
                    f,
                    "Invalid token lifetime of {} seconds. Lifetime must be between 1 and {} seconds.",
                    secs, MAX_SECS
                )
            }
            ConfigError::InvalidClockSkew(secs) => {
                write!(
                    f,
                    "Invalid clock skew of {} seconds. Skew must not exceed {} seconds.",
                    secs, MAX_SECS
                )
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for {}.", value, key)
            }
            ConfigError::IOError(e) => {
                write!(f, "I/O error occurred while reading configuration: {}. Please check file permissions and paths.", e)
            }
            ConfigError::ParseError(e) => {
                write!(f, "Failed to parse configuration data: {}. Please ensure the configuration format is correct.", e)
            }
            ConfigError::EnvVarError(e) => {
                write!(f, "Environment variable error: {}. Please ensure the environment variables are set correctly.", e)
            }
        }
    }
}

impl Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

impl DelegationConfig {
    pub fn builder() -> DelegationConfigBuilder {
        DelegationConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> DelegationConfigBuilder {
        DelegationConfigBuilder::from_config(self)
    }

    /// Whether unsigned tokens are refused, given whether a verification key
    /// is available. An explicit setting wins; otherwise a deployment that can
    /// verify signatures insists on them.
    pub fn requires_signature(&self, has_verification_key: bool) -> bool {
        self.require_signature.unwrap_or(has_verification_key)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: DelegationConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: DelegationConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a Java-style properties file
    ///
    /// Recognised keys are [`SCOPE_VALIDATOR_PROPERTY`], [`KEY_DIR_PROPERTY`],
    /// [`REQUIRE_SIGNATURE_PROPERTY`], [`LIFETIME_PROPERTY`] (seconds) and
    /// [`CLOCK_SKEW_PROPERTY`] (seconds). Other keys are ignored so the file
    /// can be shared with other components.
    ///
    /// ```
    /// use delegation_config::{DelegationConfig, SCOPE_VALIDATOR_PROPERTY};
    ///
    /// let text = format!("# token settings\n{} = prefix\n", SCOPE_VALIDATOR_PROPERTY);
    /// let config = DelegationConfig::from_properties_str(&text).unwrap();
    /// assert_eq!(config.scope_validator.as_deref(), Some("prefix"));
    /// ```
    pub fn from_properties(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        Self::from_properties_str(&file_content)
    }

    pub fn from_properties_str(text: &str) -> Result<Self, ConfigError> {
        let properties = parse_properties(text);
        let mut config = DelegationConfig::default();

        if let Some(name) = properties.get(SCOPE_VALIDATOR_PROPERTY) {
            config.scope_validator = Some(name.clone());
        }
        if let Some(dir) = properties.get(KEY_DIR_PROPERTY) {
            config.key_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = properties.get(REQUIRE_SIGNATURE_PROPERTY) {
            config.require_signature = Some(parse_bool(REQUIRE_SIGNATURE_PROPERTY, value)?);
        }
        if let Some(value) = properties.get(LIFETIME_PROPERTY) {
            config.token_lifetime_secs = parse_secs(LIFETIME_PROPERTY, value)?;
        }
        if let Some(value) = properties.get(CLOCK_SKEW_PROPERTY) {
            config.clock_skew_secs = parse_secs(CLOCK_SKEW_PROPERTY, value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from environment variables
    ///
    /// The environment variables should be named with the given prefix followed by:
    /// - SCOPE_VALIDATOR: Registered scope validator name
    /// - KEY_DIR: Directory holding the key pair
    /// - REQUIRE_SIGNATURE: `true` or `false`
    /// - TOKEN_LIFETIME: Token lifetime in seconds
    /// - CLOCK_SKEW: Allowed clock skew in seconds
    ///
    /// All variables are optional; unset ones keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a variable is set but invalid.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let mut config = DelegationConfig::default();

        if let Some(name) = read_env(prefix, "SCOPE_VALIDATOR")? {
            config.scope_validator = Some(name);
        }
        if let Some(dir) = read_env(prefix, "KEY_DIR")? {
            config.key_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = read_env(prefix, "REQUIRE_SIGNATURE")? {
            config.require_signature =
                Some(parse_bool(&format!("{}_REQUIRE_SIGNATURE", prefix), &value)?);
        }
        if let Some(value) = read_env(prefix, "TOKEN_LIFETIME")? {
            config.token_lifetime_secs = parse_secs(&format!("{}_TOKEN_LIFETIME", prefix), &value)?;
        }
        if let Some(value) = read_env(prefix, "CLOCK_SKEW")? {
            config.clock_skew_secs = parse_secs(&format!("{}_CLOCK_SKEW", prefix), &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .scope_validator
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigError::EmptyScopeValidator);
        }

        if self
            .key_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::EmptyKeyDir);
        }

        if self.token_lifetime_secs == 0 || self.token_lifetime_secs > MAX_SECS {
            return Err(ConfigError::InvalidLifetime(self.token_lifetime_secs));
        }

        if self.clock_skew_secs > MAX_SECS {
            return Err(ConfigError::InvalidClockSkew(self.clock_skew_secs));
        }

        Ok(())
    }
}

/// Default location of the key pair: `~/.delegation/keys`
pub fn default_key_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".delegation").join("keys"))
}

fn read_env(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(format!("{}_{}", prefix, name)) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn env_is_set(prefix: &str) -> bool {
    [
        "SCOPE_VALIDATOR",
        "KEY_DIR",
        "REQUIRE_SIGNATURE",
        "TOKEN_LIFETIME",
        "CLOCK_SKEW",
    ]
    .iter()
    .any(|name| env::var_os(format!("{}_{}", prefix, name)).is_some())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parses `key = value` / `key: value` lines.
///
/// Blank lines and lines starting with `#` or `!` are skipped, a trailing
/// backslash continues the value on the next line. A `:` only separates when
/// it is not part of a `::` path, so Rust paths work as keys. Later entries
/// win.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        let trailing = line.len() - line.trim_end_matches('\\').len();
        if trailing % 2 == 1 {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);

        if let Some((key, value)) = split_property(&pending) {
            properties.insert(key.to_string(), value.to_string());
        }
        pending.clear();
    }
    if let Some((key, value)) = split_property(&pending) {
        properties.insert(key.to_string(), value.to_string());
    }

    properties
}

fn split_property(line: &str) -> Option<(&str, &str)> {
    if line.trim().is_empty() {
        return None;
    }
    let bytes = line.as_bytes();
    let separator = bytes.iter().enumerate().position(|(i, &b)| {
        b == b'='
            || (b == b':'
                && bytes.get(i + 1) != Some(&b':')
                && (i == 0 || bytes[i - 1] != b':'))
    });

    match separator {
        Some(i) => Some((line[..i].trim(), line[i + 1..].trim())),
        None => Some((line.trim(), "")),
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(PathBuf::from(path)),
    }
}

/// Try to load a configuration from standard locations
///
/// This function attempts to load a configuration from:
/// 1. Environment variables with the prefix "DELEGATION", if any is set
/// 2. A file at ./delegation.json
/// 3. A file at ~/.delegation/config.json
/// 4. A file at /etc/delegation/config.json
/// 5. If the "toml" feature is enabled, TOML files at the same paths
///
/// Returns None if no configuration could be found.
pub fn try_load_default_config() -> Option<DelegationConfig> {
    if env_is_set("DELEGATION") {
        if let Ok(config) = DelegationConfig::from_env("DELEGATION") {
            return Some(config);
        }
    }

    let paths = [
        "./delegation.json",
        "~/.delegation/config.json",
        "/etc/delegation/config.json",
    ];

    for path in paths.iter() {
        let Some(expanded_path) = expand_home(path) else {
            continue;
        };
        if expanded_path.exists() {
            if let Ok(config) = DelegationConfig::from_file(&expanded_path) {
                return Some(config);
            }
        }
    }

    #[cfg(feature = "toml")]
    {
        let toml_paths = [
            "./delegation.toml",
            "~/.delegation/config.toml",
            "/etc/delegation/config.toml",
        ];

        for path in toml_paths.iter() {
            let Some(expanded_path) = expand_home(path) else {
                continue;
            };
            if expanded_path.exists() {
                if let Ok(config) = DelegationConfig::from_toml(&expanded_path) {
                    return Some(config);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DelegationConfig::default();
        assert_eq!(config.scope_validator, None);
        assert_eq!(config.key_dir, None);
        assert_eq!(config.require_signature, None);
        assert_eq!(config.token_lifetime_secs, 3600);
        assert_eq!(config.clock_skew_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DelegationConfig::builder()
            .scope_validator("prefix")
            .key_dir("/tmp/keys")
            .require_signature(true)
            .token_lifetime_secs(60)
            .clock_skew_secs(5)
            .build()
            .unwrap();

        assert_eq!(config.scope_validator.as_deref(), Some("prefix"));
        assert_eq!(config.key_dir, Some(PathBuf::from("/tmp/keys")));
        assert_eq!(config.require_signature, Some(true));
        assert_eq!(config.token_lifetime_secs, 60);
        assert_eq!(config.clock_skew_secs, 5);

        let copy = config.to_builder().build().unwrap();
        assert_eq!(copy, config);
    }

    #[test]
    fn test_signature_required_once_keys_exist() {
        let config = DelegationConfig::default();
        assert!(!config.requires_signature(false));
        assert!(config.requires_signature(true));

        let opted_out = config.to_builder().require_signature(false).build().unwrap();
        assert!(!opted_out.requires_signature(true));

        let strict = config.to_builder().require_signature(true).build().unwrap();
        assert!(strict.requires_signature(false));
    }

    #[test]
    fn test_validation() {
        match DelegationConfig::builder().scope_validator("  ").build() {
            Err(ConfigError::EmptyScopeValidator) => {}
            other => panic!("Expected EmptyScopeValidator, got {:?}", other),
        }
        match DelegationConfig::builder().key_dir("").build() {
            Err(ConfigError::EmptyKeyDir) => {}
            other => panic!("Expected EmptyKeyDir, got {:?}", other),
        }
        match DelegationConfig::builder().token_lifetime_secs(0).build() {
            Err(ConfigError::InvalidLifetime(0)) => {}
            other => panic!("Expected InvalidLifetime, got {:?}", other),
        }
        assert!(DelegationConfig::builder()
            .clock_skew_secs(u64::MAX)
            .build()
            .is_err());
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("delegation.json");
        fs::write(
            &file_path,
            r#"{
                "scope_validator": "prefix",
                "key_dir": "/srv/keys",
                "require_signature": true
            }"#,
        )
        .unwrap();

        let config = DelegationConfig::from_file(&file_path).unwrap();
        assert_eq!(config.scope_validator.as_deref(), Some("prefix"));
        assert_eq!(config.key_dir, Some(PathBuf::from("/srv/keys")));
        assert_eq!(config.require_signature, Some(true));
        assert_eq!(config.token_lifetime_secs, DEFAULT_TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn test_from_file_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            DelegationConfig::from_file(&missing),
            Err(ConfigError::IOError(_))
        ));

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            DelegationConfig::from_file(&broken),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("delegation.toml");
        fs::write(
            &file_path,
            "scope_validator = \"exact\"\ntoken_lifetime_secs = 120\nclock_skew_secs = 10\n",
        )
        .unwrap();

        let config = DelegationConfig::from_toml(&file_path).unwrap();
        assert_eq!(config.scope_validator.as_deref(), Some("exact"));
        assert_eq!(config.token_lifetime_secs, 120);
        assert_eq!(config.clock_skew_secs, 10);
        assert_eq!(config.require_signature, None);
    }

    #[test]
    fn test_from_properties() {
        let text = format!(
            "# delegation settings\n\
             ! legacy comment\n\
             \n\
             {SCOPE_VALIDATOR_PROPERTY} = my_service::FooBarValidator\n\
             {KEY_DIR_PROPERTY}: /srv/keys\n\
             {REQUIRE_SIGNATURE_PROPERTY}=TRUE\n\
             {LIFETIME_PROPERTY} = 7200\n\
             other.component.setting = ignored\n"
        );
        let config = DelegationConfig::from_properties_str(&text).unwrap();
        assert_eq!(
            config.scope_validator.as_deref(),
            Some("my_service::FooBarValidator")
        );
        assert_eq!(config.key_dir, Some(PathBuf::from("/srv/keys")));
        assert_eq!(config.require_signature, Some(true));
        assert_eq!(config.token_lifetime_secs, 7200);
        assert_eq!(config.clock_skew_secs, 0);
    }

    #[test]
    fn test_properties_file_and_bad_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("delegation.properties");
        fs::write(&file_path, format!("{CLOCK_SKEW_PROPERTY} = 30\n")).unwrap();
        let config = DelegationConfig::from_properties(&file_path).unwrap();
        assert_eq!(config.clock_skew_secs, 30);

        let bad = format!("{REQUIRE_SIGNATURE_PROPERTY} = maybe\n");
        match DelegationConfig::from_properties_str(&bad) {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, REQUIRE_SIGNATURE_PROPERTY);
                assert_eq!(value, "maybe");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }

        let bad = format!("{LIFETIME_PROPERTY} = -5\n");
        assert!(DelegationConfig::from_properties_str(&bad).is_err());
    }

    #[test]
    fn test_parse_properties() {
        let properties = parse_properties(
            "a = 1\n  b:2\nc\nd = first \\\n    second\na = 3\n# e = 4\nf::g = 5\n",
        );
        assert_eq!(properties.get("a").map(String::as_str), Some("3"));
        assert_eq!(properties.get("b").map(String::as_str), Some("2"));
        assert_eq!(properties.get("c").map(String::as_str), Some(""));
        assert_eq!(properties.get("d").map(String::as_str), Some("first second"));
        assert_eq!(properties.get("f::g").map(String::as_str), Some("5"));
        assert!(!properties.contains_key("e"));
        assert!(!properties.contains_key("# e"));
    }

    #[test]
    fn test_from_env() {
        env::set_var("DELEGCFG_ENV_SCOPE_VALIDATOR", "prefix");
        env::set_var("DELEGCFG_ENV_KEY_DIR", "/var/lib/delegation");
        env::set_var("DELEGCFG_ENV_REQUIRE_SIGNATURE", "yes");
        env::set_var("DELEGCFG_ENV_TOKEN_LIFETIME", "900");

        let config = DelegationConfig::from_env("DELEGCFG_ENV").unwrap();
        assert_eq!(config.scope_validator.as_deref(), Some("prefix"));
        assert_eq!(config.key_dir, Some(PathBuf::from("/var/lib/delegation")));
        assert_eq!(config.require_signature, Some(true));
        assert_eq!(config.token_lifetime_secs, 900);
        assert_eq!(config.clock_skew_secs, 0);
        assert!(env_is_set("DELEGCFG_ENV"));
    }

    #[test]
    fn test_from_env_invalid_and_empty() {
        env::set_var("DELEGCFG_BAD_TOKEN_LIFETIME", "soon");
        assert!(matches!(
            DelegationConfig::from_env("DELEGCFG_BAD"),
            Err(ConfigError::InvalidValue { .. })
        ));

        assert!(!env_is_set("DELEGCFG_UNSET"));
        assert_eq!(
            DelegationConfig::from_env("DELEGCFG_UNSET").unwrap(),
            DelegationConfig::default()
        );
    }

    #[test]
    fn test_error_display() {
        let message = ConfigError::InvalidLifetime(0).to_string();
        assert!(message.contains("0 seconds"));
        let message = ConfigError::InvalidValue {
            key: "K".to_string(),
            value: "v".to_string(),
        }
        .to_string();
        assert_eq!(message, "Invalid value 'v' for K.");
    }

    #[test]
    fn test_default_key_dir() {
        if let Some(dir) = default_key_dir() {
            assert!(dir.ends_with(".delegation/keys"));
        }
    }
}
