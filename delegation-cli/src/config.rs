use crate::error::{CliError, Result};
use delegation::{default_key_dir, try_load_default_config, DelegationConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads the configuration named on the command line, or the first one found
/// in the standard locations, or the defaults.
pub fn load(path: Option<&Path>) -> Result<DelegationConfig> {
    let Some(path) = path else {
        return Ok(match try_load_default_config() {
            Some(config) => {
                debug!("using configuration from a standard location");
                config
            }
            None => DelegationConfig::default(),
        });
    };

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => DelegationConfig::from_file(path)?,
        Some("toml") => DelegationConfig::from_toml(path)?,
        Some("properties") => DelegationConfig::from_properties(path)?,
        _ => {
            return Err(CliError::InvalidInput(format!(
                "Unsupported configuration file {}: expected .json, .toml or .properties",
                path.display()
            )))
        }
    };
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Picks the key directory: the command line flag, then the configuration,
/// then `~/.delegation/keys` if it exists.
pub fn key_dir(flag: Option<PathBuf>, config: &DelegationConfig) -> Option<PathBuf> {
    flag.or_else(|| config.key_dir.clone())
        .or_else(|| default_key_dir().filter(|dir| dir.is_dir()))
}
