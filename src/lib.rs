//! # Delegation SDK
//!
//! A Rust library for services that act on behalf of an authenticated user
//! when calling other services.
//!
//! The SDK turns a [`DelegationConfig`] into a ready [`DelegationService`]:
//! keys are loaded once from the configured directory, the scope validator is
//! picked by name and issued tokens get the configured lifetime.
//!
//! This crate combines functionality from:
//! - `delegation-token`: Identity model, token codec, signatures and validation
//! - `delegation-config`: Configuration management
//!
//! ## Feature Flags
//!
//! - `toml`: Enables configuration loading from TOML files (on by default)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use delegation::{DelegationConfig, DelegationService, Identity};
//!
//! # fn example() -> Result<(), delegation::SdkError> {
//! let config = DelegationConfig::builder()
//!     .key_dir("/etc/delegation/keys")
//!     .require_signature(true)
//!     .build()?;
//! let service = DelegationService::from_config(&config)?;
//!
//! // Issue a token for a user the caller has already authenticated
//! let token = service.issue(
//!     Identity::username("someuser")?,
//!     "ivo://cadc.nrc.ca/vault",
//!     None,
//! )?;
//!
//! // Downstream, with the same configuration
//! let accepted = service.parse(&token, Some("ivo://cadc.nrc.ca/vault"))?;
//! assert_eq!(accepted.identities().username(), Some("someuser"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom scope policies
//!
//! Register a validator under a name and refer to that name from
//! configuration:
//!
//! ```
//! use std::sync::Arc;
//! use delegation::{
//!     DelegationConfig, DelegationService, ScopeRejection, ScopeValidator,
//!     ScopeValidatorRegistry, Url,
//! };
//!
//! # fn example() -> Result<(), delegation::SdkError> {
//! let mut registry = ScopeValidatorRegistry::new();
//! registry.register("vault-only", || {
//!     Arc::new(|scope: &Url, _target: Option<&str>| {
//!         if scope.as_str().starts_with("ivo://cadc.nrc.ca/vault") {
//!             Ok(())
//!         } else {
//!             Err(ScopeRejection::new(format!("{scope} is not a vault scope")))
//!         }
//!     }) as Arc<dyn ScopeValidator>
//! });
//!
//! let config = DelegationConfig::builder().scope_validator("vault-only").build()?;
//! let service = DelegationService::with_registry(&config, &registry)?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod service;

pub use service::{DelegationService, DelegationServiceBuilder};

// Re-export everything from the component crates
pub use delegation_token::{
    // Codec
    decode,
    encode,
    sign_token,
    unsigned_fields,
    DecodedToken,
    // Token entity and identities
    DelegationToken,
    // Scope policies
    ExactScopeValidator,
    Identity,
    IdentitySet,
    IdentityType,
    // Errors
    InvalidDelegationToken,
    // Keys
    KeyProvider,
    KeyRing,
    PrefixScopeValidator,
    RsaPrivateKey,
    RsaPublicKey,
    ScopeRejection,
    ScopeValidator,
    ScopeValidatorRegistry,
    TokenError,
    // Issuing and validating
    TokenIssuer,
    TokenTimeConfig,
    TokenValidator,
    TokenValidatorBuilder,
    Url,
    Uuid,
    ValidationStage,
    DEFAULT_KEY_BITS,
    PRIV_KEY_FILE_NAME,
    PUB_KEY_FILE_NAME,
    TOKEN_PREFIX,
};

pub use delegation_config::{
    default_key_dir, try_load_default_config, ConfigError, DelegationConfig,
    DelegationConfigBuilder, SCOPE_VALIDATOR_PROPERTY,
};

/// Errors that can occur in the delegation SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Token error, including rejected tokens
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl SdkError {
    /// The rejection reason if a token failed validation
    pub fn rejection(&self) -> Option<&InvalidDelegationToken> {
        match self {
            SdkError::Token(e) => e.rejection(),
            SdkError::Config(_) => None,
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        self.rejection().is_some()
    }
}

impl From<InvalidDelegationToken> for SdkError {
    fn from(error: InvalidDelegationToken) -> Self {
        SdkError::Token(error.into())
    }
}
