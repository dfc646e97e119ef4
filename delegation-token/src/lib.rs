//! # Delegation Token
//!
//! Compact bearer credentials that let one service act on behalf of an
//! authenticated identity when calling another service.
//!
//! A token names one or more identities, a scope URI, an expiry and an
//! optional list of domains. It is optionally signed with RSA and travels as
//! `base64:<...>`, a string that is safe to put in an HTTP cookie.
//!
//! ## Features
//!
//! - Identity model: usernames (optionally acting as another user), X.509 subjects, numeric ids
//! - Codec: deterministic field string, signature, base64 envelope, strict parsing
//! - Validation: signature, expiry and a pluggable scope policy
//! - Key handling: RSA key pairs from PEM text or a key directory
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use delegation_token::{Identity, KeyProvider, KeyRing, TokenIssuer, TokenValidator};
//!
//! fn main() -> Result<(), delegation_token::TokenError> {
//!     let keys: Arc<dyn KeyProvider> = Arc::new(KeyRing::from_dir("/etc/delegation/keys")?);
//!
//!     // Issue a token for an authenticated user
//!     let issuer = TokenIssuer::new(Some(keys.clone()));
//!     let token = issuer.issue(Identity::username("someuser")?, "ivo://cadc.nrc.ca/vault", None)?;
//!
//!     // Validate it on the receiving side
//!     let validator = TokenValidator::builder().keys(keys).build()?;
//!     let validated = validator.parse(&token, Some("ivo://cadc.nrc.ca/vault"))?;
//!
//!     println!("acting for {:?}", validated.identities().username());
//!     Ok(())
//! }
//! ```

pub mod codec;
mod error;
mod identity;
mod keys;
mod mint;
mod scope;
pub mod signature;
mod token;
mod verify;

pub use codec::{decode, encode, sign_token, unsigned_fields, DecodedToken, TOKEN_PREFIX};
pub use error::{InvalidDelegationToken, ScopeRejection, TokenError};
pub use identity::{Identity, IdentitySet, IdentityType};
pub use keys::{KeyProvider, KeyRing, DEFAULT_KEY_BITS, PRIV_KEY_FILE_NAME, PUB_KEY_FILE_NAME};
pub use mint::{TokenIssuer, TokenTimeConfig};
pub use scope::{ExactScopeValidator, PrefixScopeValidator, ScopeValidator, ScopeValidatorRegistry};
pub use token::DelegationToken;
pub use verify::{TokenValidator, TokenValidatorBuilder, ValidationStage};

// Re-export key and URI types that appear in the public API
pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use url::Url;
pub use uuid::Uuid;
