use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec;
use crate::error::TokenError;
use crate::identity::IdentitySet;
use crate::keys::KeyProvider;
use crate::token::DelegationToken;

/// TokenTimeConfig allows control over token creation times and durations
#[derive(Debug, Clone, Copy)]
pub struct TokenTimeConfig {
    /// Optional custom start time (now time override)
    pub start_time: Option<DateTime<Utc>>,
    /// Lifetime in seconds (default: 3600 seconds = 1 hour)
    pub duration: i64,
}

impl Default for TokenTimeConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            duration: 3600,
        }
    }
}

impl TokenTimeConfig {
    pub fn with_duration(duration: i64) -> Self {
        Self {
            start_time: None,
            duration,
        }
    }

    /// # Errors
    ///
    /// Returns `TokenError::InvalidArgument` if the expiry is not a representable time.
    pub fn expiry(&self) -> Result<DateTime<Utc>, TokenError> {
        let start = self.start_time.unwrap_or_else(Utc::now);
        Duration::try_seconds(self.duration)
            .and_then(|lifetime| start.checked_add_signed(lifetime))
            .ok_or_else(|| {
                TokenError::invalid_argument(format!(
                    "token lifetime of {} seconds is out of range",
                    self.duration
                ))
            })
    }
}

/// Creates delegation tokens on behalf of already authenticated identities.
///
/// Tokens are signed when the key provider has a signing key and go out
/// unsigned otherwise.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Option<Arc<dyn KeyProvider>>,
    time_config: TokenTimeConfig,
}

impl TokenIssuer {
    pub fn new(keys: Option<Arc<dyn KeyProvider>>) -> Self {
        Self {
            keys,
            time_config: TokenTimeConfig::default(),
        }
    }

    pub fn with_time_config(mut self, time_config: TokenTimeConfig) -> Self {
        self.time_config = time_config;
        self
    }

    pub fn signs(&self) -> bool {
        self.keys
            .as_ref()
            .is_some_and(|keys| keys.signing_key().is_some())
    }

    /// Builds the token entity using the issuer's default lifetime.
    pub fn create(
        &self,
        identities: impl Into<IdentitySet>,
        scope: &str,
        domains: Option<Vec<String>>,
    ) -> Result<DelegationToken, TokenError> {
        self.create_with_time(identities, scope, domains, self.time_config)
    }

    pub fn create_with_time(
        &self,
        identities: impl Into<IdentitySet>,
        scope: &str,
        domains: Option<Vec<String>>,
        time_config: TokenTimeConfig,
    ) -> Result<DelegationToken, TokenError> {
        DelegationToken::new(identities, scope, time_config.expiry()?, domains)
    }

    /// Creates and encodes a token in one step.
    ///
    /// # Arguments
    ///
    /// * `identities` - The delegated principals
    /// * `scope` - URI the token may be used for
    /// * `domains` - Optional host suffixes that may present the token
    ///
    /// # Returns
    ///
    /// The `base64:` envelope, signed if a signing key is available
    pub fn issue(
        &self,
        identities: impl Into<IdentitySet>,
        scope: &str,
        domains: Option<Vec<String>>,
    ) -> Result<String, TokenError> {
        let token = self.create(identities, scope, domains)?;
        self.format(&token)
    }

    /// Encodes an existing token, signing it when possible.
    pub fn format(&self, token: &DelegationToken) -> Result<String, TokenError> {
        let signing_key = self.keys.as_ref().and_then(|keys| keys.signing_key());
        if signing_key.is_none() && !token.is_signed() {
            warn!(scope = %token.scope(), "issuing unsigned delegation token");
        }

        let encoded = codec::encode(token, signing_key)?;
        info!(
            scope = %token.scope(),
            expiry = %token.expiry(),
            identities = token.identities().len(),
            signed = signing_key.is_some() || token.is_signed(),
            "issued delegation token"
        );
        Ok(encoded)
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("signs", &self.signs())
            .field("time_config", &self.time_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::keys::tests::issuer_keys;
    use crate::verify::TokenValidator;

    fn user() -> Identity {
        Identity::username("test@test.com").unwrap()
    }

    #[test]
    fn test_issue_signed() {
        let keys: Arc<dyn KeyProvider> = Arc::new(issuer_keys());
        let issuer = TokenIssuer::new(Some(keys.clone()));
        assert!(issuer.signs());

        let token = issuer.issue(user(), "ivo://cadc.nrc.ca/vault", None).unwrap();
        let validator = TokenValidator::builder()
            .keys(keys)
            .require_signature(true)
            .build()
            .unwrap();
        let parsed = validator
            .parse(&token, Some("ivo://cadc.nrc.ca/vault"))
            .unwrap();
        assert_eq!(parsed.identities().username(), Some("test@test.com"));
    }

    #[test]
    fn test_issue_unsigned() {
        let issuer = TokenIssuer::new(None);
        assert!(!issuer.signs());
        let token = issuer.issue(user(), "foo:bar", None).unwrap();
        let parsed = TokenValidator::new().parse(&token, Some("foo:bar")).unwrap();
        assert!(!parsed.is_signed());
    }

    #[test]
    fn test_default_lifetime() {
        let before = Utc::now();
        let token = TokenIssuer::new(None).create(user(), "foo:bar", None).unwrap();
        let lifetime = token.expiry() - before;
        assert!(lifetime <= Duration::seconds(3600));
        assert!(lifetime > Duration::seconds(3590));
    }

    #[test]
    fn test_custom_time_config() {
        let start = Utc::now() - Duration::hours(2);
        let issuer = TokenIssuer::new(None).with_time_config(TokenTimeConfig {
            start_time: Some(start),
            duration: 300,
        });
        let token = issuer.issue(user(), "foo:bar", None).unwrap();
        assert!(TokenValidator::new().parse(&token, Some("foo:bar")).is_err());

        let token = issuer
            .create_with_time(user(), "foo:bar", None, TokenTimeConfig::with_duration(60))
            .unwrap();
        assert!(!token.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_out_of_range_lifetime() {
        let err = TokenIssuer::new(None)
            .create_with_time(user(), "foo:bar", None, TokenTimeConfig::with_duration(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidArgument(_)));
    }
}
