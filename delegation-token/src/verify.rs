use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::codec::{self, DecodedToken};
use crate::error::{InvalidDelegationToken, TokenError};
use crate::keys::KeyProvider;
use crate::scope::{ExactScopeValidator, ScopeValidator};
use crate::signature;
use crate::token::DelegationToken;

/// Steps a received token goes through before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Decoded,
    SignatureChecked,
    NotExpired,
    ScopeChecked,
    Valid,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Decoded => "decode",
            ValidationStage::SignatureChecked => "signature",
            ValidationStage::NotExpired => "expiry",
            ValidationStage::ScopeChecked => "scope",
            ValidationStage::Valid => "valid",
        };
        f.write_str(name)
    }
}

/// Checks received tokens: structure, signature, expiry, then scope.
///
/// Validation is a pure decision over the token text, the configured keys and
/// the clock. Nothing is retried; a refused token has to be replaced by a
/// fresh one. A validator is cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct TokenValidator {
    keys: Option<Arc<dyn KeyProvider>>,
    scope_validator: Arc<dyn ScopeValidator>,
    require_signature: bool,
    clock_skew: Duration,
}

impl TokenValidator {
    /// A validator without keys using the exact scope policy.
    pub fn new() -> Self {
        Self {
            keys: None,
            scope_validator: Arc::new(ExactScopeValidator),
            require_signature: false,
            clock_skew: Duration::zero(),
        }
    }

    pub fn builder() -> TokenValidatorBuilder {
        TokenValidatorBuilder::default()
    }

    /// Decodes a token and checks its signature, without looking at expiry or scope.
    ///
    /// Useful for inspecting a token's contents.
    pub fn decode(&self, token: &str) -> Result<DelegationToken, TokenError> {
        let decoded = codec::decode(token).map_err(|e| rejected(ValidationStage::Decoded, e))?;
        self.check_signature(&decoded)
            .map_err(|e| rejected(ValidationStage::SignatureChecked, e.into()))?;
        Ok(decoded.token)
    }

    /// Runs the full validation pipeline against the current time.
    ///
    /// # Arguments
    ///
    /// * `token` - The envelope string as received
    /// * `target` - URI of the resource being accessed, handed to the scope validator
    ///
    /// # Returns
    ///
    /// * `Ok(DelegationToken)` - The validated token
    /// * `Err(TokenError::InvalidToken)` - The reason the token was refused
    pub fn parse(&self, token: &str, target: Option<&str>) -> Result<DelegationToken, TokenError> {
        self.parse_at(token, target, Utc::now())
    }

    /// Same as [`TokenValidator::parse`] with an explicit clock.
    pub fn parse_at(
        &self,
        token: &str,
        target: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DelegationToken, TokenError> {
        let token = self.decode(token)?;

        let deadline = now
            .checked_sub_signed(self.clock_skew)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if token.is_expired_at(deadline) {
            return Err(rejected(
                ValidationStage::NotExpired,
                InvalidDelegationToken::Expired {
                    expiry: token.expiry(),
                }
                .into(),
            ));
        }

        self.scope_validator
            .verify_scope(token.scope(), target)
            .map_err(|e| {
                rejected(
                    ValidationStage::ScopeChecked,
                    InvalidDelegationToken::from(e).into(),
                )
            })?;

        debug!(
            stage = %ValidationStage::Valid,
            scope = %token.scope(),
            signed = token.is_signed(),
            "accepted delegation token"
        );
        Ok(token)
    }

    pub fn requires_signature(&self) -> bool {
        self.require_signature
    }

    fn check_signature(&self, decoded: &DecodedToken) -> Result<(), InvalidDelegationToken> {
        let Some(sig) = decoded.token.signature() else {
            return if self.require_signature {
                Err(InvalidDelegationToken::MissingSignature)
            } else {
                Ok(())
            };
        };

        let key = self
            .keys
            .as_ref()
            .and_then(|keys| keys.verification_key())
            .ok_or(InvalidDelegationToken::NoVerificationKey)?;

        if signature::verify(&decoded.signed_content, sig, key) {
            Ok(())
        } else {
            Err(InvalidDelegationToken::InvalidSignature)
        }
    }
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("has_keys", &self.keys.is_some())
            .field("require_signature", &self.require_signature)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

fn rejected(stage: ValidationStage, err: TokenError) -> TokenError {
    debug!(%stage, reason = %err, "rejected delegation token");
    err
}

/// Builder for [`TokenValidator`]
#[derive(Default)]
pub struct TokenValidatorBuilder {
    keys: Option<Arc<dyn KeyProvider>>,
    scope_validator: Option<Arc<dyn ScopeValidator>>,
    require_signature: bool,
    clock_skew: Option<Duration>,
}

impl TokenValidatorBuilder {
    /// Key provider whose verification key checks signatures
    pub fn keys(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn scope_validator(mut self, validator: Arc<dyn ScopeValidator>) -> Self {
        self.scope_validator = Some(validator);
        self
    }

    /// Refuse tokens that carry no signature
    pub fn require_signature(mut self, require: bool) -> Self {
        self.require_signature = require;
        self
    }

    /// Grace period applied when comparing expiry with the clock
    pub fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = Some(skew);
        self
    }

    /// # Errors
    ///
    /// Returns `TokenError::InvalidArgument` when signatures are required but
    /// no verification key is available, or the clock skew is negative.
    pub fn build(self) -> Result<TokenValidator, TokenError> {
        let has_verification_key = self
            .keys
            .as_ref()
            .is_some_and(|keys| keys.verification_key().is_some());
        if self.require_signature && !has_verification_key {
            return Err(TokenError::invalid_argument(
                "signatures are required but no verification key is configured",
            ));
        }

        let clock_skew = self.clock_skew.unwrap_or_else(Duration::zero);
        if clock_skew < Duration::zero() {
            return Err(TokenError::invalid_argument("clock skew must not be negative"));
        }

        Ok(TokenValidator {
            keys: self.keys,
            scope_validator: self
                .scope_validator
                .unwrap_or_else(|| Arc::new(ExactScopeValidator)),
            require_signature: self.require_signature,
            clock_skew,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScopeRejection;
    use crate::identity::Identity;
    use crate::keys::tests::{issuer_keys, other_keys, ISSUER_PUBLIC_PEM};
    use crate::keys::KeyRing;
    use url::Url;

    fn token(scope: &str, expiry: DateTime<Utc>) -> DelegationToken {
        DelegationToken::new(
            Identity::username_as("someuser", "someproxyuser").unwrap(),
            scope,
            expiry,
            None,
        )
        .unwrap()
    }

    fn foo_bar_validator() -> Arc<dyn ScopeValidator> {
        Arc::new(|scope: &Url, target: Option<&str>| {
            if scope.as_str() == "foo:bar" {
                return Ok(());
            }
            ExactScopeValidator.verify_scope(scope, target)
        })
    }

    fn signed(token: &DelegationToken) -> String {
        codec::encode(token, issuer_keys().signing_key()).unwrap()
    }

    fn verifier() -> TokenValidator {
        TokenValidator::builder()
            .keys(Arc::new(KeyRing::from_public_pem(ISSUER_PUBLIC_PEM).unwrap()))
            .scope_validator(foo_bar_validator())
            .build()
            .unwrap()
    }

    fn rejection(result: Result<DelegationToken, TokenError>) -> InvalidDelegationToken {
        match result {
            Err(TokenError::InvalidToken(reason)) => reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_signed_token() {
        let expected = token("foo:bar", Utc::now() + Duration::hours(10));
        let parsed = verifier().parse(&signed(&expected), None).unwrap();

        assert_eq!(parsed.identities(), expected.identities());
        assert_eq!(parsed.expiry(), expected.expiry());
        assert_eq!(parsed.scope(), expected.scope());
        assert!(parsed.is_signed());
    }

    #[test]
    fn test_unsigned_token_without_keys() {
        let expected = token("foo:bar", Utc::now() + Duration::hours(10));
        let encoded = codec::encode(&expected, None).unwrap();
        let parsed = TokenValidator::new().parse(&encoded, Some("foo:bar")).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_wrong_public_key() {
        let validator = TokenValidator::builder()
            .keys(Arc::new(other_keys()))
            .scope_validator(foo_bar_validator())
            .build()
            .unwrap();
        let encoded = signed(&token("foo:bar", Utc::now() + Duration::hours(10)));
        assert_eq!(
            rejection(validator.parse(&encoded, None)),
            InvalidDelegationToken::InvalidSignature
        );
    }

    #[test]
    fn test_signed_token_without_verification_key() {
        let encoded = signed(&token("foo:bar", Utc::now() + Duration::hours(10)));
        assert_eq!(
            rejection(TokenValidator::new().parse(&encoded, Some("foo:bar"))),
            InvalidDelegationToken::NoVerificationKey
        );
    }

    #[test]
    fn test_expired() {
        let expired = token("foo:bar", Utc::now() - Duration::days(1));
        assert!(matches!(
            rejection(verifier().parse(&signed(&expired), None)),
            InvalidDelegationToken::Expired { .. }
        ));
    }

    #[test]
    fn test_clock_skew() {
        let expiry = Utc::now() + Duration::hours(1);
        let encoded = signed(&token("foo:bar", expiry));
        let validator = TokenValidator::builder()
            .keys(Arc::new(issuer_keys()))
            .scope_validator(foo_bar_validator())
            .clock_skew(Duration::minutes(5))
            .build()
            .unwrap();

        let later = expiry + Duration::minutes(2);
        assert!(validator.parse_at(&encoded, None, later).is_ok());
        assert!(verifier().parse_at(&encoded, None, later).is_err());

        let much_later = expiry + Duration::minutes(6);
        assert!(validator.parse_at(&encoded, None, much_later).is_err());
    }

    #[test]
    fn test_scope_mismatch() {
        let wrong_scope = token("bar:baz", Utc::now() + Duration::hours(10));
        let encoded = signed(&wrong_scope);
        assert!(matches!(
            rejection(verifier().parse(&encoded, None)),
            InvalidDelegationToken::ScopeMismatch(_)
        ));
        assert!(verifier().parse(&encoded, Some("bar:baz")).is_ok());
        assert!(verifier().decode(&encoded).is_ok());
    }

    #[test]
    fn test_custom_validator_rejection_reason() {
        let validator = TokenValidator::builder()
            .scope_validator(Arc::new(|_: &Url, _: Option<&str>| {
                Err::<(), _>(ScopeRejection::new("maintenance window"))
            }))
            .build()
            .unwrap();
        let encoded = codec::encode(&token("foo:bar", Utc::now() + Duration::hours(1)), None)
            .unwrap();
        assert_eq!(
            rejection(validator.parse(&encoded, Some("foo:bar"))),
            InvalidDelegationToken::ScopeMismatch("maintenance window".to_string())
        );
    }

    #[test]
    fn test_require_signature() {
        let validator = TokenValidator::builder()
            .keys(Arc::new(issuer_keys()))
            .scope_validator(foo_bar_validator())
            .require_signature(true)
            .build()
            .unwrap();
        assert!(validator.requires_signature());

        let unsigned = token("foo:bar", Utc::now() + Duration::hours(10));
        assert_eq!(
            rejection(validator.parse(&codec::encode(&unsigned, None).unwrap(), None)),
            InvalidDelegationToken::MissingSignature
        );
        assert!(validator.parse(&signed(&unsigned), None).is_ok());
    }

    #[test]
    fn test_require_signature_needs_key() {
        let result = TokenValidator::builder().require_signature(true).build();
        assert!(matches!(result, Err(TokenError::InvalidArgument(_))));
    }

    #[test]
    fn test_negative_clock_skew() {
        let result = TokenValidator::builder()
            .clock_skew(Duration::seconds(-1))
            .build();
        assert!(matches!(result, Err(TokenError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejection_messages_do_not_leak_signature() {
        let encoded = signed(&token("foo:bar", Utc::now() + Duration::hours(10)));
        let decoded = codec::decode(&encoded).unwrap();
        let sig_b64 = {
            use base64::{engine::general_purpose::STANDARD, Engine};
            STANDARD.encode(decoded.token.signature().unwrap())
        };

        let validator = TokenValidator::builder()
            .keys(Arc::new(other_keys()))
            .build()
            .unwrap();
        let message = validator.parse(&encoded, None).unwrap_err().to_string();
        assert!(!message.contains(&sig_b64));
        assert!(!message.contains("BEGIN"));
    }
}
