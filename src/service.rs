use chrono::Duration;
use std::sync::Arc;
use tracing::info;

use crate::{
    DelegationConfig, DelegationToken, IdentitySet, KeyProvider, KeyRing, ScopeValidatorRegistry,
    SdkError, TokenIssuer, TokenTimeConfig, TokenValidator,
};

/// Issues and validates delegation tokens for one configuration.
///
/// Keys are loaded once when the service is built and shared by the issuer
/// and the validator. The service is `Send + Sync`; wrap it in an `Arc` to
/// share it between request handlers.
#[derive(Clone, Debug)]
pub struct DelegationService {
    config: DelegationConfig,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl DelegationService {
    /// Build a service using the built-in scope validators
    pub fn from_config(config: &DelegationConfig) -> Result<Self, SdkError> {
        Self::builder().config(config.clone()).build()
    }

    /// Build a service, resolving the scope validator name in `registry`
    pub fn with_registry(
        config: &DelegationConfig,
        registry: &ScopeValidatorRegistry,
    ) -> Result<Self, SdkError> {
        Self::builder()
            .config(config.clone())
            .registry(registry)
            .build()
    }

    /// Create a builder for a delegation service
    pub fn builder() -> DelegationServiceBuilder<'static> {
        DelegationServiceBuilder::new()
    }

    /// Issue a token with the configured lifetime
    pub fn issue(
        &self,
        identities: impl Into<IdentitySet>,
        scope: &str,
        domains: Option<Vec<String>>,
    ) -> Result<String, SdkError> {
        Ok(self.issuer.issue(identities, scope, domains)?)
    }

    /// Build a token entity with the configured lifetime without encoding it
    pub fn create(
        &self,
        identities: impl Into<IdentitySet>,
        scope: &str,
        domains: Option<Vec<String>>,
    ) -> Result<DelegationToken, SdkError> {
        Ok(self.issuer.create(identities, scope, domains)?)
    }

    /// Encode a token, signing it if a private key is configured
    pub fn format(&self, token: &DelegationToken) -> Result<String, SdkError> {
        Ok(self.issuer.format(token)?)
    }

    /// Run the full validation pipeline against the request target
    pub fn parse(&self, token: &str, target: Option<&str>) -> Result<DelegationToken, SdkError> {
        Ok(self.validator.parse(token, target)?)
    }

    /// Decode a token and check its signature, skipping expiry and scope
    pub fn decode(&self, token: &str) -> Result<DelegationToken, SdkError> {
        Ok(self.validator.decode(token)?)
    }

    pub fn config(&self) -> &DelegationConfig {
        &self.config
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Whether issued tokens are signed
    pub fn signs(&self) -> bool {
        self.issuer.signs()
    }
}

/// Builder for [`DelegationService`]
///
/// Keys given with [`DelegationServiceBuilder::keys`] take precedence over the
/// configured key directory.
#[derive(Default)]
pub struct DelegationServiceBuilder<'a> {
    config: Option<DelegationConfig>,
    registry: Option<&'a ScopeValidatorRegistry>,
    keys: Option<Arc<dyn KeyProvider>>,
}

impl<'a> DelegationServiceBuilder<'a> {
    pub fn new() -> Self {
        Self {
            config: None,
            registry: None,
            keys: None,
        }
    }

    pub fn config(mut self, config: DelegationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registry used to resolve the configured scope validator name
    pub fn registry<'b>(self, registry: &'b ScopeValidatorRegistry) -> DelegationServiceBuilder<'b> {
        DelegationServiceBuilder {
            config: self.config,
            registry: Some(registry),
            keys: self.keys,
        }
    }

    pub fn keys(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn build(self) -> Result<DelegationService, SdkError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let keys = match (self.keys, &config.key_dir) {
            (Some(keys), _) => Some(keys),
            (None, Some(dir)) => Some(Arc::new(KeyRing::from_dir(dir)?) as Arc<dyn KeyProvider>),
            (None, None) => None,
        };

        let default_registry;
        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                default_registry = ScopeValidatorRegistry::new();
                &default_registry
            }
        };
        let scope_validator = registry.resolve(config.scope_validator.as_deref())?;

        // Both values were range checked by DelegationConfig::validate
        let clock_skew = Duration::seconds(config.clock_skew_secs as i64);
        let lifetime = config.token_lifetime_secs as i64;
        let has_verification_key = keys
            .as_ref()
            .is_some_and(|keys| keys.verification_key().is_some());
        let require_signature = config.requires_signature(has_verification_key);

        let mut validator = TokenValidator::builder()
            .scope_validator(scope_validator)
            .require_signature(require_signature)
            .clock_skew(clock_skew);
        if let Some(keys) = &keys {
            validator = validator.keys(keys.clone());
        }
        let validator = validator.build()?;

        let issuer =
            TokenIssuer::new(keys).with_time_config(TokenTimeConfig::with_duration(lifetime));

        info!(
            scope_validator = config.scope_validator.as_deref().unwrap_or(ScopeValidatorRegistry::EXACT),
            signs = issuer.signs(),
            require_signature,
            lifetime_secs = lifetime,
            "delegation service ready"
        );

        Ok(DelegationService {
            config,
            issuer,
            validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, Identity, InvalidDelegationToken, TokenError};

    fn keys() -> Arc<dyn KeyProvider> {
        Arc::new(KeyRing::generate(1024).unwrap())
    }

    #[test]
    fn test_service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DelegationService>();
    }

    #[test]
    fn test_default_service_issues_unsigned() {
        let service = DelegationService::from_config(&DelegationConfig::default()).unwrap();
        assert!(!service.signs());

        let token = service
            .issue(Identity::username("someuser").unwrap(), "foo:bar", None)
            .unwrap();
        let parsed = service.parse(&token, Some("foo:bar")).unwrap();
        assert!(!parsed.is_signed());
        assert!(service.parse(&token, Some("bar:baz")).is_err());
    }

    #[test]
    fn test_explicit_keys() {
        let config = DelegationConfig::builder()
            .require_signature(true)
            .token_lifetime_secs(60)
            .build()
            .unwrap();
        let service = DelegationService::builder()
            .config(config)
            .keys(keys())
            .build()
            .unwrap();
        assert!(service.signs());

        let token = service
            .issue(Identity::username("someuser").unwrap(), "foo:bar", None)
            .unwrap();
        let decoded = service.decode(&token).unwrap();
        assert!(decoded.is_signed());
        assert!(decoded.expiry() <= chrono::Utc::now() + Duration::seconds(60));
    }

    #[test]
    fn test_keys_imply_required_signature() {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let service = DelegationService::builder().keys(keys()).build().unwrap();
        assert!(service.validator().requires_signature());

        let forged = format!(
            "{}{}",
            crate::TOKEN_PREFIX,
            STANDARD.encode(format!(
                "expiry={}\nuserid=admin\nscope=foo:bar",
                (chrono::Utc::now() + Duration::hours(1)).timestamp_millis()
            ))
        );
        assert_eq!(
            service.parse(&forged, Some("foo:bar")).unwrap_err().rejection(),
            Some(&InvalidDelegationToken::MissingSignature)
        );

        let relaxed = DelegationService::builder()
            .config(DelegationConfig::builder().require_signature(false).build().unwrap())
            .keys(keys())
            .build()
            .unwrap();
        assert!(!relaxed.validator().requires_signature());
        assert!(relaxed.parse(&forged, Some("foo:bar")).is_ok());
    }

    #[test]
    fn test_require_signature_without_keys_fails() {
        let config = DelegationConfig::builder()
            .require_signature(true)
            .build()
            .unwrap();
        let err = DelegationService::from_config(&config).unwrap_err();
        assert!(matches!(err, SdkError::Token(TokenError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_scope_validator() {
        let config = DelegationConfig::builder()
            .scope_validator("my_service::Missing")
            .build()
            .unwrap();
        let err = DelegationService::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Token(TokenError::UnknownScopeValidator(ref name)) if name == "my_service::Missing"
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DelegationConfig {
            token_lifetime_secs: 0,
            ..DelegationConfig::default()
        };
        assert!(matches!(
            DelegationService::from_config(&config),
            Err(SdkError::Config(ConfigError::InvalidLifetime(0)))
        ));
    }

    #[test]
    fn test_signed_token_rejected_without_public_key() {
        let signer = DelegationService::builder().keys(keys()).build().unwrap();
        let token = signer
            .issue(Identity::username("someuser").unwrap(), "foo:bar", None)
            .unwrap();

        let receiver = DelegationService::from_config(&DelegationConfig::default()).unwrap();
        let err = receiver.parse(&token, Some("foo:bar")).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&InvalidDelegationToken::NoVerificationKey)
        );
    }
}
