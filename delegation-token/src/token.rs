use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::error::TokenError;
use crate::identity::{check_field_value, Identity, IdentitySet};

/// In-memory form of a delegation token.
///
/// Built directly by an issuer, or produced by decoding a received token.
/// There are no setters: signing yields a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegationToken {
    identities: IdentitySet,
    scope: Url,
    expiry: DateTime<Utc>,
    domains: Option<Vec<String>>,
    #[serde(skip)]
    signature: Option<Vec<u8>>,
}

impl DelegationToken {
    /// Creates an unsigned token.
    ///
    /// # Arguments
    ///
    /// * `identities` - Principals the token asserts, at least one
    /// * `scope` - URI of the resource or operation the token may be used for
    /// * `expiry` - Instant after which the token is refused, kept to millisecond precision
    /// * `domains` - Optional host suffixes allowed to present the token
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidArgument` if the scope is empty or not a URI,
    /// the identity set is empty, or a domain or identity value is unusable.
    pub fn new(
        identities: impl Into<IdentitySet>,
        scope: &str,
        expiry: DateTime<Utc>,
        domains: Option<Vec<String>>,
    ) -> Result<Self, TokenError> {
        let identities = identities.into();
        if identities.is_empty() {
            return Err(TokenError::invalid_argument(
                "at least one identity is required",
            ));
        }
        for identity in &identities {
            identity.validate()?;
        }

        if scope.trim().is_empty() {
            return Err(TokenError::invalid_argument("scope is required"));
        }
        let scope = Url::parse(scope)
            .map_err(|e| TokenError::invalid_argument(format!("scope is not a URI: {e}")))?;

        let domains = normalize_domains(domains)?;

        Ok(Self::from_parts(identities, scope, truncate_to_millis(expiry), domains, None))
    }

    pub(crate) fn from_parts(
        identities: IdentitySet,
        scope: Url,
        expiry: DateTime<Utc>,
        domains: Option<Vec<String>>,
        signature: Option<Vec<u8>>,
    ) -> Self {
        Self {
            identities,
            scope,
            expiry,
            domains,
            signature,
        }
    }

    pub(crate) fn with_signature(&self, signature: Vec<u8>) -> Self {
        Self {
            signature: Some(signature),
            ..self.clone()
        }
    }

    pub fn identities(&self) -> &IdentitySet {
        &self.identities
    }

    /// The username identity, the canonical carrier of the delegated user.
    pub fn user(&self) -> Option<&Identity> {
        self.identities
            .identity_of_type(crate::identity::IdentityType::Username)
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Domain restrictions in their original order; empty when unrestricted.
    pub fn domains(&self) -> &[String] {
        self.domains.as_deref().unwrap_or(&[])
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    /// Whether a request coming from `host` may present this token.
    ///
    /// A token without a domain list is accepted from any host. Otherwise the
    /// host must equal one of the domains or be a subdomain of it.
    pub fn allows_domain(&self, host: &str) -> bool {
        let Some(domains) = &self.domains else {
            return true;
        };
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        domains.iter().any(|domain| {
            let domain = domain.trim_start_matches('.').to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}

fn normalize_domains(domains: Option<Vec<String>>) -> Result<Option<Vec<String>>, TokenError> {
    match domains {
        Some(domains) if !domains.is_empty() => {
            for domain in &domains {
                check_field_value("domain", domain)?;
            }
            Ok(Some(domains))
        }
        _ => Ok(None),
    }
}

pub(crate) fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}
