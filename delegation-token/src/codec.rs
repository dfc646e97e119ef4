//! Text form of delegation tokens.
//!
//! A token is a line-feed separated list of `label=value` fields, signed as
//! a whole, then wrapped as `base64:<base64 of the fields>`. The envelope keeps
//! the final string inside the base64 alphabet, so it can travel as a cookie
//! value whatever the usernames, DNs or URIs contain.
//!
//! ```text
//! expiry=<epoch ms>
//! userid=<name>            (optionally followed by proxyuser=<name>)
//! x500=<subject dn>
//! cadc=<uuid>
//! scope=<uri>
//! domain=<host>            (zero or more)
//! signature=<base64>       (optional, always last)
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use url::Url;
use uuid::Uuid;

use crate::error::TokenError;
use crate::identity::{check_field_value, Identity, IdentitySet, IdentityType};
use crate::signature;
use crate::token::DelegationToken;

pub const TOKEN_PREFIX: &str = "base64:";
pub const FIELD_DELIM: char = '\n';

pub const EXPIRY_LABEL: &str = "expiry";
pub const PROXY_USER_LABEL: &str = "proxyuser";
pub const SCOPE_LABEL: &str = "scope";
pub const DOMAIN_LABEL: &str = "domain";
pub const SIGNATURE_LABEL: &str = "signature";

/// A token read off the wire together with the exact text its signature covers.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub token: DelegationToken,
    pub signed_content: String,
}

/// Builds the field string a signature is computed over.
///
/// Distinguished-name identities are left out.
pub fn unsigned_fields(token: &DelegationToken) -> String {
    let mut fields = vec![field(EXPIRY_LABEL, token.expiry().timestamp_millis())];

    for identity in token.identities().serializable() {
        match identity {
            Identity::Username { name, proxy_user } => {
                fields.push(field(IdentityType::Username.tag(), name));
                if let Some(proxy_user) = proxy_user {
                    fields.push(field(PROXY_USER_LABEL, proxy_user));
                }
            }
            other => fields.push(field(other.identity_type().tag(), other.value())),
        }
    }

    fields.push(field(SCOPE_LABEL, token.scope()));
    for domain in token.domains() {
        fields.push(field(DOMAIN_LABEL, domain));
    }

    fields.join(&FIELD_DELIM.to_string())
}

/// Returns a copy of `token` carrying a signature made with `key`.
pub fn sign_token(token: &DelegationToken, key: &RsaPrivateKey) -> Result<DelegationToken, TokenError> {
    let signature = signature::sign(&unsigned_fields(token), key)?;
    Ok(token.with_signature(signature))
}

/// Encodes a token into its envelope form.
///
/// With a signing key the token is signed afresh. Without one, a signature
/// the token already carries is kept and an unsigned token stays unsigned.
///
/// # Errors
///
/// Returns `TokenError::InvalidArgument` when none of the token's identities
/// can be written to the wire, or `TokenError::Key` when signing fails.
pub fn encode(
    token: &DelegationToken,
    signing_key: Option<&RsaPrivateKey>,
) -> Result<String, TokenError> {
    if token.identities().serializable().next().is_none() {
        return Err(TokenError::invalid_argument(
            "token has no identity that can be serialized",
        ));
    }

    let mut fields = unsigned_fields(token);
    let signature = match signing_key {
        Some(key) => Some(signature::sign(&fields, key)?),
        None => token.signature().map(<[u8]>::to_vec),
    };
    if let Some(signature) = signature {
        fields.push(FIELD_DELIM);
        fields.push_str(&field(SIGNATURE_LABEL, STANDARD.encode(signature)));
    }

    Ok(format!("{TOKEN_PREFIX}{}", STANDARD.encode(fields)))
}

/// Decodes the envelope and checks the field structure.
///
/// This does not verify the signature or look at the clock; see
/// [`crate::TokenValidator`] for that.
pub fn decode(text: &str) -> Result<DecodedToken, TokenError> {
    let body = text
        .strip_prefix(TOKEN_PREFIX)
        .ok_or_else(|| TokenError::malformed(format!("token must start with '{TOKEN_PREFIX}'")))?;
    let bytes = STANDARD
        .decode(body)
        .map_err(|e| TokenError::malformed(format!("envelope is not valid base64: {e}")))?;
    let fields = String::from_utf8(bytes)
        .map_err(|_| TokenError::malformed("field string is not valid UTF-8"))?;

    let marker = format!("{FIELD_DELIM}{SIGNATURE_LABEL}=");
    let (signed_content, signature) = match fields.rfind(&marker) {
        Some(index) => {
            let encoded = &fields[index + marker.len()..];
            if encoded.is_empty() {
                return Err(TokenError::malformed("signature field is empty"));
            }
            let signature = STANDARD
                .decode(encoded)
                .map_err(|_| TokenError::malformed("signature is not valid base64"))?;
            (&fields[..index], Some(signature))
        }
        None => (fields.as_str(), None),
    };

    let mut parser = FieldParser::default();
    for (index, field) in signed_content.split(FIELD_DELIM).enumerate() {
        parser.field(index, field)?;
    }
    let token = parser.finish(signature)?;

    Ok(DecodedToken {
        token,
        signed_content: signed_content.to_string(),
    })
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label}={value}")
}

#[derive(Default)]
struct FieldParser {
    expiry: Option<DateTime<Utc>>,
    identities: IdentitySet,
    // A userid waits here in case a proxyuser field follows it.
    pending_user: Option<String>,
    scope: Option<Url>,
    domains: Vec<String>,
}

impl FieldParser {
    fn field(&mut self, index: usize, field: &str) -> Result<(), TokenError> {
        let (label, value) = field
            .split_once('=')
            .ok_or_else(|| TokenError::malformed(format!("field {index} has no label")))?;

        if index == 0 && label != EXPIRY_LABEL {
            return Err(TokenError::malformed(format!(
                "token must start with the {EXPIRY_LABEL} field"
            )));
        }
        if label != PROXY_USER_LABEL {
            self.flush_user()?;
        }

        match label {
            EXPIRY_LABEL => {
                if index != 0 {
                    return Err(TokenError::malformed("duplicate expiry field"));
                }
                let millis: i64 = value
                    .parse()
                    .map_err(|_| TokenError::malformed(format!("invalid expiry '{value}'")))?;
                let expiry = DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| TokenError::malformed(format!("expiry out of range: {millis}")))?;
                self.expiry = Some(expiry);
            }
            PROXY_USER_LABEL => {
                let name = self.pending_user.take().ok_or_else(|| {
                    TokenError::malformed("proxyuser field must follow a userid field")
                })?;
                self.add_identity(Identity::username_as(name, value))?;
            }
            SCOPE_LABEL => {
                if self.scope.is_some() {
                    return Err(TokenError::malformed("duplicate scope field"));
                }
                if self.identities.is_empty() {
                    return Err(TokenError::malformed("token carries no identity"));
                }
                let scope = Url::parse(value)
                    .map_err(|e| TokenError::malformed(format!("invalid scope URI: {e}")))?;
                self.scope = Some(scope);
            }
            DOMAIN_LABEL => {
                if self.scope.is_none() {
                    return Err(TokenError::malformed("domain field before scope"));
                }
                check_field_value("domain", value).map_err(as_malformed)?;
                self.domains.push(value.to_string());
            }
            SIGNATURE_LABEL => {
                return Err(TokenError::malformed("signature must be the last field"));
            }
            tag => match IdentityType::from_tag(tag) {
                Some(identity_type) if identity_type != IdentityType::DistinguishedName => {
                    if self.scope.is_some() {
                        return Err(TokenError::malformed(format!(
                            "{tag} field after scope"
                        )));
                    }
                    match identity_type {
                        IdentityType::Username => {
                            check_field_value("username", value).map_err(as_malformed)?;
                            self.pending_user = Some(value.to_string());
                        }
                        IdentityType::X500 => self.add_identity(Identity::x500(value))?,
                        _ => {
                            let id = Uuid::parse_str(value).map_err(|_| {
                                TokenError::malformed(format!("invalid numeric identity '{value}'"))
                            })?;
                            self.add_identity(Ok(Identity::numeric(id)))?;
                        }
                    }
                }
                _ => {
                    return Err(TokenError::malformed(format!("unknown field '{tag}'")));
                }
            },
        }
        Ok(())
    }

    fn flush_user(&mut self) -> Result<(), TokenError> {
        match self.pending_user.take() {
            Some(name) => self.add_identity(Identity::username(name)),
            None => Ok(()),
        }
    }

    fn add_identity(&mut self, identity: Result<Identity, TokenError>) -> Result<(), TokenError> {
        self.identities.insert(identity.map_err(as_malformed)?);
        Ok(())
    }

    fn finish(mut self, signature: Option<Vec<u8>>) -> Result<DelegationToken, TokenError> {
        self.flush_user()?;
        let expiry = self
            .expiry
            .ok_or_else(|| TokenError::malformed("missing expiry field"))?;
        let scope = self
            .scope
            .ok_or_else(|| TokenError::malformed("missing scope field"))?;
        let domains = if self.domains.is_empty() {
            None
        } else {
            Some(self.domains)
        };
        Ok(DelegationToken::from_parts(
            self.identities,
            scope,
            expiry,
            domains,
            signature,
        ))
    }
}

fn as_malformed(err: TokenError) -> TokenError {
    match err {
        TokenError::InvalidArgument(reason) => TokenError::malformed(reason),
        other => other,
    }
}
