use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::codec::FIELD_DELIM;
use crate::error::TokenError;

/// The kinds of principal a delegation token can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityType {
    /// Account name, optionally acting as another account
    Username,
    /// X.509 certificate subject
    X500,
    /// 128-bit numeric account identifier
    Numeric,
    /// Arbitrary distinguished name. Never written to the wire.
    DistinguishedName,
}

impl IdentityType {
    /// Short tag used as the field label on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            IdentityType::Username => "userid",
            IdentityType::X500 => "x500",
            IdentityType::Numeric => "cadc",
            IdentityType::DistinguishedName => "dn",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "userid" => Some(IdentityType::Username),
            "x500" => Some(IdentityType::X500),
            "cadc" => Some(IdentityType::Numeric),
            "dn" => Some(IdentityType::DistinguishedName),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single principal asserted by a token.
///
/// Two identities are equal when both the variant and the value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Identity {
    Username {
        name: String,
        proxy_user: Option<String>,
    },
    X500(String),
    Numeric(Uuid),
    DistinguishedName(String),
}

impl Identity {
    pub fn username(name: impl Into<String>) -> Result<Self, TokenError> {
        let identity = Identity::Username {
            name: name.into(),
            proxy_user: None,
        };
        identity.validate()?;
        Ok(identity)
    }

    /// A username identity acting on behalf of `proxy_user`.
    pub fn username_as(
        name: impl Into<String>,
        proxy_user: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let identity = Identity::Username {
            name: name.into(),
            proxy_user: Some(proxy_user.into()),
        };
        identity.validate()?;
        Ok(identity)
    }

    pub fn x500(dn: impl Into<String>) -> Result<Self, TokenError> {
        let identity = Identity::X500(dn.into());
        identity.validate()?;
        Ok(identity)
    }

    pub fn numeric(id: Uuid) -> Self {
        Identity::Numeric(id)
    }

    pub fn distinguished_name(dn: impl Into<String>) -> Result<Self, TokenError> {
        let identity = Identity::DistinguishedName(dn.into());
        identity.validate()?;
        Ok(identity)
    }

    pub fn identity_type(&self) -> IdentityType {
        match self {
            Identity::Username { .. } => IdentityType::Username,
            Identity::X500(_) => IdentityType::X500,
            Identity::Numeric(_) => IdentityType::Numeric,
            Identity::DistinguishedName(_) => IdentityType::DistinguishedName,
        }
    }

    /// Canonical string form of the identity value.
    pub fn value(&self) -> String {
        match self {
            Identity::Username { name, .. } => name.clone(),
            Identity::X500(dn) | Identity::DistinguishedName(dn) => dn.clone(),
            Identity::Numeric(id) => id.hyphenated().to_string(),
        }
    }

    /// Whether the identity is written to the field string.
    pub fn is_serializable(&self) -> bool {
        !matches!(self, Identity::DistinguishedName(_))
    }

    pub(crate) fn validate(&self) -> Result<(), TokenError> {
        match self {
            Identity::Username { name, proxy_user } => {
                check_field_value("username", name)?;
                if let Some(proxy) = proxy_user {
                    check_field_value("proxy user", proxy)?;
                }
                Ok(())
            }
            Identity::X500(dn) => check_field_value("X.500 subject", dn),
            Identity::DistinguishedName(dn) => check_field_value("distinguished name", dn),
            Identity::Numeric(_) => Ok(()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Username {
                name,
                proxy_user: Some(proxy),
            } => write!(f, "{}:{} (as {})", self.identity_type(), name, proxy),
            _ => write!(f, "{}:{}", self.identity_type(), self.value()),
        }
    }
}

/// Values end up between field delimiters, so they may not contain one.
pub(crate) fn check_field_value(what: &str, value: &str) -> Result<(), TokenError> {
    if value.is_empty() {
        return Err(TokenError::invalid_argument(format!(
            "{what} must not be empty"
        )));
    }
    if value.contains(FIELD_DELIM) || value.chars().any(char::is_control) {
        return Err(TokenError::invalid_argument(format!(
            "{what} contains a control character"
        )));
    }
    Ok(())
}

/// Duplicate-free set of identities that remembers insertion order.
///
/// Order only matters for the wire layout; equality ignores it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct IdentitySet {
    identities: Vec<Identity>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identity, returning false if it was already present.
    pub fn insert(&mut self, identity: Identity) -> bool {
        if self.identities.contains(&identity) {
            return false;
        }
        self.identities.push(identity);
        true
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Identity> {
        self.identities.iter()
    }

    /// First identity of the requested kind, if any.
    pub fn identity_of_type(&self, identity_type: IdentityType) -> Option<&Identity> {
        self.identities
            .iter()
            .find(|identity| identity.identity_type() == identity_type)
    }

    pub fn username(&self) -> Option<&str> {
        match self.identity_of_type(IdentityType::Username) {
            Some(Identity::Username { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn proxy_user(&self) -> Option<&str> {
        match self.identity_of_type(IdentityType::Username) {
            Some(Identity::Username { proxy_user, .. }) => proxy_user.as_deref(),
            _ => None,
        }
    }

    pub fn x500(&self) -> Option<&str> {
        match self.identity_of_type(IdentityType::X500) {
            Some(Identity::X500(dn)) => Some(dn),
            _ => None,
        }
    }

    pub fn numeric(&self) -> Option<Uuid> {
        match self.identity_of_type(IdentityType::Numeric) {
            Some(Identity::Numeric(id)) => Some(*id),
            _ => None,
        }
    }

    /// Identities that are written to the wire, in insertion order.
    pub fn serializable(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter().filter(|identity| identity.is_serializable())
    }
}

impl PartialEq for IdentitySet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|identity| other.contains(identity))
    }
}

impl Eq for IdentitySet {}

impl From<Identity> for IdentitySet {
    fn from(identity: Identity) -> Self {
        let mut set = IdentitySet::new();
        set.insert(identity);
        set
    }
}

impl FromIterator<Identity> for IdentitySet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut set = IdentitySet::new();
        for identity in iter {
            set.insert(identity);
        }
        set
    }
}

impl<'a> IntoIterator for &'a IdentitySet {
    type Item = &'a Identity;
    type IntoIter = std::slice::Iter<'a, Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.identities.iter()
    }
}

impl IntoIterator for IdentitySet {
    type Item = Identity;
    type IntoIter = std::vec::IntoIter<Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.identities.into_iter()
    }
}
