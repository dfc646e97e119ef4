use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons a received delegation token is refused.
///
/// Messages are meant for humans and logs. They never carry key material or
/// raw signature bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidDelegationToken {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("missing signature")]
    MissingSignature,

    #[error("token is signed but no verification key is configured")]
    NoVerificationKey,

    #[error("token expired at {expiry}")]
    Expired { expiry: DateTime<Utc> },

    #[error("scope mismatch: {0}")]
    ScopeMismatch(String),
}

/// A scope validator's refusal, converted into
/// [`InvalidDelegationToken::ScopeMismatch`] by the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ScopeRejection(pub String);

impl ScopeRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        ScopeRejection(reason.into())
    }
}

impl From<ScopeRejection> for InvalidDelegationToken {
    fn from(rejection: ScopeRejection) -> Self {
        InvalidDelegationToken::ScopeMismatch(rejection.0)
    }
}

/// Error type for delegation token operations
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid delegation token: {0}")]
    InvalidToken(#[from] InvalidDelegationToken),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("unknown scope validator: {0}")]
    UnknownScopeValidator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TokenError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        TokenError::InvalidToken(InvalidDelegationToken::Malformed(reason.into()))
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        TokenError::InvalidArgument(reason.into())
    }

    pub fn key(reason: impl Into<String>) -> Self {
        TokenError::Key(reason.into())
    }

    /// The rejection reason when this error came from token validation.
    pub fn rejection(&self) -> Option<&InvalidDelegationToken> {
        match self {
            TokenError::InvalidToken(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        matches!(self, TokenError::InvalidToken(_))
    }
}
