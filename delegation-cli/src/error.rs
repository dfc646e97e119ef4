use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("SDK error: {0}")]
    Sdk(#[from] delegation::SdkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] delegation::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Token rejected: {0}")]
    Rejected(delegation::InvalidDelegationToken),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<delegation::TokenError> for CliError {
    fn from(error: delegation::TokenError) -> Self {
        CliError::Sdk(error.into())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
