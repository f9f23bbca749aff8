use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider registry error: {0}")]
    Registry(#[from] embedsync_providers::RegistryError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata lookup error: {0}")]
    Metadata(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
