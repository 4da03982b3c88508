//! Error types for AnugaNav

use thiserror::Error;

/// AnugaNav error type
#[derive(Error, Debug)]
pub enum AnugaError {
    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Track log error: {0}")]
    Load(String),

    #[error("Motion gateway error: {0}")]
    Gateway(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<prost::DecodeError> for AnugaError {
    fn from(e: prost::DecodeError) -> Self {
        AnugaError::Protocol(e.to_string())
    }
}

impl From<toml::de::Error> for AnugaError {
    fn from(e: toml::de::Error) -> Self {
        AnugaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnugaError>;
