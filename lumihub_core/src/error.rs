//! Error types for LumiHub

use thiserror::Error;

/// Main error type for LumiHub operations
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Hub is closed")]
    Closed,

    #[error("Hub is already listening")]
    AlreadyListening,

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("No key material for {0}")]
    KeyUnavailable(String),

    #[error("Invalid shared secret: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
