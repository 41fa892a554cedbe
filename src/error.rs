use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Render error: {0}")]
    RenderError(String),
    #[error("JSON serialization error: {0}")]
    EncodeError(#[from] serde_json::Error),
    #[error("Panic: {0}")]
    PanicError(String),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BadRequest(_) => 400,
            ServerError::PayloadTooLarge => 413,
            ServerError::IoError(_)
            | ServerError::InternalError(_)
            | ServerError::RenderError(_)
            | ServerError::EncodeError(_)
            | ServerError::PanicError(_) => 500,
        }
    }
}

/// Errors raised while loading a [`ServerConfig`](crate::config::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
