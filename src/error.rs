use crate::keyring::Credential;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Compressor does not support {mime} ({path})")]
    UnsupportedType { path: PathBuf, mime: String },

    #[error("Account error for credential {credential}: {message}")]
    Account {
        credential: Credential,
        message: String,
    },

    #[error("Server error after {attempts} attempts: {message}")]
    Server { attempts: u32, message: String },

    #[error("{message} (HTTP {status}/{kind})")]
    Client {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("No credentials left in the key ring")]
    RingExhausted,

    #[error("No active session: create a session before compressing")]
    SessionNotActive,

    #[error("Secondary optimizer failed: {0}")]
    Optimizer(String),

    #[error("No image files found in input path: {0}")]
    NoImageFilesFound(String),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CompressionError>;
