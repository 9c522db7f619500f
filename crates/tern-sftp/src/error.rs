//! Error types for SFTP operations

use thiserror::Error;

/// Result type alias for SFTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// SFTP error types
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the underlying channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected packet
    #[error("SFTP protocol error: {0}")]
    Protocol(String),

    /// Status reported by the server (`SSH_FX_*`)
    #[error("server returned status: {message}")]
    Status { code: i32, message: String },

    /// Channel closed or unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// True for a server status that just means end-of-file.
    pub fn is_eof(&self) -> bool {
        matches!(
            self,
            Error::Status {
                code, ..
            } if *code == crate::protocol::StatusCode::Eof as i32
        )
    }
}
