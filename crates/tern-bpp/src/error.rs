//! Error types for the SSH-2 packet protocol engine

use thiserror::Error;

/// Result type alias for BPP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal session outcomes surfaced by the engine.
///
/// Every variant is terminal: once one has been returned, the engine
/// marks itself dead and discards all further input.
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol violation detected on our side (bad MAC, implausible
    /// length, padding violation, CBC retry bound exceeded).
    #[error("{0}")]
    SwAbort(String),

    /// The remote end failed us: a disconnect message, or closing the
    /// connection when we were not expecting it.
    #[error("{0}")]
    RemoteError(String),

    /// Clean end of stream while connection closure was expected.
    #[error("Server closed network connection")]
    RemoteEof,
}
