//! # Tern SFTP
//!
//! SFTP client core (SSH File Transfer Protocol, draft v3 compatible).
//!
//! This crate implements the request/response layer that runs atop an
//! established SSH channel: request-ID multiplexing, the split-phase
//! FXP primitives, and the pipelined transfer engine for bulk
//! downloads and uploads. The channel itself is any `AsyncRead +
//! AsyncWrite` byte pipe; opening it (and everything below it) belongs
//! to the SSH transport and connection layers.

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod protocol;
pub mod requests;
pub mod xfer;

pub use client::{FileHandle, Name, SftpClient};
pub use config::TransferConfig;
pub use error::{Error, Result};
pub use packet::{SftpPacketIn, SftpPacketOut};
pub use protocol::{FileAttrs, MessageType, OpenFlags, StatusCode, SFTP_PROTO_VERSION};
pub use requests::{RequestHandle, RequestSet};
pub use xfer::{GotPacket, Transfer};
