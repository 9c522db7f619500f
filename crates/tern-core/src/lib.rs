//! # Tern Core
//!
//! Shared plumbing for the Tern protocol crates: the byte-chain buffer
//! that couples a protocol engine to its transport, and the big-endian
//! wire codec used by both the SSH-2 framing layer and the SFTP client.

pub mod bufchain;
pub mod wire;

pub use bufchain::BufChain;
pub use wire::{WireReader, WireWriter};
