//! # Tern BPP
//!
//! The SSH-2 binary packet protocol engine: framing, encryption,
//! authentication, compression and sequencing of every byte exchanged
//! with an SSH-2 peer after version exchange (RFC 4253 §6).
//!
//! The engine is transport-agnostic: raw bytes arrive on one
//! [`tern_core::BufChain`], decoded packets come out of an internal
//! queue, and outbound packets are formatted onto a second chain. The
//! input side is a resumable state machine that suspends whenever the
//! chain cannot supply the bytes it needs, so the owner can feed data
//! in arbitrary slices without blocking.

pub mod crypto;
pub mod engine;
pub mod error;
pub mod packet;
pub mod stats;

pub use crypto::{CipherFlags, Compressor, Decompressor, SshCipher, SshMac};
pub use engine::{Bpp, BUG_CHOKES_ON_SSH2_IGNORE, OUR_V2_PACKETLIMIT};
pub use error::{Error, Result};
pub use packet::{PktIn, PktOut};
pub use stats::{DataTransferStats, DirectionStats};
