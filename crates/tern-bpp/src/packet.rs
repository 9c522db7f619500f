//! SSH-2 packet objects
//!
//! [`PktOut`] is the outbound builder: a growable buffer opened with
//! five reserved bytes (4-byte length + 1-byte padding length) and the
//! type byte, filled in by the upper layer, and rewritten in place by
//! the output formatter into a complete wire frame. [`PktIn`] is a
//! decoded inbound packet handed to the consumer.

use tern_core::wire::{WireReader, WireWriter};

// SSH-2 message type codes (RFC 4253 §12)
pub const SSH_MSG_DISCONNECT: u8 = 1;
pub const SSH_MSG_IGNORE: u8 = 2;
pub const SSH_MSG_UNIMPLEMENTED: u8 = 3;
pub const SSH_MSG_DEBUG: u8 = 4;
pub const SSH_MSG_SERVICE_REQUEST: u8 = 5;
pub const SSH_MSG_SERVICE_ACCEPT: u8 = 6;
pub const SSH_MSG_KEXINIT: u8 = 20;
pub const SSH_MSG_NEWKEYS: u8 = 21;

/// Sentinel type code for a packet too short to carry a type byte.
/// Deliberately larger than any real u8 code; the engine answers such
/// packets with SSH_MSG_UNIMPLEMENTED.
pub const SSH_MSG_NO_TYPE_CODE: u16 = 0x100;

// Disconnect reason codes (RFC 4253 §11.1)
pub const SSH_DISCONNECT_PROTOCOL_ERROR: u32 = 2;
pub const SSH_DISCONNECT_BY_APPLICATION: u32 = 11;

/// A decoded inbound packet.
///
/// `ty` is u16 so it can carry [`SSH_MSG_NO_TYPE_CODE`]; every real
/// message code fits in the low byte. The payload is the cleartext
/// after the type byte.
#[derive(Debug)]
pub struct PktIn {
    pub ty: u16,
    pub sequence: u32,
    payload: Vec<u8>,
}

impl PktIn {
    pub(crate) fn new(ty: u16, sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            ty,
            sequence,
            payload,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Cursor over the payload.
    pub fn reader(&self) -> WireReader<'_> {
        WireReader::new(&self.payload)
    }
}

/// An outbound packet under construction.
#[derive(Debug)]
pub struct PktOut {
    pub ty: u8,
    /// End of the pre-payload header (length, padding length, type).
    pub prefix: usize,
    /// Minimum final wire size; the formatter pads the frame (via the
    /// compressor, or a preceding IGNORE message) to reach it.
    pub minlen: usize,
    /// Minimum padding, raising the formatter's floor of 4.
    pub forcepad: usize,
    data: WireWriter,
}

impl PktOut {
    pub fn new(ty: u8) -> Self {
        let mut data = WireWriter::new();
        data.put_zeroes(5);
        data.put_u8(ty);
        let prefix = data.len();
        Self {
            ty,
            prefix,
            minlen: 0,
            forcepad: 0,
            data,
        }
    }

    /// Current write cursor, counting the reserved header.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.data.put_u8(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.data.put_u32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.data.put_u64(v);
    }

    pub fn put_raw(&mut self, data: &[u8]) {
        self.data.put_raw(data);
    }

    pub fn put_string(&mut self, data: &[u8]) {
        self.data.put_string(data);
    }

    pub fn put_str(&mut self, s: &str) {
        self.data.put_str(s);
    }

    /// The payload written so far (everything after the type byte).
    pub fn payload(&self) -> &[u8] {
        &self.data.as_slice()[self.prefix..]
    }

    pub(crate) fn put_zeroes(&mut self, n: usize) {
        self.data.put_zeroes(n);
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub(crate) fn into_wire(self) -> bytes::Bytes {
        self.data.into_bytes()
    }
}
