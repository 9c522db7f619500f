//! SFTP packet layer
//!
//! Every SFTP packet travels as `[u32 length][u8 type][body]`, where
//! the length counts the type byte and body. [`SftpPacketOut`] builds
//! an outbound frame with the length patched in at send time;
//! [`SftpPacketIn`] is a received frame with a sticky-error read
//! cursor, mirroring the wire reader contract: parse a group of
//! fields, check `ok()` once.

use tern_core::WireWriter;

use crate::protocol::{FileAttrs, MessageType};

/// Outbound packet builder.
#[derive(Debug)]
pub struct SftpPacketOut {
    data: WireWriter,
}

impl SftpPacketOut {
    pub fn new(ty: MessageType) -> Self {
        let mut data = WireWriter::new();
        data.put_u32(0); // length, patched in finish()
        data.put_u8(ty as u8);
        Self { data }
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

    pub fn put_string(&mut self, s: &[u8]) {
        self.data.put_string(s);
    }

    pub fn put_str(&mut self, s: &str) {
        self.data.put_str(s);
    }

    pub fn put_attrs(&mut self, attrs: &FileAttrs) {
        attrs.encode_into(&mut self.data);
    }

    /// Patch the length field and return the complete wire frame.
    pub fn finish(mut self) -> Vec<u8> {
        let wire_len = (self.data.len() - 4) as u32;
        self.data.as_mut_slice()[..4].copy_from_slice(&wire_len.to_be_bytes());
        self.data.into_vec()
    }
}

/// A received packet: type byte plus a cursor over the body.
#[derive(Debug)]
pub struct SftpPacketIn {
    pub ty: u8,
    body: Vec<u8>,
    pos: usize,
    err: bool,
}

impl SftpPacketIn {
    /// Wrap a length-stripped frame (`[u8 type][body]`).
    pub fn from_frame(frame: Vec<u8>) -> Option<Self> {
        let ty = *frame.first()?;
        Some(Self {
            ty,
            body: frame,
            pos: 1,
            err: false,
        })
    }

    /// True until any read has run past the end of the packet.
    pub fn ok(&self) -> bool {
        !self.err
    }

    pub fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }

    fn take(&mut self, n: usize) -> &[u8] {
        if self.err || n > self.remaining() {
            self.err = true;
            return &[];
        }
        let out = &self.body[self.pos..self.pos + n];
        self.pos += n;
        out
    }

    pub fn get_u8(&mut self) -> u8 {
        let b = self.take(1);
        if b.is_empty() { 0 } else { b[0] }
    }

    pub fn get_u32(&mut self) -> u32 {
        let b = self.take(4);
        if b.len() == 4 {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            0
        }
    }

    pub fn get_u64(&mut self) -> u64 {
        let b = self.take(8);
        if b.len() == 8 {
            u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        } else {
            0
        }
    }

    pub fn get_string(&mut self) -> &[u8] {
        let len = self.get_u32() as usize;
        self.take(len)
    }

    /// Decode a flags-bitmap attributes block. Extension pairs are
    /// consumed and discarded.
    pub fn get_attrs(&mut self) -> FileAttrs {
        let flags = self.get_u32();
        let mut attrs = FileAttrs::default();
        if flags & FileAttrs::FLAG_SIZE != 0 {
            attrs.size = Some(self.get_u64());
        }
        if flags & FileAttrs::FLAG_UIDGID != 0 {
            attrs.uid = Some(self.get_u32());
            attrs.gid = Some(self.get_u32());
        }
        if flags & FileAttrs::FLAG_PERMISSIONS != 0 {
            attrs.permissions = Some(self.get_u32());
        }
        if flags & FileAttrs::FLAG_ACMODTIME != 0 {
            attrs.atime = Some(self.get_u32());
            attrs.mtime = Some(self.get_u32());
        }
        if flags & FileAttrs::FLAG_EXTENDED != 0 {
            let count = self.get_u32();
            for _ in 0..count {
                if !self.ok() {
                    break;
                }
                self.get_string();
                self.get_string();
            }
        }
        attrs
    }
}
