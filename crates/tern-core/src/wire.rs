//! Binary wire codec
//!
//! Big-endian integer and length-prefixed string encoding shared by the
//! SSH-2 framing layer and the SFTP packet layer.
//!
//! The reader carries a sticky truncation flag rather than returning a
//! `Result` per field: parse code reads a whole group of fields and
//! checks `ok()` once at the end. A reader that has run past the end of
//! its input yields zeros and empty slices from then on.

use bytes::{BufMut, Bytes, BytesMut};

/// Append-only builder for wire data.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn put_raw(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// u32 length prefix followed by the bytes.
    pub fn put_string(&mut self, data: &[u8]) {
        self.buf.put_u32(data.len() as u32);
        self.buf.put_slice(data);
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_string(s.as_bytes());
    }

    /// Append `n` zero bytes.
    pub fn put_zeroes(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Cursor-based reader with a sticky truncation flag.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    err: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            err: false,
        }
    }

    /// True until any read has run past the end of the input.
    pub fn ok(&self) -> bool {
        !self.err
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        if self.err || n > self.remaining() {
            self.err = true;
            return &[];
        }
        let out = &self.data[self.pos..self.pos + n];
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

    pub fn get_raw(&mut self, n: usize) -> &'a [u8] {
        self.take(n)
    }

    /// u32 length prefix followed by the bytes.
    pub fn get_string(&mut self) -> &'a [u8] {
        let len = self.get_u32() as usize;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_round_trip() {
        let mut w = WireWriter::new();
        w.put_u8(0x5e);
        w.put_u32(0xdead_beef);
        w.put_u64(1 << 40);
        w.put_str("tern");

        let bytes = w.into_vec();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_u8(), 0x5e);
        assert_eq!(r.get_u32(), 0xdead_beef);
        assert_eq!(r.get_u64(), 1 << 40);
        assert_eq!(r.get_string(), b"tern");
        assert!(r.ok());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_reader_error_is_sticky() {
        let mut r = WireReader::new(&[0x01, 0x02]);
        assert_eq!(r.get_u32(), 0);
        assert!(!r.ok());
        // Two readable bytes remain, but the reader stays dead.
        assert_eq!(r.get_u8(), 0);
        assert!(!r.ok());
    }

    #[test]
    fn test_truncated_string() {
        let mut w = WireWriter::new();
        w.put_u32(100);
        w.put_raw(b"short");
        let bytes = w.into_vec();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_string(), b"");
        assert!(!r.ok());
    }
}
