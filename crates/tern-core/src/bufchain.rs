//! Byte-chain buffer
//!
//! A FIFO queue of opaque byte runs. One chain sits between the
//! transport and a protocol engine in each direction: the producer
//! appends whole segments, the consumer fetches exact amounts. A fetch
//! is all-or-nothing, which is what lets a resumable parser suspend
//! cleanly when the chain runs dry.

use bytes::{Buf, Bytes};
use std::collections::VecDeque;

/// FIFO of byte segments with a sticky end-of-stream flag.
#[derive(Debug, Default)]
pub struct BufChain {
    segments: VecDeque<Bytes>,
    total: usize,
    eof: bool,
}

impl BufChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of buffered bytes.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Append a segment at the tail. Empty segments are ignored.
    pub fn append(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        if data.is_empty() {
            return;
        }
        self.total += data.len();
        self.segments.push_back(data);
    }

    /// Push a segment back at the head, undoing a fetch.
    pub fn prepend(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        if data.is_empty() {
            return;
        }
        self.total += data.len();
        self.segments.push_front(data);
    }

    /// Copy exactly `dst.len()` bytes into `dst` and consume them, or
    /// return `false` having consumed nothing.
    pub fn try_fetch_consume(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() > self.total {
            return false;
        }
        let mut filled = 0;
        while filled < dst.len() {
            let Some(seg) = self.segments.front_mut() else {
                break;
            };
            let take = seg.len().min(dst.len() - filled);
            dst[filled..filled + take].copy_from_slice(&seg[..take]);
            filled += take;
            if take == seg.len() {
                self.segments.pop_front();
            } else {
                seg.advance(take);
            }
        }
        self.total -= filled;
        true
    }

    /// Discard exactly `n` bytes, or return `false` having consumed
    /// nothing.
    pub fn consume(&mut self, n: usize) -> bool {
        if n > self.total {
            return false;
        }
        let mut left = n;
        while left > 0 {
            let Some(seg) = self.segments.front_mut() else {
                break;
            };
            let take = seg.len().min(left);
            left -= take;
            if take == seg.len() {
                self.segments.pop_front();
            } else {
                seg.advance(take);
            }
        }
        self.total -= n;
        true
    }

    /// Drain the whole chain into one contiguous buffer.
    pub fn take_all(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total);
        for seg in self.segments.drain(..) {
            out.extend_from_slice(&seg);
        }
        self.total = 0;
        out
    }

    /// Mark that the producer will never append again.
    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    pub fn eof(&self) -> bool {
        self.eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_across_segments() {
        let mut chain = BufChain::new();
        chain.append(&b"hel"[..]);
        chain.append(&b"lo world"[..]);
        assert_eq!(chain.len(), 11);

        let mut buf = [0u8; 5];
        assert!(chain.try_fetch_consume(&mut buf));
        assert_eq!(&buf, b"hello");
        assert_eq!(chain.len(), 6);
    }

    #[test]
    fn test_short_fetch_consumes_nothing() {
        let mut chain = BufChain::new();
        chain.append(&b"abc"[..]);

        let mut buf = [0u8; 4];
        assert!(!chain.try_fetch_consume(&mut buf));
        assert_eq!(chain.len(), 3);

        let mut buf = [0u8; 3];
        assert!(chain.try_fetch_consume(&mut buf));
        assert_eq!(&buf, b"abc");
        assert!(chain.is_empty());
    }

    #[test]
    fn test_prepend_restores_order() {
        let mut chain = BufChain::new();
        chain.append(&b"world"[..]);
        chain.prepend(&b"hello "[..]);
        assert_eq!(chain.take_all(), b"hello world");
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut chain = BufChain::new();
        assert!(!chain.eof());
        chain.set_eof();
        assert!(chain.eof());
    }

    #[test]
    fn test_consume_discards() {
        let mut chain = BufChain::new();
        chain.append(&b"0123456789"[..]);
        assert!(chain.consume(4));
        let mut buf = [0u8; 6];
        assert!(chain.try_fetch_consume(&mut buf));
        assert_eq!(&buf, b"456789");
        assert!(!chain.consume(1));
    }
}
