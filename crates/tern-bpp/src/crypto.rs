//! Crypto capability interfaces
//!
//! The engine depends only on these traits, never on a concrete
//! algorithm. Each handle is a pre-keyed context supplied by the key
//! exchange layer; the engine owns it for one direction of one session
//! and frees it on rekey or teardown. Implementations are expected to
//! zero their key material on drop.

/// Capability bits advertised by a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherFlags(pub u32);

impl CipherFlags {
    pub const NONE: u32 = 0;
    /// CBC-mode block cipher: the input machine must use the
    /// incremental MAC-first parse to avoid length-oracle attacks.
    pub const IS_CBC: u32 = 0x0000_0001;
    /// The cipher encrypts the 4-byte length field separately from the
    /// packet body (OpenSSH-style ETM length encryption).
    pub const SEPARATE_LENGTH: u32 = 0x0000_0002;

    pub fn is_cbc(&self) -> bool {
        self.0 & Self::IS_CBC != 0
    }

    pub fn separate_length(&self) -> bool {
        self.0 & Self::SEPARATE_LENGTH != 0
    }
}

/// A directional SSH-2 cipher context.
pub trait SshCipher: Send {
    /// Cipher block size in bytes, at least 1. The engine treats any
    /// value below 8 as 8 for framing purposes.
    fn block_size(&self) -> usize;

    fn flags(&self) -> CipherFlags {
        CipherFlags(CipherFlags::NONE)
    }

    /// Encrypt in place. `data.len()` is a multiple of the block size.
    fn encrypt(&mut self, data: &mut [u8]);

    /// Decrypt in place. `data.len()` is a multiple of the block size.
    fn decrypt(&mut self, data: &mut [u8]);

    /// Encrypt the 4-byte length field. Only called when the flags
    /// contain `SEPARATE_LENGTH`.
    fn encrypt_length(&mut self, len_field: &mut [u8; 4], seq: u32) {
        let _ = (len_field, seq);
    }

    /// Decrypt the 4-byte length field. Only called when the flags
    /// contain `SEPARATE_LENGTH`.
    fn decrypt_length(&mut self, len_field: &mut [u8; 4], seq: u32) {
        let _ = (len_field, seq);
    }
}

/// A directional SSH-2 MAC context.
///
/// The incremental API (`start`/`put`/`result_matches`) exists for the
/// CBC parse loop, which has to test a candidate tag after every cipher
/// block while continuing to feed data if the test fails. The one-shot
/// helpers are what the ordinary framing paths use; they feed the packet
/// sequence number first as a big-endian u32, per RFC 4253 §6.4.
pub trait SshMac: Send {
    /// Fixed tag length in bytes.
    fn tag_len(&self) -> usize;

    /// Reset the running state for a new message.
    fn start(&mut self);

    /// Feed message bytes into the running state.
    fn put(&mut self, data: &[u8]);

    /// Write the tag for everything fed so far, without disturbing the
    /// running state.
    fn result_into(&self, tag: &mut [u8]);

    /// Compare the current tag against a candidate, without disturbing
    /// the running state.
    fn result_matches(&self, tag: &[u8]) -> bool {
        let mut ours = vec![0u8; self.tag_len()];
        self.result_into(&mut ours);
        ours == tag
    }

    /// One-shot: MAC `data[..len]` under `seq` and append the tag at
    /// `data[len..len + tag_len]`.
    fn generate(&mut self, data: &mut [u8], len: usize, seq: u32) {
        self.start();
        self.put(&seq.to_be_bytes());
        self.put(&data[..len]);
        let mut tag = vec![0u8; self.tag_len()];
        self.result_into(&mut tag);
        data[len..len + tag.len()].copy_from_slice(&tag);
    }

    /// One-shot: verify the tag at `data[len..]` over `data[..len]`
    /// under `seq`.
    fn verify(&mut self, data: &[u8], len: usize, seq: u32) -> bool {
        self.start();
        self.put(&seq.to_be_bytes());
        self.put(&data[..len]);
        self.result_matches(&data[len..len + self.tag_len()])
    }
}

/// Outbound payload compressor.
pub trait Compressor: Send {
    /// Compress a payload. If `min_len` is nonzero the output may be
    /// padded (e.g. by opening and closing empty blocks) so that the
    /// final wire frame reaches at least that size.
    fn compress(&mut self, data: &[u8], min_len: usize) -> Vec<u8>;
}

/// Inbound payload decompressor.
pub trait Decompressor: Send {
    /// Expand a payload. `None` means the payload passes through
    /// unchanged.
    fn decompress(&mut self, data: &[u8]) -> Option<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumMac(u32);

    impl SshMac for SumMac {
        fn tag_len(&self) -> usize {
            4
        }
        fn start(&mut self) {
            self.0 = 0;
        }
        fn put(&mut self, data: &[u8]) {
            for &b in data {
                self.0 = self.0.wrapping_mul(31).wrapping_add(b as u32);
            }
        }
        fn result_into(&self, tag: &mut [u8]) {
            tag.copy_from_slice(&self.0.to_be_bytes());
        }
    }

    #[test]
    fn test_generate_then_verify() {
        let mut mac = SumMac(0);
        let mut data = b"some packet bytes\0\0\0\0".to_vec();
        let len = data.len() - 4;
        mac.generate(&mut data, len, 7);
        assert!(mac.verify(&data, len, 7));
        assert!(!mac.verify(&data, len, 8));
    }

    #[test]
    fn test_result_matches_is_non_destructive() {
        let mut mac = SumMac(0);
        mac.start();
        mac.put(b"abc");
        let mut tag = [0u8; 4];
        mac.result_into(&mut tag);
        assert!(mac.result_matches(&tag));
        // Feeding more data continues from the same state.
        mac.put(b"def");
        assert!(!mac.result_matches(&tag));
    }

    #[test]
    fn test_cipher_flags() {
        let flags = CipherFlags(CipherFlags::IS_CBC);
        assert!(flags.is_cbc());
        assert!(!flags.separate_length());
    }
}
