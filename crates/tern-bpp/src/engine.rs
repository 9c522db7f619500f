//! SSH-2 binary packet protocol engine
//!
//! The input side is a resumable state machine: one suspension
//! primitive (await bytes from the inbound chain), with every local
//! that must survive a suspension stored on the engine struct. Three
//! framing paths are chosen per packet from the installed cipher/MAC:
//!
//! - CBC with MAC-then-encrypt runs the incremental verify loop, never
//!   trusting a decrypted length until the MAC has passed (VU#958563).
//! - Encrypt-then-MAC authenticates the length field before anything
//!   is decrypted; the length may itself be separately encrypted.
//! - The standard path decrypts the first block, reads the length from
//!   it, and verifies the MAC over the plaintext.
//!
//! The output side formats queued packets in dequeue order, inserting
//! SSH_MSG_IGNORE frames where needed for minimum-length padding or
//! the CBC known-IV workaround.

use std::collections::VecDeque;
use std::ops::Range;

use rand::RngCore;
use tracing::{debug, trace};
use zeroize::Zeroize;

use tern_core::BufChain;

use crate::crypto::{Compressor, Decompressor, SshCipher, SshMac};
use crate::error::{Error, Result};
use crate::packet::{
    PktIn, PktOut, SSH_MSG_DEBUG, SSH_MSG_DISCONNECT, SSH_MSG_IGNORE, SSH_MSG_NEWKEYS,
    SSH_MSG_NO_TYPE_CODE, SSH_MSG_UNIMPLEMENTED,
};
use crate::stats::DataTransferStats;

/// Sanity bound on a single incoming packet (RFC 4253 requires us to
/// accept at least 35000 bytes; anything beyond this is hostile).
pub const OUR_V2_PACKETLIMIT: usize = 262_144;

/// Remote-bug bit: peer dies if sent SSH_MSG_IGNORE, so the CBC
/// workaround must stay off.
pub const BUG_CHOKES_ON_SSH2_IGNORE: u32 = 0x0000_0001;

/// Censor callback: given a packet type and payload, returns the byte
/// ranges that must be blanked before the payload reaches the log.
pub type CensorFn = dyn Fn(u16, &[u8]) -> Vec<Range<usize>> + Send;

/// Per-direction framing state.
#[derive(Default)]
struct Direction {
    sequence: u32,
    cipher: Option<Box<dyn SshCipher>>,
    mac: Option<Box<dyn SshMac>>,
    etm_mode: bool,
}

/// Where the input machine resumes when more bytes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputState {
    /// Start of a fresh packet: size the scratch buffer, pick a path.
    Begin,
    /// CBC path: awaiting the first MAC-sized read.
    CbcReadMac,
    /// CBC path: awaiting the next cipher block of the verify loop.
    CbcReadBlock,
    /// EtM path: awaiting the 4-byte length field.
    EtmReadLength,
    /// EtM path: awaiting body plus tag.
    EtmReadRemainder,
    /// Standard path: awaiting the first cipher block.
    StdReadFirstBlock,
    /// Standard path: awaiting the rest of the frame.
    StdReadRemainder,
    /// Parked after delivering NEWKEYS, until new keys are installed.
    AwaitNewKeys,
}

/// Consume exactly the requested bytes from the chain, or suspend.
/// EOF on the chain wins over buffered data, mirroring the contract
/// that the flag is only set once the producer is gone for good.
macro_rules! bpp_read {
    ($self:ident, $chain:ident, $dst:expr) => {
        if $chain.eof() {
            return Err($self.closed_error());
        } else if !$chain.try_fetch_consume($dst) {
            return Ok(());
        }
    };
}

/// The SSH-2 binary packet protocol engine for one session.
pub struct Bpp {
    in_dir: Direction,
    out_dir: Direction,
    decompressor: Option<Box<dyn Decompressor>>,
    compressor: Option<Box<dyn Compressor>>,

    state: InputState,
    /// Scratch for bytes that cannot yet go into a sized packet buffer.
    buf: Vec<u8>,
    /// The in-flight inbound packet, once its size is known.
    data: Vec<u8>,
    len: usize,
    pad: usize,
    packetlen: usize,
    maclen: usize,
    maxlen: usize,
    cipherblk: usize,

    pending_newkeys: bool,
    cbc_ignore_workaround: bool,
    expect_close: bool,
    remote_bugs: u32,
    stats: DataTransferStats,
    dead: bool,

    in_queue: VecDeque<PktIn>,
    out_queue: VecDeque<PktOut>,
    censor: Option<Box<CensorFn>>,
}

impl Bpp {
    pub fn new(stats: DataTransferStats, remote_bugs: u32) -> Self {
        Self {
            in_dir: Direction::default(),
            out_dir: Direction::default(),
            decompressor: None,
            compressor: None,
            state: InputState::Begin,
            buf: Vec::new(),
            data: Vec::new(),
            len: 0,
            pad: 0,
            packetlen: 0,
            maclen: 0,
            maxlen: 0,
            cipherblk: 8,
            pending_newkeys: false,
            cbc_ignore_workaround: false,
            expect_close: false,
            remote_bugs,
            stats,
            dead: false,
            in_queue: VecDeque::new(),
            out_queue: VecDeque::new(),
            censor: None,
        }
    }

    pub fn stats(&self) -> &DataTransferStats {
        &self.stats
    }

    /// Remote closure will not be treated as an error once set.
    pub fn set_expect_close(&mut self, expect: bool) {
        self.expect_close = expect;
    }

    /// Install the packet-log censor. While set, packet payloads are
    /// hex-dumped to the trace log with the censored ranges blanked.
    pub fn set_censor(&mut self, censor: Box<CensorFn>) {
        self.censor = Some(censor);
    }

    pub fn pending_newkeys(&self) -> bool {
        self.pending_newkeys
    }

    /// Pop the next decoded inbound packet, if any.
    pub fn next_packet(&mut self) -> Option<PktIn> {
        self.in_queue.pop_front()
    }

    /// Queue an outbound packet for the next `handle_output`.
    pub fn enqueue(&mut self, pkt: PktOut) {
        self.out_queue.push_back(pkt);
    }

    pub fn has_queued_output(&self) -> bool {
        !self.out_queue.is_empty()
    }

    /// Build and queue an SSH_MSG_DISCONNECT.
    pub fn queue_disconnect(&mut self, msg: &str, category: u32) {
        let mut pkt = PktOut::new(SSH_MSG_DISCONNECT);
        pkt.put_u32(category);
        pkt.put_str(msg);
        pkt.put_str("en");
        self.out_queue.push_back(pkt);
    }

    /// Replace the outbound cipher/MAC/compression set. Handles are
    /// pre-keyed by the key exchange layer; `None` compression is the
    /// identity. Any previous handles are dropped here.
    pub fn install_outgoing_crypto(
        &mut self,
        cipher: Option<Box<dyn SshCipher>>,
        mac: Option<Box<dyn SshMac>>,
        etm_mode: bool,
        compressor: Option<Box<dyn Compressor>>,
    ) {
        self.cbc_ignore_workaround = match &cipher {
            Some(c) => {
                c.flags().is_cbc() && self.remote_bugs & BUG_CHOKES_ON_SSH2_IGNORE == 0
            }
            None => false,
        };
        self.out_dir.cipher = cipher;
        self.out_dir.mac = mac;
        self.out_dir.etm_mode = etm_mode;
        self.compressor = compressor;
    }

    /// Replace the inbound cipher/MAC/compression set and unblock the
    /// input machine if it was parked on NEWKEYS.
    pub fn install_incoming_crypto(
        &mut self,
        cipher: Option<Box<dyn SshCipher>>,
        mac: Option<Box<dyn SshMac>>,
        etm_mode: bool,
        decompressor: Option<Box<dyn Decompressor>>,
    ) {
        self.in_dir.cipher = cipher;
        self.in_dir.mac = mac;
        self.in_dir.etm_mode = etm_mode;
        self.decompressor = decompressor;
        self.pending_newkeys = false;
    }

    fn closed_error(&self) -> Error {
        if self.expect_close {
            Error::RemoteEof
        } else {
            Error::RemoteError("Server unexpectedly closed network connection".into())
        }
    }

    fn in_cipherblk(&self) -> usize {
        self.in_dir.cipher.as_ref().map_or(8, |c| c.block_size()).max(8)
    }

    fn out_cipherblk(&self) -> usize {
        self.out_dir.cipher.as_ref().map_or(8, |c| c.block_size()).max(8)
    }

    /// Run the input machine over whatever the chain currently holds.
    /// Decoded packets accumulate in the inbound queue; a returned
    /// error is terminal for the session.
    pub fn handle_input(&mut self, in_raw: &mut BufChain) -> Result<()> {
        if self.dead {
            let _ = in_raw.take_all();
            return Ok(());
        }
        let outcome = self.run_input(in_raw);
        if outcome.is_err() {
            self.dead = true;
        }
        outcome
    }

    fn run_input(&mut self, chain: &mut BufChain) -> Result<()> {
        loop {
            match self.state {
                InputState::Begin => {
                    self.maxlen = 0;
                    self.cipherblk = self.in_cipherblk();
                    self.maclen = self.in_dir.mac.as_ref().map_or(0, |m| m.tag_len());

                    let cbc_mte = self
                        .in_dir
                        .cipher
                        .as_ref()
                        .is_some_and(|c| c.flags().is_cbc())
                        && self.in_dir.mac.is_some()
                        && !self.in_dir.etm_mode;

                    if cbc_mte {
                        // Room for a maximum-size packet: the verify
                        // loop cannot size the buffer from the (still
                        // untrusted) length field.
                        let buflimit = OUR_V2_PACKETLIMIT + self.maclen;
                        if self.buf.len() < buflimit {
                            self.buf.resize(buflimit, 0);
                        }
                        self.state = InputState::CbcReadMac;
                    } else if self.in_dir.mac.is_some() && self.in_dir.etm_mode {
                        if self.buf.len() < 4 {
                            self.buf.resize(4, 0);
                        }
                        self.state = InputState::EtmReadLength;
                    } else {
                        if self.buf.len() < self.cipherblk {
                            self.buf.resize(self.cipherblk, 0);
                        }
                        self.state = InputState::StdReadFirstBlock;
                    }
                }

                InputState::CbcReadMac => {
                    let maclen = self.maclen;
                    bpp_read!(self, chain, &mut self.buf[..maclen]);
                    self.packetlen = 0;
                    let seq = self.in_dir.sequence;
                    if let Some(mac) = self.in_dir.mac.as_mut() {
                        mac.start();
                        mac.put(&seq.to_be_bytes());
                    }
                    self.state = InputState::CbcReadBlock;
                }

                InputState::CbcReadBlock => {
                    // Once around this loop per cipher block. The tail
                    // `maclen` bytes of the region read so far are the
                    // current candidate tag and stay undecrypted.
                    loop {
                        let (plen, mlen, cblk) = (self.packetlen, self.maclen, self.cipherblk);
                        bpp_read!(self, chain, &mut self.buf[plen + mlen..plen + mlen + cblk]);
                        if let Some(c) = self.in_dir.cipher.as_mut() {
                            c.decrypt(&mut self.buf[plen..plen + cblk]);
                        }
                        if let Some(m) = self.in_dir.mac.as_mut() {
                            m.put(&self.buf[plen..plen + cblk]);
                        }
                        self.packetlen += cblk;

                        let tag = &self.buf[self.packetlen..self.packetlen + mlen];
                        let mac_ok = self
                            .in_dir
                            .mac
                            .as_ref()
                            .is_some_and(|m| m.result_matches(tag));
                        if mac_ok {
                            // Only now is the length field trustworthy.
                            let len = u32::from_be_bytes([
                                self.buf[0],
                                self.buf[1],
                                self.buf[2],
                                self.buf[3],
                            ]) as usize;
                            if len == self.packetlen - 4 {
                                self.len = len;
                                break;
                            }
                        }
                        if self.packetlen >= OUR_V2_PACKETLIMIT {
                            return Err(Error::SwAbort(
                                "No valid incoming packet found".into(),
                            ));
                        }
                    }
                    self.maxlen = self.packetlen + self.maclen;
                    self.data = self.buf[..self.maxlen].to_vec();
                    self.deliver()?;
                }

                InputState::EtmReadLength => {
                    bpp_read!(self, chain, &mut self.buf[..4]);
                    let seq = self.in_dir.sequence;
                    // The wire copy stays untouched so the MAC still
                    // covers the original length bytes.
                    let mut lenfield = [self.buf[0], self.buf[1], self.buf[2], self.buf[3]];
                    if let Some(c) = self.in_dir.cipher.as_mut() {
                        if c.flags().separate_length() {
                            c.decrypt_length(&mut lenfield, seq);
                        }
                    }
                    self.len = u32::from_be_bytes(lenfield) as usize;
                    if self.len > OUR_V2_PACKETLIMIT || self.len % self.cipherblk != 0 {
                        return Err(Error::SwAbort(
                            "Incoming packet length field was garbled".into(),
                        ));
                    }
                    self.packetlen = self.len + 4;
                    self.data = vec![0u8; self.packetlen + self.maclen];
                    self.data[..4].copy_from_slice(&self.buf[..4]);
                    self.state = InputState::EtmReadRemainder;
                }

                InputState::EtmReadRemainder => {
                    let (plen, mlen) = (self.packetlen, self.maclen);
                    bpp_read!(self, chain, &mut self.data[4..plen + mlen]);

                    let seq = self.in_dir.sequence;
                    let len = self.len;
                    let verified = match self.in_dir.mac.as_mut() {
                        Some(m) => m.verify(&self.data, len + 4, seq),
                        None => true,
                    };
                    if !verified {
                        return Err(Error::SwAbort("Incorrect MAC received on packet".into()));
                    }
                    // Decrypt everything between the length field and
                    // the MAC.
                    if let Some(c) = self.in_dir.cipher.as_mut() {
                        c.decrypt(&mut self.data[4..plen]);
                    }
                    self.maxlen = plen + mlen;
                    self.deliver()?;
                }

                InputState::StdReadFirstBlock => {
                    let cblk = self.cipherblk;
                    bpp_read!(self, chain, &mut self.buf[..cblk]);
                    if let Some(c) = self.in_dir.cipher.as_mut() {
                        c.decrypt(&mut self.buf[..cblk]);
                    }
                    self.len = u32::from_be_bytes([
                        self.buf[0],
                        self.buf[1],
                        self.buf[2],
                        self.buf[3],
                    ]) as usize;
                    if self.len > OUR_V2_PACKETLIMIT || (self.len + 4) % cblk != 0 {
                        return Err(Error::SwAbort(
                            "Incoming packet was garbled on decryption".into(),
                        ));
                    }
                    self.packetlen = self.len + 4;
                    self.maxlen = self.packetlen + self.maclen;
                    self.data = vec![0u8; self.maxlen];
                    self.data[..cblk].copy_from_slice(&self.buf[..cblk]);
                    self.state = InputState::StdReadRemainder;
                }

                InputState::StdReadRemainder => {
                    let (plen, mlen, cblk) = (self.packetlen, self.maclen, self.cipherblk);
                    bpp_read!(self, chain, &mut self.data[cblk..plen + mlen]);

                    // Decrypt everything except the MAC.
                    if let Some(c) = self.in_dir.cipher.as_mut() {
                        c.decrypt(&mut self.data[cblk..plen]);
                    }
                    let seq = self.in_dir.sequence;
                    let len = self.len;
                    let verified = match self.in_dir.mac.as_mut() {
                        Some(m) => m.verify(&self.data, len + 4, seq),
                        None => true,
                    };
                    if !verified {
                        return Err(Error::SwAbort("Incorrect MAC received on packet".into()));
                    }
                    self.deliver()?;
                }

                InputState::AwaitNewKeys => {
                    if self.pending_newkeys {
                        return Ok(());
                    }
                    self.state = InputState::Begin;
                }
            }
        }
    }

    /// Common tail for all three framing paths: padding sanity,
    /// accounting, decompression, type extraction, filtering, delivery.
    fn deliver(&mut self) -> Result<()> {
        self.pad = self.data[4] as usize;
        if self.pad < 4 || self.len < self.pad + 1 {
            return Err(Error::SwAbort(
                "Invalid padding length on received packet".into(),
            ));
        }
        let payload_len = self.len - self.pad - 1;
        let mut length = payload_len + 5;

        self.stats.inbound.consume(self.packetlen as u64);

        let sequence = self.in_dir.sequence;
        self.in_dir.sequence = self.in_dir.sequence.wrapping_add(1);

        if let Some(d) = self.decompressor.as_mut() {
            if let Some(expanded) = d.decompress(&self.data[5..length]) {
                let mut grown = Vec::with_capacity(5 + expanded.len());
                grown.extend_from_slice(&self.data[..5]);
                grown.extend_from_slice(&expanded);
                length = grown.len();
                let mut old = std::mem::replace(&mut self.data, grown);
                old.zeroize();
            }
        }

        let (ty, payload) = if length <= 5 {
            // A packet so short it has no type byte. Not explicitly
            // forbidden by RFC 4253; answered with UNIMPLEMENTED below.
            (SSH_MSG_NO_TYPE_CODE, Vec::new())
        } else {
            (self.data[5] as u16, self.data[6..length].to_vec())
        };
        self.data = Vec::new();

        self.log_packet(false, ty, sequence, &payload);

        if !is_recognized(ty) {
            debug!(
                "unrecognized packet type {} (seq {}), replying SSH_MSG_UNIMPLEMENTED",
                ty, sequence
            );
            let mut reply = PktOut::new(SSH_MSG_UNIMPLEMENTED);
            reply.put_u32(sequence);
            self.out_queue.push_back(reply);
            self.state = InputState::Begin;
            return Ok(());
        }

        let pktin = PktIn::new(ty, sequence, payload);
        match ty as u8 {
            SSH_MSG_IGNORE | SSH_MSG_DEBUG => {
                self.state = InputState::Begin;
                Ok(())
            }
            SSH_MSG_DISCONNECT => {
                let mut r = pktin.reader();
                let reason = r.get_u32();
                let msg = String::from_utf8_lossy(r.get_string()).into_owned();
                Err(Error::RemoteError(format!(
                    "Remote side sent disconnect message (reason {reason}): \"{msg}\""
                )))
            }
            SSH_MSG_NEWKEYS => {
                // Suspend input until the transport layer has installed
                // the newly negotiated keys.
                self.in_queue.push_back(pktin);
                self.pending_newkeys = true;
                self.state = InputState::AwaitNewKeys;
                Ok(())
            }
            _ => {
                self.in_queue.push_back(pktin);
                self.state = InputState::Begin;
                Ok(())
            }
        }
    }

    /// Format and flush every queued outbound packet onto the wire
    /// chain, in dequeue order.
    pub fn handle_output(&mut self, out_raw: &mut BufChain) -> Result<()> {
        if self.dead {
            self.out_queue.clear();
            return Ok(());
        }
        if self.out_queue.is_empty() {
            return Ok(());
        }

        if self.cbc_ignore_workaround {
            // An attacker must not get to choose plaintext for a known
            // IV. If the previous packet's last cipher block may have
            // left for the network already, put an IGNORE in front so
            // the next real packet starts from an unpredictable IV.
            let iv_exposed = match (&self.out_dir.cipher, &self.out_dir.mac) {
                (Some(c), Some(m)) => out_raw.len() < c.block_size() + m.tag_len(),
                _ => false,
            };
            if iv_exposed {
                let mut pkt = PktOut::new(SSH_MSG_IGNORE);
                pkt.put_str("");
                self.format_packet_inner(pkt, out_raw);
            }
        }

        while let Some(pkt) = self.out_queue.pop_front() {
            self.format_packet(pkt, out_raw);
        }
        Ok(())
    }

    fn format_packet(&mut self, pkt: PktOut, out_raw: &mut BufChain) {
        if pkt.minlen > 0 && self.compressor.is_none() {
            // No compressor to pad the payload for us, so project the
            // finished frame size and, if it falls short, precede the
            // packet with an IGNORE that closes the gap. (Raising the
            // explicit padding field instead is known to break some
            // servers.)
            let block = self.out_cipherblk();
            let mut length = pkt.len();
            length += 4; // minimum padding
            length += block - 1;
            length -= length % block;
            if let Some(m) = &self.out_dir.mac {
                length += m.tag_len();
            }

            if length < pkt.minlen {
                let mut gap = pkt.minlen - length;
                if let Some(m) = &self.out_dir.mac {
                    gap = gap.saturating_sub(m.tag_len());
                }
                gap = gap.saturating_sub(8); // length field + min padding
                gap = gap.saturating_sub(5); // type code + string length prefix

                let mut filler = vec![0u8; gap];
                rand::thread_rng().fill_bytes(&mut filler);
                let mut ignore = PktOut::new(SSH_MSG_IGNORE);
                ignore.put_string(&filler);
                self.format_packet_inner(ignore, out_raw);
            }
        }

        self.format_packet_inner(pkt, out_raw);
    }

    fn format_packet_inner(&mut self, mut pkt: PktOut, out_raw: &mut BufChain) {
        self.log_packet(true, pkt.ty as u16, self.out_dir.sequence, pkt.payload());

        let cipherblk = self.out_cipherblk();

        if let Some(comp) = self.compressor.as_mut() {
            let mut min = pkt.minlen;
            if min > 0 {
                if let Some(m) = &self.out_dir.mac {
                    min = min.saturating_sub(m.tag_len());
                }
                min = min.saturating_sub(8); // length field + min padding
            }
            let body = pkt.as_slice()[5..].to_vec();
            let squeezed = comp.compress(&body, min);
            pkt.truncate(5);
            pkt.put_raw(&squeezed);
        }

        // At least four bytes of padding, bringing the encrypted span
        // up to a multiple of the block size. In EtM mode the 4-byte
        // length field stays outside the encrypted span.
        let unencrypted_prefix =
            if self.out_dir.mac.is_some() && self.out_dir.etm_mode { 4 } else { 0 };
        let mut padding = pkt.forcepad.max(4);
        padding +=
            (cipherblk - (pkt.len() - unencrypted_prefix + padding) % cipherblk) % cipherblk;
        assert!(padding <= 255);

        let maclen = self.out_dir.mac.as_ref().map_or(0, |m| m.tag_len());
        let origlen = pkt.len();
        let seq = self.out_dir.sequence;

        let mut padbytes = vec![0u8; padding];
        rand::thread_rng().fill_bytes(&mut padbytes);
        pkt.put_raw(&padbytes);

        {
            let frame = pkt.as_mut_slice();
            frame[4] = padding as u8;
            let wire_len = (origlen + padding - 4) as u32;
            frame[..4].copy_from_slice(&wire_len.to_be_bytes());
        }

        if let Some(c) = self.out_dir.cipher.as_mut() {
            if c.flags().separate_length() {
                let frame = pkt.as_mut_slice();
                let mut lenfield = [frame[0], frame[1], frame[2], frame[3]];
                c.encrypt_length(&mut lenfield, seq);
                frame[..4].copy_from_slice(&lenfield);
            }
        }

        pkt.put_zeroes(maclen);
        let body = origlen + padding;

        if self.out_dir.mac.is_some() && self.out_dir.etm_mode {
            // OpenSSH encrypt-then-MAC: cipher first, tag over the
            // ciphertext including the (cleartext) length field.
            if let Some(c) = self.out_dir.cipher.as_mut() {
                c.encrypt(&mut pkt.as_mut_slice()[4..body]);
            }
            if let Some(m) = self.out_dir.mac.as_mut() {
                m.generate(pkt.as_mut_slice(), body, seq);
            }
        } else {
            // SSH-2 standard: tag over the plaintext, then encrypt the
            // whole frame.
            if let Some(m) = self.out_dir.mac.as_mut() {
                m.generate(pkt.as_mut_slice(), body, seq);
            }
            if let Some(c) = self.out_dir.cipher.as_mut() {
                c.encrypt(&mut pkt.as_mut_slice()[..body]);
            }
        }

        self.out_dir.sequence = seq.wrapping_add(1);
        self.stats.outbound.consume(body as u64);

        out_raw.append(pkt.into_wire());
    }

    fn log_packet(&self, outgoing: bool, ty: u16, sequence: u32, payload: &[u8]) {
        let dir = if outgoing { "outgoing" } else { "incoming" };
        match &self.censor {
            Some(censor) => {
                let blanks = censor(ty, payload);
                let mut shown = payload.to_vec();
                let mut blanked = 0usize;
                for range in blanks {
                    let start = range.start.min(shown.len());
                    let end = range.end.min(shown.len());
                    shown[start..end].fill(0);
                    blanked += end - start;
                }
                trace!(
                    "{} packet type {} seq {} len {} ({} bytes censored): {}",
                    dir,
                    ty,
                    sequence,
                    payload.len(),
                    blanked,
                    hex::encode(&shown)
                );
            }
            None => {
                trace!(
                    "{} packet type {} seq {} len {}",
                    dir,
                    ty,
                    sequence,
                    payload.len()
                );
            }
        }
    }
}

/// Message codes an SSH-2 client stack consumes somewhere above us:
/// the transport, userauth and connection ranges of RFC 4253 §12.
/// Anything else earns an SSH_MSG_UNIMPLEMENTED reply.
fn is_recognized(ty: u16) -> bool {
    (1..=127).contains(&ty)
}
