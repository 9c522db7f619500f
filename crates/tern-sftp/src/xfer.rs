//! Pipelined transfer engine
//!
//! A transfer keeps a window of outstanding READ or WRITE requests in
//! flight over one open file handle. Requests complete at the wire in
//! whatever order the server likes; the issue-ordered queue is what
//! guarantees that a download hands its bytes back contiguously.
//! Upload acknowledgements may land for any queue position, so nodes
//! are unlinked from the interior as they arrive.

use std::collections::VecDeque;

use tracing::trace;

use crate::client::FileHandle;

/// Outcome of feeding a response packet to a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotPacket {
    /// The packet belonged to this transfer and was processed.
    Progress,
    /// The packet belonged to this transfer and reported failure; the
    /// transfer is now in the error state.
    Failed,
    /// The packet was not part of this transfer. The caller should
    /// route it elsewhere.
    Unclaimed,
}

#[derive(Debug)]
struct XferReq {
    key: u64,
    offset: u64,
    len: u32,
    retlen: u32,
    /// 0 = outstanding, +1 = data ready, -1 = finished without data.
    complete: i8,
    buffer: Vec<u8>,
}

/// One pipelined bulk transfer over an open file handle.
#[derive(Debug)]
pub struct Transfer {
    handle: FileHandle,
    offset: u64,
    furthestdata: u64,
    /// Tentative EOF, lowered whenever a short read comes back.
    filesize: u64,
    req_totalsize: u32,
    req_maxsize: u32,
    eof: bool,
    err: bool,
    reqs: VecDeque<XferReq>,
    next_key: u64,
    violation: Option<&'static str>,
}

impl Transfer {
    pub(crate) fn new(handle: FileHandle, offset: u64, req_maxsize: u32, upload: bool) -> Self {
        Self {
            handle,
            offset,
            furthestdata: 0,
            filesize: u64::MAX,
            req_totalsize: 0,
            req_maxsize,
            // For an upload the caller knows when all data has been
            // produced; setting eof up front makes done() mean "all
            // outstanding writes acknowledged".
            eof: upload,
            err: false,
            reqs: VecDeque::new(),
            next_key: 0,
            violation: None,
        }
    }

    pub(crate) fn handle(&self) -> &FileHandle {
        &self.handle
    }

    /// Finished: EOF or error seen, and nothing left in flight.
    pub fn done(&self) -> bool {
        (self.eof || self.err) && self.reqs.is_empty()
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn error(&self) -> bool {
        self.err
    }

    pub fn set_error(&mut self) {
        self.err = true;
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.reqs.len()
    }

    /// Bytes covered by in-flight requests.
    pub fn outstanding_bytes(&self) -> u32 {
        self.req_totalsize
    }

    pub(crate) fn can_queue(&self) -> bool {
        self.req_totalsize < self.req_maxsize && !self.eof && !self.err
    }

    /// Append a request node covering the next `len` bytes; returns
    /// its key and file offset.
    pub(crate) fn push_req(&mut self, len: u32) -> (u64, u64) {
        let key = self.next_key;
        self.next_key += 1;
        let offset = self.offset;
        self.reqs.push_back(XferReq {
            key,
            offset,
            len,
            retlen: 0,
            complete: 0,
            buffer: Vec::new(),
        });
        self.offset += u64::from(len);
        self.req_totalsize += len;
        (key, offset)
    }

    pub(crate) fn req_len(&self, key: u64) -> Option<u32> {
        self.reqs.iter().find(|r| r.key == key).map(|r| r.len)
    }

    /// Record the result of a READ: `Some(n)` for n bytes (0 meaning
    /// EOF, whether the server said so with an empty DATA or a
    /// STATUS), `None` for an error.
    pub(crate) fn apply_read_result(
        &mut self,
        key: u64,
        result: Option<usize>,
        buffer: Vec<u8>,
    ) -> GotPacket {
        let (node_offset, node_len, retlen);
        {
            let Some(node) = self.reqs.iter_mut().find(|r| r.key == key) else {
                return GotPacket::Unclaimed;
            };
            match result {
                None => {
                    self.err = true;
                    node.complete = -1;
                    return GotPacket::Failed;
                }
                Some(0) => {
                    self.eof = true;
                    node.retlen = 0;
                    node.complete = -1;
                }
                Some(n) => {
                    node.retlen = n as u32;
                    node.buffer = buffer;
                    node.complete = 1;
                }
            }
            node_offset = node.offset;
            node_len = node.len;
            retlen = node.retlen;
        }

        if retlen > 0 && self.furthestdata < node_offset {
            self.furthestdata = node_offset;
        }

        if retlen < node_len {
            let filesize = node_offset + u64::from(retlen);
            if filesize < self.filesize {
                trace!("short read; tentative file size {}", filesize);
                self.filesize = filesize;
            }
        }

        if self.furthestdata > self.filesize {
            // The server handed us a short buffer somewhere below data
            // it had already returned. Nothing sane can come of that.
            self.violation = Some("received a short buffer from FXP_READ, but not at EOF");
            self.err = true;
            return GotPacket::Failed;
        }

        GotPacket::Progress
    }

    pub(crate) fn take_violation(&mut self) -> Option<&'static str> {
        self.violation.take()
    }

    /// Drain the next completed block, in issue order. Nodes that
    /// finished without data are skipped silently; `None` means the
    /// head of the queue is still outstanding (or the queue is empty).
    pub fn download_data(&mut self) -> Option<Vec<u8>> {
        while let Some(head) = self.reqs.front() {
            if head.complete == 0 {
                return None;
            }
            let mut node = self.reqs.pop_front()?;
            self.req_totalsize -= node.len;
            if node.complete > 0 {
                node.buffer.truncate(node.retlen as usize);
                return Some(node.buffer);
            }
        }
        None
    }

    /// Unlink an acknowledged upload node, wherever it sits in the
    /// queue.
    pub(crate) fn remove_req(&mut self, key: u64) -> bool {
        let Some(pos) = self.reqs.iter().position(|r| r.key == key) else {
            return false;
        };
        if let Some(node) = self.reqs.remove(pos) {
            self.req_totalsize -= node.len;
        }
        true
    }

    /// Drop every pending node and its buffer.
    pub fn cleanup(&mut self) {
        self.reqs.clear();
        self.req_totalsize = 0;
    }
}
