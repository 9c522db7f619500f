//! SFTP client core
//!
//! Runs the request/response layer over any established byte channel
//! (ordinarily an SSH session channel with the "sftp" subsystem
//! started). Every primitive has a split-phase API: `*_send` allocates
//! a request ID, assembles the packet and puts it on the wire;
//! `*_recv` parses the matched response. The convenience methods at
//! the bottom pair the phases for callers with one request in flight,
//! and `get`/`put` drive the pipelined transfer engine.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::packet::{SftpPacketIn, SftpPacketOut};
use crate::protocol::{status_message, FileAttrs, MessageType, OpenFlags, StatusCode};
use crate::requests::{RequestHandle, RequestSet};
use crate::xfer::{GotPacket, Transfer};

/// An open remote file or directory (an opaque server-issued string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    hstring: Vec<u8>,
}

impl FileHandle {
    pub(crate) fn from_bytes(hstring: Vec<u8>) -> Self {
        Self { hstring }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.hstring
    }
}

/// One FXP_NAME directory entry.
#[derive(Debug, Clone)]
pub struct Name {
    pub filename: String,
    pub longname: String,
    pub attrs: FileAttrs,
}

/// SFTP client over a byte channel.
pub struct SftpClient<S> {
    stream: S,
    requests: RequestSet,
    config: TransferConfig,
    last_error_code: i32,
    last_error_message: String,
    send_buffered: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SftpClient<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, TransferConfig::default())
    }

    pub fn with_config(stream: S, config: TransferConfig) -> Self {
        Self {
            stream,
            requests: RequestSet::new(),
            config,
            last_error_code: 0,
            last_error_message: String::new(),
            send_buffered: 0,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// The most recent error: the server status code (or -1 for a
    /// local protocol error) and its message.
    pub fn last_error(&self) -> (i32, &str) {
        (self.last_error_code, &self.last_error_message)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    // -----------------------------------------------------------------
    // Wire I/O

    async fn send_packet(&mut self, pkt: SftpPacketOut) -> Result<()> {
        let frame = pkt.finish();
        self.send_buffered = frame.len();
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        self.send_buffered = 0;
        Ok(())
    }

    /// Read the next packet off the channel.
    pub async fn recv_packet(&mut self) -> Result<SftpPacketIn> {
        let mut lenbuf = [0u8; 4];
        self.stream.read_exact(&mut lenbuf).await?;
        let len = u32::from_be_bytes(lenbuf) as usize;
        let mut frame = vec![0u8; len];
        self.stream.read_exact(&mut frame).await?;
        match SftpPacketIn::from_frame(frame) {
            Some(pktin) => Ok(pktin),
            None => Err(self.internal_error("did not receive a valid SFTP packet")),
        }
    }

    /// Match a response to its outstanding request, removing the
    /// request from the registry. The second element is the userdata
    /// tag, if one was attached.
    pub fn find_request(
        &mut self,
        pktin: &mut SftpPacketIn,
    ) -> Result<(RequestHandle, Option<u64>)> {
        let id = pktin.get_u32();
        if !pktin.ok() {
            return Err(self.internal_error("did not receive a valid SFTP packet"));
        }
        match self.requests.find(id) {
            Some(found) => Ok(found),
            None => Err(self.internal_error("request ID mismatch")),
        }
    }

    // -----------------------------------------------------------------
    // Error context

    fn internal_error(&mut self, msg: &str) -> Error {
        self.last_error_code = -1;
        self.last_error_message = msg.to_string();
        Error::Protocol(msg.to_string())
    }

    /// Digest an FXP_STATUS packet: +1 for OK, 0 for EOF, -1 for
    /// anything else, recording code and message either way.
    fn got_status(&mut self, pktin: &mut SftpPacketIn) -> i32 {
        if pktin.ty != MessageType::Status as u8 {
            self.last_error_code = -1;
            self.last_error_message = "expected FXP_STATUS packet".into();
        } else {
            let code = pktin.get_u32() as i32;
            if !pktin.ok() {
                self.last_error_code = -1;
                self.last_error_message = "malformed FXP_STATUS packet".into();
            } else {
                self.last_error_code = code;
                self.last_error_message = status_message(code).into();
            }
        }

        if self.last_error_code == StatusCode::Ok as i32 {
            1
        } else if self.last_error_code == StatusCode::Eof as i32 {
            0
        } else {
            -1
        }
    }

    fn recorded_error(&self) -> Error {
        Error::Status {
            code: self.last_error_code,
            message: self.last_error_message.clone(),
        }
    }

    /// For ops whose happy path is some other packet type: digest the
    /// STATUS (or complain about its absence) and surface it.
    fn status_error(&mut self, pktin: &mut SftpPacketIn) -> Error {
        self.got_status(pktin);
        self.recorded_error()
    }

    /// For ops whose happy path *is* FXP_STATUS(OK).
    fn status_recv(&mut self, mut pktin: SftpPacketIn) -> Result<()> {
        if self.got_status(&mut pktin) == 1 {
            Ok(())
        } else {
            Err(self.recorded_error())
        }
    }

    fn got_handle(&mut self, pktin: &mut SftpPacketIn) -> Result<FileHandle> {
        let hstring = pktin.get_string().to_vec();
        if !pktin.ok() {
            return Err(self.internal_error("received malformed FXP_HANDLE"));
        }
        Ok(FileHandle::from_bytes(hstring))
    }

    // -----------------------------------------------------------------
    // Session setup

    /// Exchange INIT/VERSION. Succeeds iff the server's version is no
    /// newer than ours.
    pub async fn init(&mut self) -> Result<()> {
        debug!("initializing SFTP protocol");
        let mut pkt = SftpPacketOut::new(MessageType::Init);
        pkt.put_u32(self.config.protocol_version);
        self.send_packet(pkt).await?;

        let mut pktin = self.recv_packet().await?;
        if pktin.ty != MessageType::Version as u8 {
            return Err(self.internal_error("did not receive FXP_VERSION"));
        }
        let remotever = pktin.get_u32();
        if !pktin.ok() {
            return Err(self.internal_error("malformed FXP_VERSION packet"));
        }
        if remotever > self.config.protocol_version {
            return Err(
                self.internal_error("remote protocol is more advanced than we support")
            );
        }
        // The VERSION packet may also carry extension pairs; we
        // recognise none of them.
        info!("SFTP server speaks protocol version {}", remotever);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Split-phase primitives

    pub async fn realpath_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Realpath);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn realpath_recv(&mut self, mut pktin: SftpPacketIn) -> Result<String> {
        if pktin.ty == MessageType::Name as u8 {
            let count = pktin.get_u32();
            if !pktin.ok() || count != 1 {
                return Err(self.internal_error("REALPATH did not return name count of 1"));
            }
            let name = pktin.get_string().to_vec();
            if !pktin.ok() {
                return Err(self.internal_error("REALPATH returned malformed FXP_NAME"));
            }
            Ok(String::from_utf8_lossy(&name).into_owned())
        } else {
            Err(self.status_error(&mut pktin))
        }
    }

    pub async fn open_send(
        &mut self,
        path: &str,
        flags: OpenFlags,
        attrs: Option<&FileAttrs>,
    ) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Open);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        pkt.put_u32(flags.0);
        match attrs {
            Some(attrs) => pkt.put_attrs(attrs),
            None => pkt.put_u32(0), // empty ATTRS structure
        }
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn open_recv(&mut self, mut pktin: SftpPacketIn) -> Result<FileHandle> {
        if pktin.ty == MessageType::Handle as u8 {
            self.got_handle(&mut pktin)
        } else {
            Err(self.status_error(&mut pktin))
        }
    }

    pub async fn opendir_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Opendir);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn opendir_recv(&mut self, mut pktin: SftpPacketIn) -> Result<FileHandle> {
        if pktin.ty == MessageType::Handle as u8 {
            self.got_handle(&mut pktin)
        } else {
            Err(self.status_error(&mut pktin))
        }
    }

    pub async fn close_send(&mut self, handle: FileHandle) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Close);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn close_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn mkdir_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Mkdir);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        pkt.put_u32(0); // empty ATTRS structure
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn mkdir_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn rmdir_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Rmdir);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn rmdir_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn remove_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Remove);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn remove_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn rename_send(&mut self, src: &str, dst: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Rename);
        pkt.put_u32(req.id());
        pkt.put_str(src);
        pkt.put_str(dst);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn rename_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn stat_send(&mut self, path: &str) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Stat);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn stat_recv(&mut self, mut pktin: SftpPacketIn) -> Result<FileAttrs> {
        if pktin.ty == MessageType::Attrs as u8 {
            let attrs = pktin.get_attrs();
            if !pktin.ok() {
                return Err(self.internal_error("malformed SSH_FXP_ATTRS packet"));
            }
            Ok(attrs)
        } else {
            Err(self.status_error(&mut pktin))
        }
    }

    pub async fn fstat_send(&mut self, handle: &FileHandle) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Fstat);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn fstat_recv(&mut self, pktin: SftpPacketIn) -> Result<FileAttrs> {
        self.stat_recv(pktin)
    }

    pub async fn setstat_send(&mut self, path: &str, attrs: &FileAttrs) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Setstat);
        pkt.put_u32(req.id());
        pkt.put_str(path);
        pkt.put_attrs(attrs);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn setstat_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn fsetstat_send(
        &mut self,
        handle: &FileHandle,
        attrs: &FileAttrs,
    ) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Fsetstat);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        pkt.put_attrs(attrs);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn fsetstat_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn read_send(
        &mut self,
        handle: &FileHandle,
        offset: u64,
        len: u32,
    ) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Read);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        pkt.put_u64(offset);
        pkt.put_u32(len);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    /// Copy a DATA response into `buf`. Returns the byte count; zero
    /// means end of file, whether the server signalled it with an
    /// empty DATA or a STATUS(EOF). Which of those appears at EOF is
    /// server-dependent.
    pub fn read_recv(&mut self, mut pktin: SftpPacketIn, buf: &mut [u8]) -> Result<usize> {
        if pktin.ty == MessageType::Data as u8 {
            let n = {
                let data = pktin.get_string();
                if data.len() > buf.len() {
                    usize::MAX
                } else {
                    buf[..data.len()].copy_from_slice(data);
                    data.len()
                }
            };
            if !pktin.ok() {
                return Err(self.internal_error("READ returned malformed SSH_FXP_DATA packet"));
            }
            if n == usize::MAX {
                return Err(self.internal_error("READ returned more bytes than requested"));
            }
            Ok(n)
        } else {
            match self.got_status(&mut pktin) {
                0 => Ok(0),
                _ => Err(self.recorded_error()),
            }
        }
    }

    pub async fn write_send(
        &mut self,
        handle: &FileHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Write);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        pkt.put_u64(offset);
        pkt.put_string(data);
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn write_recv(&mut self, pktin: SftpPacketIn) -> Result<()> {
        self.status_recv(pktin)
    }

    pub async fn readdir_send(&mut self, handle: &FileHandle) -> Result<RequestHandle> {
        let req = self.requests.alloc();
        let mut pkt = SftpPacketOut::new(MessageType::Readdir);
        pkt.put_u32(req.id());
        pkt.put_string(handle.as_bytes());
        self.send_packet(pkt).await?;
        Ok(req)
    }

    pub fn readdir_recv(&mut self, mut pktin: SftpPacketIn) -> Result<Vec<Name>> {
        if pktin.ty != MessageType::Name as u8 {
            return Err(self.status_error(&mut pktin));
        }
        let count = pktin.get_u32();
        // The smallest possible name entry is 12 bytes: an empty
        // filename, an empty longname and a bare attribute-flags word.
        if !pktin.ok() || count as usize > pktin.remaining() / 12 {
            return Err(self.internal_error("malformed FXP_NAME packet"));
        }
        if count as usize > isize::MAX as usize / std::mem::size_of::<Name>() {
            return Err(self.internal_error("unreasonably large FXP_NAME packet"));
        }

        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let filename = String::from_utf8_lossy(pktin.get_string()).into_owned();
            let longname = String::from_utf8_lossy(pktin.get_string()).into_owned();
            let attrs = pktin.get_attrs();
            names.push(Name {
                filename,
                longname,
                attrs,
            });
        }
        if !pktin.ok() {
            return Err(self.internal_error("malformed FXP_NAME packet"));
        }
        Ok(names)
    }

    // -----------------------------------------------------------------
    // Transfer engine

    /// Start a pipelined download at `offset` and fill the request
    /// window.
    pub async fn download_init(&mut self, handle: &FileHandle, offset: u64) -> Result<Transfer> {
        let mut xfer = Transfer::new(handle.clone(), offset, self.config.window_bytes, false);
        self.download_queue(&mut xfer).await?;
        Ok(xfer)
    }

    /// Top up the window with fixed-size reads.
    pub async fn download_queue(&mut self, xfer: &mut Transfer) -> Result<()> {
        while xfer.can_queue() {
            let len = self.config.read_chunk_size;
            let (key, offset) = xfer.push_req(len);
            let req = self.read_send(xfer.handle(), offset, len).await?;
            self.requests.register(req);
            self.requests.set_userdata(req, key);
            trace!("queued read request {} at offset {}", req.id(), offset);
        }
        Ok(())
    }

    /// Feed a response packet to a download.
    pub fn download_gotpkt(&mut self, xfer: &mut Transfer, mut pktin: SftpPacketIn) -> GotPacket {
        let Ok((_req, userdata)) = self.find_request(&mut pktin) else {
            return GotPacket::Unclaimed;
        };
        let Some(key) = userdata else {
            let _ = self.internal_error("request ID is not part of the current download");
            return GotPacket::Unclaimed;
        };
        let Some(len) = xfer.req_len(key) else {
            let _ = self.internal_error("request ID is not part of the current download");
            return GotPacket::Unclaimed;
        };

        let mut buffer = vec![0u8; len as usize];
        let result = self.read_recv(pktin, &mut buffer).ok();
        let outcome = xfer.apply_read_result(key, result, buffer);
        if let Some(msg) = xfer.take_violation() {
            let _ = self.internal_error(msg);
        }
        outcome
    }

    /// Start a pipelined upload at `offset`. `done()` on the returned
    /// transfer means "every issued write acknowledged"; producing the
    /// data and deciding when it ends is the caller's business.
    pub fn upload_init(&mut self, handle: &FileHandle, offset: u64) -> Transfer {
        Transfer::new(handle.clone(), offset, self.config.window_bytes, true)
    }

    /// True when the channel has accepted everything we gave it.
    pub fn upload_ready(&self) -> bool {
        self.send_buffered == 0
    }

    /// Issue the next write in an upload.
    pub async fn upload_data(&mut self, xfer: &mut Transfer, data: &[u8]) -> Result<()> {
        let (key, offset) = xfer.push_req(data.len() as u32);
        let req = self.write_send(xfer.handle(), offset, data).await?;
        self.requests.register(req);
        self.requests.set_userdata(req, key);
        Ok(())
    }

    /// Feed a response packet to an upload. A write NACK puts the
    /// transfer in the error state; the node is unlinked either way.
    pub fn upload_gotpkt(&mut self, xfer: &mut Transfer, mut pktin: SftpPacketIn) -> GotPacket {
        let Ok((_req, userdata)) = self.find_request(&mut pktin) else {
            return GotPacket::Unclaimed;
        };
        let Some(key) = userdata else {
            let _ = self.internal_error("request ID is not part of the current upload");
            return GotPacket::Unclaimed;
        };
        if !xfer.remove_req(key) {
            let _ = self.internal_error("request ID is not part of the current upload");
            return GotPacket::Unclaimed;
        }
        match self.write_recv(pktin) {
            Ok(()) => GotPacket::Progress,
            Err(_) => {
                xfer.set_error();
                GotPacket::Failed
            }
        }
    }

    // -----------------------------------------------------------------
    // Convenience drivers (single request in flight)

    /// Receive the reply to `req`, which must be the only outstanding
    /// request.
    pub async fn wait_for_reply(&mut self, req: RequestHandle) -> Result<SftpPacketIn> {
        let mut pktin = self.recv_packet().await?;
        let (found, _) = self.find_request(&mut pktin)?;
        if found != req {
            return Err(self.internal_error("request ID mismatch"));
        }
        Ok(pktin)
    }

    /// Canonify a pathname.
    pub async fn realpath(&mut self, path: &str) -> Result<String> {
        let req = self.realpath_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.realpath_recv(pktin)
    }

    pub async fn open(
        &mut self,
        path: &str,
        flags: OpenFlags,
        attrs: Option<&FileAttrs>,
    ) -> Result<FileHandle> {
        let req = self.open_send(path, flags, attrs).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.open_recv(pktin)
    }

    pub async fn opendir(&mut self, path: &str) -> Result<FileHandle> {
        let req = self.opendir_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.opendir_recv(pktin)
    }

    pub async fn close(&mut self, handle: FileHandle) -> Result<()> {
        let req = self.close_send(handle).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.close_recv(pktin)
    }

    pub async fn mkdir(&mut self, path: &str) -> Result<()> {
        debug!("creating directory {}", path);
        let req = self.mkdir_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.mkdir_recv(pktin)
    }

    pub async fn rmdir(&mut self, path: &str) -> Result<()> {
        debug!("removing directory {}", path);
        let req = self.rmdir_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.rmdir_recv(pktin)
    }

    pub async fn remove(&mut self, path: &str) -> Result<()> {
        debug!("removing file {}", path);
        let req = self.remove_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.remove_recv(pktin)
    }

    pub async fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("renaming {} to {}", src, dst);
        let req = self.rename_send(src, dst).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.rename_recv(pktin)
    }

    pub async fn stat(&mut self, path: &str) -> Result<FileAttrs> {
        let req = self.stat_send(path).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.stat_recv(pktin)
    }

    pub async fn fstat(&mut self, handle: &FileHandle) -> Result<FileAttrs> {
        let req = self.fstat_send(handle).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.fstat_recv(pktin)
    }

    pub async fn setstat(&mut self, path: &str, attrs: &FileAttrs) -> Result<()> {
        let req = self.setstat_send(path, attrs).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.setstat_recv(pktin)
    }

    pub async fn fsetstat(&mut self, handle: &FileHandle, attrs: &FileAttrs) -> Result<()> {
        let req = self.fsetstat_send(handle, attrs).await?;
        let pktin = self.wait_for_reply(req).await?;
        self.fsetstat_recv(pktin)
    }

    /// List a directory to completion.
    pub async fn list(&mut self, path: &str) -> Result<Vec<Name>> {
        debug!("listing directory {}", path);
        let handle = self.opendir(path).await?;
        let mut entries = Vec::new();
        loop {
            let req = self.readdir_send(&handle).await?;
            let pktin = self.wait_for_reply(req).await?;
            match self.readdir_recv(pktin) {
                Ok(batch) => entries.extend(batch),
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    let _ = self.close(handle).await;
                    return Err(e);
                }
            }
        }
        self.close(handle).await?;
        Ok(entries)
    }

    /// Download a whole file through the pipelined engine, writing the
    /// bytes to `dest` in order. Returns the byte count.
    pub async fn get<W>(&mut self, remote: &str, dest: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        info!("downloading {}", remote);
        let handle = self.open(remote, OpenFlags(OpenFlags::READ), None).await?;
        let mut xfer = self.download_init(&handle, 0).await?;
        let mut total = 0u64;

        while !xfer.done() {
            let pktin = self.recv_packet().await?;
            if self.download_gotpkt(&mut xfer, pktin) == GotPacket::Unclaimed {
                let _ = self.close(handle).await;
                return Err(Error::Protocol(
                    "received packet for no outstanding request".into(),
                ));
            }
            while let Some(block) = xfer.download_data() {
                dest.write_all(&block).await?;
                total += block.len() as u64;
            }
            self.download_queue(&mut xfer).await?;
        }

        xfer.cleanup();
        let failed = xfer.error();
        self.close(handle).await?;
        if failed {
            return Err(self.recorded_error());
        }
        debug!("downloaded {} bytes from {}", total, remote);
        Ok(total)
    }

    /// Upload a whole stream through the pipelined engine. Returns the
    /// byte count.
    pub async fn put<R>(&mut self, src: &mut R, remote: &str) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        info!("uploading to {}", remote);
        let handle = self
            .open(
                remote,
                OpenFlags(OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::TRUNC),
                None,
            )
            .await?;
        let mut xfer = self.upload_init(&handle, 0);
        let mut total = 0u64;

        loop {
            let mut buf = vec![0u8; self.config.read_chunk_size as usize];
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            buf.truncate(n);
            self.upload_data(&mut xfer, &buf).await?;
            total += n as u64;

            // Drain acknowledgements whenever the outstanding window
            // fills, so a slow server cannot back the channel up
            // indefinitely.
            while xfer.outstanding_bytes() >= self.config.window_bytes {
                let pktin = self.recv_packet().await?;
                if self.upload_gotpkt(&mut xfer, pktin) == GotPacket::Unclaimed {
                    return Err(Error::Protocol(
                        "received packet for no outstanding request".into(),
                    ));
                }
            }
            if xfer.error() {
                break;
            }
        }

        while !xfer.done() {
            let pktin = self.recv_packet().await?;
            if self.upload_gotpkt(&mut xfer, pktin) == GotPacket::Unclaimed {
                return Err(Error::Protocol(
                    "received packet for no outstanding request".into(),
                ));
            }
        }

        let failed = xfer.error();
        self.close(handle).await?;
        if failed {
            return Err(self.recorded_error());
        }
        debug!("uploaded {} bytes to {}", total, remote);
        Ok(total)
    }
}
