//! Connection abstraction over one descriptor pair.
//!
//! A [`Connection`] wraps a read descriptor and a write descriptor (one
//! and the same for a socket, distinct for the editor's stdio pair) with
//! a receive buffer, a send buffer, an opaque identity and a sticky
//! closed state. It performs at most one read or one write per call and
//! never blocks: readiness is the multiplexer's job (see
//! [`crate::poller`]), and transient conditions are absorbed here.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use bytes::{Buf, BytesMut};
use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::protocol::{self, Message};

/// Size of one read chunk.
pub const READ_CHUNK: usize = 1024;

/// One endpoint of the relay: the long-lived editor connection or a
/// transient helper connection.
///
/// All close conditions (peer EOF, reset, local error) collapse into the
/// same terminal closed state; the recorded error is kept for diagnostics
/// only. A closed connection performs no further I/O.
pub struct Connection {
    id: String,
    rx_file: File,
    tx_file: Option<File>,
    rx: BytesMut,
    tx: BytesMut,
    closed: Option<io::Error>,
}

impl Connection {
    /// Wrap a connected TCP socket, switching it to non-blocking mode.
    pub fn from_stream(stream: TcpStream, id: String) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self::from_files(File::from(OwnedFd::from(stream)), None, id))
    }

    /// Wrap an explicit descriptor pair. `tx_file` is `None` when reads
    /// and writes go through the same descriptor.
    pub fn from_files(rx_file: File, tx_file: Option<File>, id: String) -> Self {
        Self {
            id,
            rx_file,
            tx_file,
            rx: BytesMut::with_capacity(READ_CHUNK),
            tx: BytesMut::new(),
            closed: None,
        }
    }

    /// Wrap this process's own stdin/stdout as a connection.
    ///
    /// Used by the server-mode broker, whose editor peer talks over the
    /// pipes the editor spawned it with. The descriptors are duplicated
    /// and switched to non-blocking mode.
    pub fn stdio(id: String) -> io::Result<Self> {
        let rx_fd = io::stdin().as_fd().try_clone_to_owned()?;
        let tx_fd = io::stdout().as_fd().try_clone_to_owned()?;
        set_nonblocking(rx_fd.as_raw_fd())?;
        set_nonblocking(tx_fd.as_raw_fd())?;
        Ok(Self::from_files(
            File::from(rx_fd),
            Some(File::from(tx_fd)),
            id,
        ))
    }

    /// Opaque identity used to route replies back to this connection.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Descriptor to watch for read readiness.
    #[inline]
    pub fn read_fd(&self) -> BorrowedFd<'_> {
        self.rx_file.as_fd()
    }

    /// Descriptor to watch for write readiness.
    #[inline]
    pub fn write_fd(&self) -> BorrowedFd<'_> {
        match &self.tx_file {
            Some(file) => file.as_fd(),
            None => self.rx_file.as_fd(),
        }
    }

    /// Whether reads and writes use distinct descriptors.
    #[inline]
    pub fn has_split_descriptors(&self) -> bool {
        self.tx_file.is_some()
    }

    /// Whether there are bytes waiting to be written out.
    #[inline]
    pub fn has_output(&self) -> bool {
        !self.tx.is_empty()
    }

    /// Whether the connection reached its terminal closed state.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// The error that closed the connection, if it is closed.
    pub fn error(&self) -> Option<&io::Error> {
        self.closed.as_ref()
    }

    /// Take the recorded close error for reporting. Falls back to a
    /// generic error if the connection is still open.
    pub fn take_error(&mut self) -> io::Error {
        self.closed
            .take()
            .unwrap_or_else(|| io::Error::other("connection still open"))
    }

    /// Encode one message and append it to the send buffer; no I/O.
    pub fn enqueue<B: AsRef<[u8]>>(&mut self, fields: &[B]) {
        protocol::encode(fields, &mut self.tx);
    }

    /// Decode the next complete message from the receive buffer, if any.
    pub fn next_message(&mut self) -> Option<Message> {
        protocol::decode(&mut self.rx)
    }

    /// Perform one non-blocking read of up to [`READ_CHUNK`] bytes into
    /// the receive buffer.
    ///
    /// End-of-stream and non-transient errors transition the connection
    /// to closed; `WouldBlock` is absorbed and `Interrupted` is retried
    /// transparently.
    pub fn drain_read(&mut self) {
        if self.is_closed() {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        let result = loop {
            match (&self.rx_file).read(&mut chunk) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match result {
            Ok(0) => self.close(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed")),
            Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => self.close(e),
        }
    }

    /// Perform one non-blocking write of as much of the send buffer as
    /// the OS accepts, dropping the written prefix.
    ///
    /// Same error discipline as [`Connection::drain_read`].
    pub fn drain_write(&mut self) {
        if self.is_closed() || self.tx.is_empty() {
            return;
        }
        let result = loop {
            let mut sink: &File = self.tx_file.as_ref().unwrap_or(&self.rx_file);
            match sink.write(&self.tx) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match result {
            Ok(n) => self.tx.advance(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => self.close(e),
        }
    }

    fn close(&mut self, error: io::Error) {
        self.closed = Some(error);
    }

    #[cfg(test)]
    pub(crate) fn rx_mut(&mut self) -> &mut BytesMut {
        &mut self.rx
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("rx_len", &self.rx.len())
            .field("tx_len", &self.tx.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)
        .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))
        .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
    Ok(())
}
