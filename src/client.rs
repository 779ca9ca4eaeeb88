//! Client-mode relay endpoint: one outbound connection, blocking
//! request/response.
//!
//! A [`RelayClient`] is what the helper tools (git UI, LSP bridge, pty
//! bridge) are built on. It makes exactly one connection to the broker,
//! sends requests, and waits for the editor's reply by response tag while
//! still servicing unrelated traffic on the same connection, using the
//! same wait/drain loop as the broker itself. No threads involved.
//!
//! # Example
//!
//! ```no_run
//! use edrelay::RelayClient;
//!
//! # fn main() -> edrelay::Result<()> {
//! let mut client = RelayClient::connect()?;
//! let reply = client.request_blocking(&["edit", "/tmp", "notes.txt"], "done")?;
//! assert_eq!(reply.first(), Some(&b"done"[..]));
//! # Ok(())
//! # }
//! ```

use std::net::{Ipv4Addr, TcpStream};
use std::os::fd::BorrowedFd;

use crate::config;
use crate::connection::Connection;
use crate::error::{RelayError, Result};
use crate::poller;
use crate::protocol::Message;

/// A helper process's connection to the relay broker.
pub struct RelayClient {
    conn: Connection,
}

impl RelayClient {
    /// Connect to the broker named by the port environment variable.
    pub fn connect() -> Result<Self> {
        Self::connect_to(config::port_from_env()?)
    }

    /// Connect to a broker listening on the given loopback port.
    pub fn connect_to(port: u16) -> Result<Self> {
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))?;
        let id = std::process::id().to_string();
        Ok(Self {
            conn: Connection::from_stream(stream, id)?,
        })
    }

    /// Enqueue one request without waiting for anything.
    pub fn send<B: AsRef<[u8]>>(&mut self, fields: &[B]) {
        self.conn.enqueue(fields);
    }

    /// Send one request and block until a message arrives whose first
    /// field equals `response_tag`, discarding unrelated traffic.
    pub fn request_blocking<B: AsRef<[u8]>>(
        &mut self,
        request: &[B],
        response_tag: &str,
    ) -> Result<Message> {
        self.request_blocking_with(request, response_tag, |_| {})
    }

    /// Send one request and block until a message arrives whose first
    /// field equals `response_tag`.
    ///
    /// Every other message received in the meantime is handed to
    /// `on_other`, and in any case fully consumed from the receive
    /// buffer, so later parsing never desynchronizes. If the connection
    /// closes before a match arrives this is fatal for the caller: a
    /// vanished editor is not recoverable from a short-lived helper.
    pub fn request_blocking_with<B, F>(
        &mut self,
        request: &[B],
        response_tag: &str,
        mut on_other: F,
    ) -> Result<Message>
    where
        B: AsRef<[u8]>,
        F: FnMut(Message),
    {
        self.conn.enqueue(request);
        loop {
            while let Some(msg) = self.conn.next_message() {
                if msg.first() == Some(response_tag.as_bytes()) {
                    return Ok(msg);
                }
                on_other(msg);
            }
            if self.conn.is_closed() {
                return Err(RelayError::ConnectionClosed(self.conn.take_error()));
            }
            poller::sync(std::slice::from_mut(&mut self.conn), None)?;
        }
    }

    /// Block until `extra` becomes readable, servicing relay traffic in
    /// the meantime.
    ///
    /// Lets a helper multiplex a foreign descriptor (a pty, a watch
    /// descriptor) against its relay connection without threads. Messages
    /// arriving while waiting are dispatched to `on_message`.
    pub fn wait_extra<F>(&mut self, extra: BorrowedFd<'_>, mut on_message: F) -> Result<()>
    where
        F: FnMut(Message),
    {
        loop {
            while let Some(msg) = self.conn.next_message() {
                on_message(msg);
            }
            if self.conn.is_closed() {
                return Err(RelayError::ConnectionClosed(self.conn.take_error()));
            }
            let wakeup =
                poller::sync_with(std::slice::from_mut(&mut self.conn), None, Some(extra))?;
            while let Some(msg) = self.conn.next_message() {
                on_message(msg);
            }
            if wakeup.extra_ready {
                return Ok(());
            }
        }
    }
}
