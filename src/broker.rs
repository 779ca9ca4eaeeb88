//! Server-mode broker: accept loop, routing policy, connection sweep.
//!
//! The [`Broker`] multiplexes one editor connection (slot 0, wired to the
//! process's stdio by `main`) against any number of helper connections
//! accepted from the loopback listener. Messages from a helper are
//! forwarded to the editor prefixed with the helper's identity; messages
//! from the editor carry a destination identity in field 0 and are
//! forwarded, with that field stripped, to the matching helper.
//!
//! Loss of a helper is absorbed: the connection is swept out of the
//! active set and anything addressed to it afterwards is dropped. Loss of
//! the editor is escalated: with nothing left to route to, [`Broker::run`]
//! returns [`RelayError::EditorLost`] and the process exits.

use std::net::{Ipv4Addr, TcpListener};

use bytes::Bytes;

use crate::connection::Connection;
use crate::error::{RelayError, Result};
use crate::poller;
use crate::protocol::Message;

/// Slot of the editor connection in the active set.
const EDITOR: usize = 0;

/// The relay broker: connection list, listener, identity counter.
pub struct Broker {
    conns: Vec<Connection>,
    listener: TcpListener,
    next_id: u64,
}

impl Broker {
    /// Bind the loopback listener on an ephemeral port and install the
    /// editor connection in slot 0.
    pub fn bind(editor: Connection) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        listener.set_nonblocking(true)?;
        let broker = Self {
            conns: vec![editor],
            listener,
            next_id: 0,
        };
        tracing::debug!(port = broker.port()?, "listening");
        Ok(broker)
    }

    /// The OS-chosen listener port.
    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Enqueue the startup control message announcing the listener port
    /// to the editor: `"" FS "port" FS <port>`. The empty leading field
    /// is the broker's own source identity.
    pub fn announce_port(&mut self) -> Result<()> {
        let port = self.port()?.to_string();
        let fields: [&[u8]; 3] = [b"", b"port", port.as_bytes()];
        self.conns[EDITOR].enqueue(&fields);
        Ok(())
    }

    /// Serve until the editor connection is lost.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.step()?;
        }
    }

    /// One event-loop iteration: wait, accept, drain, dispatch.
    pub fn step(&mut self) -> Result<()> {
        if poller::sync(&mut self.conns, Some(&self.listener))? {
            self.accept_one();
        }
        self.dispatch()
    }

    /// Accept at most one pending helper connection. The poll is
    /// level-triggered, so a longer backlog is reported again on the
    /// next wait.
    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                self.next_id += 1;
                let id = self.next_id.to_string();
                match Connection::from_stream(stream, id) {
                    Ok(conn) => {
                        tracing::debug!(id = conn.id(), %addr, "helper connected");
                        self.conns.push(conn);
                    }
                    Err(e) => tracing::warn!("failed to set up helper connection: {e}"),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::warn!("accept failed: {e}"),
        }
    }

    /// Sweep closed connections and route every complete message, FIFO
    /// per source connection.
    fn dispatch(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.conns.len() {
            if self.conns[i].is_closed() {
                if i == EDITOR {
                    return Err(RelayError::EditorLost(self.conns[EDITOR].take_error()));
                }
                let conn = self.conns.remove(i);
                tracing::debug!(id = conn.id(), "helper disconnected");
                continue;
            }
            while let Some(msg) = self.conns[i].next_message() {
                self.route(i, msg);
            }
            i += 1;
        }
        Ok(())
    }

    /// Routing policy for one complete message.
    fn route(&mut self, origin: usize, msg: Message) {
        if origin == EDITOR {
            // Field 0 names the destination; anything shorter carries
            // nowhere to deliver to and is dropped.
            if msg.len() < 2 {
                tracing::trace!("malformed editor message dropped");
                return;
            }
            let fields = msg.into_fields();
            let Some((dst, rest)) = fields.split_first() else {
                return;
            };
            match self
                .conns
                .iter_mut()
                .skip(1)
                .find(|c| c.id().as_bytes() == &dst[..])
            {
                Some(conn) => conn.enqueue(rest),
                None => {
                    // The destination may have disconnected already.
                    tracing::trace!("message for unknown destination dropped");
                }
            }
        } else {
            let id = Bytes::copy_from_slice(self.conns[origin].id().as_bytes());
            let mut fields = msg.into_fields();
            fields.insert(0, id);
            self.conns[EDITOR].enqueue(&fields);
        }
    }
}
