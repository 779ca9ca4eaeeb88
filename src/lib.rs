//! # edrelay
//!
//! Message relay broker between one text editor and its helper tools.
//!
//! An editor session runs exactly one broker. The editor spawns it and
//! talks to it over the broker's stdio; helper tools (git UI, LSP
//! bridge, pty bridge) connect over TCP loopback, each on its own
//! short-lived connection. The broker multiplexes all of them on a
//! single thread with one `poll(2)` wait per iteration: helper requests
//! are forwarded to the editor tagged with the originating connection's
//! identity, and editor replies, addressed by that same identity, are
//! routed back to the matching helper.
//!
//! ## Wire format
//!
//! A message is `field_0 FS field_1 FS ... field_n RS` with FS = 0x1F
//! and RS = 0x1E. There is no escaping: payload fields must not contain
//! either reserved byte. The concrete field layout is:
//!
//! - helper → broker: `command FS args...`
//! - broker → editor: `identity FS command FS args...`
//! - editor → broker: `identity FS response_tag FS payload...`
//! - broker → helper: `response_tag FS payload...`
//!
//! At startup the broker announces its listener port to the editor as
//! `"" FS "port" FS <port>`; the editor exports it to helper processes
//! through the [`config::PORT_ENV`] environment variable.
//!
//! ## Modes
//!
//! - **Server mode** ([`Broker`]): owns the listener and the editor
//!   connection; runs until the editor goes away.
//! - **Client mode** ([`RelayClient`]): one outbound connection, one
//!   blocking request at a time; loss of the connection is fatal.

pub mod broker;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod poller;
pub mod protocol;

pub use broker::Broker;
pub use client::RelayClient;
pub use connection::Connection;
pub use error::{RelayError, Result};
pub use protocol::Message;
