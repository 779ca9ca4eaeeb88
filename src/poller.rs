//! I/O multiplexer: one blocking wait per event-loop iteration.
//!
//! [`sync`] is the single suspension point of the whole program. It
//! builds the readiness-interest set from the live connections (read
//! interest always, write interest only while a send buffer is
//! non-empty, plus the listener and an optional extra watch descriptor),
//! blocks in `poll(2)` without timeout, then drains every descriptor
//! that became ready. Signal interruption is retried transparently.
//!
//! Single-threaded and purely reactive: no background thread, no timer,
//! no preemption. Everything else in the crate runs synchronously
//! between two calls into this module.

use std::io;
use std::net::TcpListener;
use std::os::fd::{AsFd, BorrowedFd};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::connection::Connection;

/// What a call to [`sync_with`] observed.
#[derive(Debug, Default, Clone, Copy)]
pub struct Wakeup {
    /// The listener has at least one connection waiting to be accepted.
    pub accepted: bool,
    /// The extra watch descriptor is readable.
    pub extra_ready: bool,
}

/// What each poll entry refers to.
enum Interest {
    Listener,
    Extra,
    Read(usize),
    Write(usize),
    ReadWrite(usize),
}

/// Wait until at least one descriptor is ready, then drain all of them.
///
/// Returns whether the listener (if any) has a pending connection so the
/// caller can accept it. Closed connections are skipped entirely; the
/// caller is expected to sweep them out before the next wait.
pub fn sync(conns: &mut [Connection], listener: Option<&TcpListener>) -> io::Result<bool> {
    Ok(sync_with(conns, listener, None)?.accepted)
}

/// Like [`sync`], with one optional extra descriptor watched for read
/// readiness on behalf of the caller (a pty, a watch descriptor); its
/// state is reported back rather than acted on.
pub fn sync_with(
    conns: &mut [Connection],
    listener: Option<&TcpListener>,
    extra: Option<BorrowedFd<'_>>,
) -> io::Result<Wakeup> {
    let mut fds = Vec::with_capacity(conns.len() + 2);
    let mut interests = Vec::with_capacity(conns.len() + 2);

    if let Some(listener) = listener {
        fds.push(PollFd::new(listener.as_fd(), PollFlags::POLLIN));
        interests.push(Interest::Listener);
    }
    if let Some(extra) = extra {
        fds.push(PollFd::new(extra, PollFlags::POLLIN));
        interests.push(Interest::Extra);
    }
    for (i, conn) in conns.iter().enumerate() {
        if conn.is_closed() {
            continue;
        }
        if conn.has_output() && !conn.has_split_descriptors() {
            fds.push(PollFd::new(
                conn.read_fd(),
                PollFlags::POLLIN | PollFlags::POLLOUT,
            ));
            interests.push(Interest::ReadWrite(i));
        } else {
            fds.push(PollFd::new(conn.read_fd(), PollFlags::POLLIN));
            interests.push(Interest::Read(i));
            if conn.has_output() {
                fds.push(PollFd::new(conn.write_fd(), PollFlags::POLLOUT));
                interests.push(Interest::Write(i));
            }
        }
    }

    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }

    // Snapshot readiness into plain data before touching the connections:
    // the poll entries borrow their descriptors.
    let mut wakeup = Wakeup::default();
    let mut ready = vec![(false, false); conns.len()];
    let readable_mask = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
    let writable_mask = PollFlags::POLLOUT | PollFlags::POLLHUP | PollFlags::POLLERR;
    for (pollfd, interest) in fds.iter().zip(&interests) {
        let revents = pollfd.revents().unwrap_or_else(PollFlags::empty);
        let readable = revents.intersects(readable_mask);
        let writable = revents.intersects(writable_mask);
        match *interest {
            Interest::Listener => wakeup.accepted |= readable,
            Interest::Extra => wakeup.extra_ready |= readable,
            Interest::Read(i) => ready[i].0 |= readable,
            Interest::Write(i) => ready[i].1 |= writable,
            Interest::ReadWrite(i) => {
                ready[i].0 |= readable;
                ready[i].1 |= writable;
            }
        }
    }
    drop(fds);

    for (i, (readable, writable)) in ready.into_iter().enumerate() {
        if writable {
            conns[i].drain_write();
        }
        if readable {
            conns[i].drain_read();
        }
    }

    Ok(wakeup)
}
