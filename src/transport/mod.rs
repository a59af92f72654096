//! # Transport Layer
//!
//! Datagram channels the handshake engine talks through.
//!
//! A transport is a connected, unreliable, unordered datagram channel with
//! a settable read deadline. A send followed by a receive is not guaranteed
//! to be a request/response pair: stray or duplicated datagrams may arrive
//! at any time, which is why every received datagram is classified before
//! it is accepted.
//!
//! ## Implementations
//! - **UDP**: [`udp::UdpTransport`], a connected tokio socket with
//!   kernel buffers sized per peer role ([`udp::SocketBuffers`])

use std::future::Future;
use std::io;

use tokio::time::Instant;

pub mod udp;

pub use udp::{SocketBuffers, UdpTransport};

/// Duplex datagram channel with a read deadline
pub trait Transport: Send {
    /// Send one datagram, returning the number of bytes written
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receive one datagram into `buf`.
    ///
    /// Fails with [`io::ErrorKind::TimedOut`] once the read deadline passes.
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Deadline for every following `recv`
    fn set_read_deadline(&mut self, deadline: Instant);
}
