use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, trace};

use super::Transport;
use crate::config::MAX_CHUNKS;
use crate::error::Result;

/// Kernel buffer sizes requested for one socket.
///
/// Buffers only ever grow: a request below the OS default keeps the
/// default. `None` leaves that direction alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketBuffers {
    pub send: Option<usize>,
    pub recv: Option<usize>,
}

impl SocketBuffers {
    /// Master-server socket: room for a burst of [`MAX_CHUNKS`] full datagrams
    pub fn master(max_buffer_size: usize) -> Self {
        Self {
            send: Some(max_buffer_size.saturating_mul(MAX_CHUNKS)),
            recv: None,
        }
    }

    /// Game-server socket: one full datagram to read, and send room that
    /// scales with the seconds of budget, never below one datagram
    pub fn game_server(max_buffer_size: usize, timeout: Duration) -> Self {
        let send = (max_buffer_size as f64 * timeout.as_secs_f64()) as usize;
        Self {
            send: Some(send.max(max_buffer_size)),
            recv: Some(max_buffer_size),
        }
    }

    fn apply(&self, socket: SockRef<'_>) -> io::Result<()> {
        if let Some(size) = self.send {
            if socket.send_buffer_size()? < size {
                socket.set_send_buffer_size(size)?;
            }
        }
        if let Some(size) = self.recv {
            if socket.recv_buffer_size()? < size {
                socket.set_recv_buffer_size(size)?;
            }
        }
        trace!(
            send = socket.send_buffer_size()?,
            recv = socket.recv_buffer_size()?,
            "Socket buffers sized"
        );
        Ok(())
    }
}

/// UDP socket connected to a single peer.
///
/// Each exchange owns its transport exclusively; the socket is closed when
/// the transport is dropped, on every path.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    read_deadline: Option<Instant>,
}

impl UdpTransport {
    /// Bind to `bind`, size the kernel buffers and connect to `peer`.
    ///
    /// An IPv6 peer with an IPv4 wildcard bind address is bound to `[::]:0`
    /// instead, a v4 socket could never reach it.
    #[instrument(level = "debug")]
    pub async fn connect(
        bind: SocketAddr,
        peer: SocketAddr,
        buffers: SocketBuffers,
    ) -> Result<Self> {
        let bind = match (bind, peer) {
            (SocketAddr::V4(local), SocketAddr::V6(_)) if local.ip().is_unspecified() => {
                SocketAddr::new(std::net::Ipv6Addr::UNSPECIFIED.into(), local.port())
            }
            _ => bind,
        };

        let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        buffers.apply(SockRef::from(&socket))?;
        socket.bind(&bind.into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket.connect(peer).await?;
        debug!(local = ?socket.local_addr().ok(), "Socket connected");

        Ok(Self {
            socket,
            peer,
            read_deadline: None,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Current kernel send and receive buffer sizes
    pub fn buffer_sizes(&self) -> Result<(usize, usize)> {
        let socket = SockRef::from(&self.socket);
        Ok((socket.send_buffer_size()?, socket.recv_buffer_size()?))
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send(payload).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.socket.recv(buf))
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
            None => self.socket.recv(buf).await,
        }
    }

    fn set_read_deadline(&mut self, deadline: Instant) {
        self.read_deadline = Some(deadline);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MAX_BUFFER_SIZE;

    #[tokio::test]
    async fn recv_times_out_at_deadline() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut transport = UdpTransport::connect(
            "127.0.0.1:0".parse().unwrap(),
            silent.local_addr().unwrap(),
            SocketBuffers::default(),
        )
        .await
        .unwrap();

        transport.set_read_deadline(Instant::now() + Duration::from_millis(20));
        let mut buf = [0u8; 16];
        let err = transport.recv(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn datagrams_round_trip() {
        let echo = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, from) = echo.recv_from(&mut buf).await.unwrap();
            echo.send_to(&buf[..n], from).await.unwrap();
        });

        let mut transport = UdpTransport::connect(
            "127.0.0.1:0".parse().unwrap(),
            echo_addr,
            SocketBuffers::game_server(MAX_BUFFER_SIZE, Duration::from_secs(2)),
        )
        .await
        .unwrap();
        assert_eq!(transport.peer(), echo_addr);
        assert_eq!(transport.send(b"ping").await.unwrap(), 4);

        transport.set_read_deadline(Instant::now() + Duration::from_secs(2));
        let mut buf = [0u8; 64];
        let n = transport.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn buffer_sizes_follow_role() {
        let master = SocketBuffers::master(1400);
        assert_eq!(master.send, Some(1400 * 16));
        assert_eq!(master.recv, None);

        let game = SocketBuffers::game_server(1400, Duration::from_secs(16));
        assert_eq!(game.send, Some(1400 * 16));
        assert_eq!(game.recv, Some(1400));

        // sub-second budgets still leave room for one datagram
        let short = SocketBuffers::game_server(1400, Duration::from_millis(100));
        assert_eq!(short.send, Some(1400));
    }

    #[tokio::test]
    async fn requested_buffers_are_applied() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let buffers = SocketBuffers {
            send: Some(MAX_BUFFER_SIZE * MAX_CHUNKS * 4),
            recv: Some(MAX_BUFFER_SIZE * 8),
        };

        let transport = UdpTransport::connect(
            "127.0.0.1:0".parse().unwrap(),
            peer.local_addr().unwrap(),
            buffers,
        )
        .await
        .unwrap();

        let (send, recv) = transport.buffer_sizes().unwrap();
        assert!(send >= buffers.send.unwrap(), "SO_SNDBUF {send} below request");
        assert!(recv >= buffers.recv.unwrap(), "SO_RCVBUF {recv} below request");
    }

    #[tokio::test]
    async fn buffers_never_shrink_below_default() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let default = UdpTransport::connect(
            "127.0.0.1:0".parse().unwrap(),
            peer.local_addr().unwrap(),
            SocketBuffers::default(),
        )
        .await
        .unwrap();
        let sized = UdpTransport::connect(
            "127.0.0.1:0".parse().unwrap(),
            peer.local_addr().unwrap(),
            SocketBuffers {
                send: Some(1),
                recv: Some(1),
            },
        )
        .await
        .unwrap();

        assert_eq!(sized.buffer_sizes().unwrap(), default.buffer_sizes().unwrap());
    }
}
