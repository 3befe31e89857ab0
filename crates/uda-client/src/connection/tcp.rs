//! Socket creation and tuning.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use uda_config::HostPort;

/// Send and receive buffer size applied to every client socket.
pub const SOCKET_BUFFER_SIZE: usize = 128 * 1024;

/// Why a single connect attempt failed.
#[derive(Debug, Error)]
pub enum ConnectFailure {
    /// The host name did not resolve to an address.
    #[error("failed to resolve: {0}")]
    Resolve(#[source] io::Error),
    /// The peer refused or the attempt timed out.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    /// A socket option could not be applied.
    #[error("failed to configure socket: {0}")]
    Configure(#[source] io::Error),
}

/// Opens byte streams to hosts. The seam the retry loop drives.
pub trait Connector: Send {
    /// Stream produced by a successful connect.
    type Stream: Read + Write + Send;

    /// Makes one attempt to reach `host`. A zero `timeout` blocks.
    ///
    /// # Errors
    ///
    /// Returns the stage that failed.
    fn connect(&self, host: &HostPort, timeout: Duration) -> Result<Self::Stream, ConnectFailure>;

    /// True when the connector can wrap its streams in TLS.
    fn supports_tls(&self) -> bool {
        false
    }
}

/// Plain TCP connector tuned for bulk transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &HostPort, timeout: Duration) -> Result<TcpStream, ConnectFailure> {
        let address = resolve(host).map_err(ConnectFailure::Resolve)?;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(ConnectFailure::Configure)?;
        let target = SockAddr::from(address);
        if timeout.is_zero() {
            socket.connect(&target)
        } else {
            socket.connect_timeout(&target, timeout)
        }
        .map_err(ConnectFailure::Connect)?;
        tune(&socket, timeout).map_err(ConnectFailure::Configure)?;
        Ok(TcpStream::from(socket))
    }
}

fn resolve(host: &HostPort) -> io::Result<SocketAddr> {
    (host.host(), host.port())
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

fn tune(socket: &Socket, timeout: Duration) -> io::Result<()> {
    let limit = (!timeout.is_zero()).then_some(timeout);
    socket.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
    socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;
    socket.set_keepalive(true)?;
    socket.set_nodelay(true)?;
    socket.set_read_timeout(limit)?;
    socket.set_write_timeout(limit)
}
