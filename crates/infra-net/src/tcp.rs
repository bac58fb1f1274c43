// TCP connection adapter
// reason: plain blocking std::net, one stream per worker thread

use fanout_core::domain::SessionId;
use fanout_core::port::{Connection, ConnectionError, Connector};
use fanout_core::EndpointConfig;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Opens TCP streams to one fixed endpoint
pub struct TcpConnector {
    addr: SocketAddr,
    connect_timeout: Option<Duration>,
    next_session: AtomicU64,
}

impl TcpConnector {
    /// Resolve the endpoint once; every connection goes to the same address
    ///
    /// # Errors
    /// - ConnectionError::InvalidAddress if the host does not resolve
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, ConnectionError> {
        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| ConnectionError::InvalidAddress(format!("{}: {}", endpoint, e)))?
            .next()
            .ok_or_else(|| ConnectionError::InvalidAddress(endpoint.to_string()))?;
        Ok(Self::from_addr(addr))
    }

    pub fn from_addr(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: None,
            next_session: AtomicU64::new(1),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&self.addr, timeout),
            None => TcpStream::connect(self.addr),
        }
        .map_err(|e| ConnectionError::Connect {
            endpoint: self.addr.to_string(),
            reason: e.to_string(),
        })?;
        // Requests are single small writes; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);

        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        debug!(session = %session, addr = %self.addr, "TCP connection open");
        Ok(Box::new(TcpConnection { session, stream }))
    }

    fn endpoint(&self) -> String {
        self.addr.to_string()
    }
}

/// One open stream, owned by exactly one worker
pub struct TcpConnection {
    session: SessionId,
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn session_id(&self) -> SessionId {
        self.session
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
