//! Stub lookup server
//!
//! Answers every read on a connection with `"<token>: <content>"` (or
//! `"<token>: not found"`), where the token is the received bytes with
//! surrounding whitespace trimmed. Receiving `!close` drops the connection,
//! which lets tests exercise a client's broken-connection path.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Control token that makes the server hang up
pub const CLOSE_TOKEN: &str = "!close";

const READ_BUFFER_SIZE: usize = 1024;

/// Token -> content lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, token: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(token.into(), content.into());
    }

    /// Parse `<token> <content...>` lines; blank lines and `#` comments are skipped
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::empty();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (token, content) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            catalog.insert(token, content.trim());
        }
        catalog
    }

    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reply(&self, token: &str) -> String {
        match self.entries.get(token) {
            Some(content) => format!("{}: {}", token, content),
            None => format!("{}: not found", token),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.insert("dune", "Frank Herbert, 1965");
        catalog.insert("neuromancer", "William Gibson, 1984");
        catalog.insert("solaris", "Stanislaw Lem, 1961");
        catalog.insert("foundation", "Isaac Asimov, 1951");
        catalog.insert("hyperion", "Dan Simmons, 1989");
        catalog
    }
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Each connection is served on its own task; `accepted` counts them.
pub async fn serve<F>(
    listener: TcpListener,
    catalog: Arc<Catalog>,
    accepted: Arc<AtomicUsize>,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(addr = %listener.local_addr()?, entries = catalog.len(), "Stub server listening");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stub server stopping");
                return Ok(());
            }
            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                accepted.fetch_add(1, Ordering::Relaxed);
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &catalog).await {
                        debug!(peer = %peer, error = %e, "Connection ended with error");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, catalog: &Catalog) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    debug!(peer = %peer, "Client connected");
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!(peer = %peer, "Client disconnected");
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf[..n]);
        let token = text.trim();
        if token == CLOSE_TOKEN {
            debug!(peer = %peer, "Close requested");
            return Ok(());
        }
        let reply = catalog.reply(token);
        debug!(peer = %peer, token = %token, "Lookup");
        stream.write_all(reply.as_bytes()).await?;
    }
}

/// Stub server on its own thread and current-thread runtime, stopped on drop
pub struct StubServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Bind `addr` (port 0 picks a free port) and start serving in the background
    pub fn spawn(addr: impl ToSocketAddrs, catalog: Catalog) -> io::Result<Self> {
        let std_listener = std::net::TcpListener::bind(addr)?;
        std_listener.set_nonblocking(true)?;
        let addr = std_listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let (stop, stopped) = oneshot::channel::<()>();

        let counter = Arc::clone(&accepted);
        let thread = thread::Builder::new()
            .name("fanout-stub-server".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match TcpListener::from_std(std_listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            warn!(error = %e, "Stub server could not register listener");
                            return;
                        }
                    };
                    let shutdown = async {
                        let _ = stopped.await;
                    };
                    if let Err(e) = serve(listener, Arc::new(catalog), counter, shutdown).await {
                        warn!(error = %e, "Stub server failed");
                    }
                });
            })?;

        Ok(Self {
            addr,
            accepted,
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn start(catalog: Catalog) -> (SocketAddr, oneshot::Sender<()>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            serve(listener, Arc::new(catalog), counter, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });
        (addr, stop, accepted)
    }

    async fn ask(stream: &mut TcpStream, token: &str) -> String {
        stream.write_all(token.as_bytes()).await.unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_catalog_parse_skips_blank_and_comment_lines() {
        let catalog = Catalog::parse("# books\n\ndune   Frank Herbert\nlonely\n");

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.reply("dune"), "dune: Frank Herbert");
        assert_eq!(catalog.reply("lonely"), "lonely: ");
        assert_eq!(catalog.reply("missing"), "missing: not found");
    }

    #[test]
    fn test_catalog_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "solaris Stanislaw Lem").unwrap();

        let catalog = Catalog::from_file(file.path()).unwrap();

        assert_eq!(catalog.reply("solaris"), "solaris: Stanislaw Lem");
    }

    #[tokio::test]
    async fn test_replies_on_one_connection() {
        let (addr, _stop, accepted) = start(Catalog::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(ask(&mut stream, "dune").await, "dune: Frank Herbert, 1965");
        assert_eq!(ask(&mut stream, "nothing\n").await, "nothing: not found");
        assert_eq!(accepted.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_close_token_drops_connection() {
        let (addr, _stop, _accepted) = start(Catalog::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(CLOSE_TOKEN.as_bytes()).await.unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap_or(0);

        assert_eq!(n, 0);
    }

    #[test]
    fn test_spawned_server_stops_on_drop() {
        let server = StubServer::spawn("127.0.0.1:0", Catalog::empty()).unwrap();
        let addr = server.addr();
        drop(server);

        assert!(std::net::TcpStream::connect(addr).is_err());
    }
}
