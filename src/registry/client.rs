//! Client Handle

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Boxed write half of a client connection
pub type ClientWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Unique identifier of a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One connected participant
///
/// The handle owns the write half of the connection. Broadcasting tasks of
/// other clients write through it, so writes are serialized by the inner
/// mutex. The read half stays with the connection handler.
pub struct ClientHandle {
    id: ClientId,
    addr: SocketAddr,
    name: OnceLock<String>,
    writer: Mutex<ClientWriter>,
    closed: AtomicBool,
    connected_at: Instant,
}

impl ClientHandle {
    /// Create a handle around the write half of a connection
    pub fn new<W>(addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ClientId::new(),
            addr,
            name: OnceLock::new(),
            writer: Mutex::new(Box::new(writer)),
            closed: AtomicBool::new(false),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Registered display name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Set the display name. Returns `false` if a name was already set.
    pub fn set_name(&self, name: String) -> bool {
        self.name.set(name).is_ok()
    }

    /// Time since the connection was accepted
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write the whole message to this client
    pub async fn send(&self, message: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        if self.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "client connection already closed",
            ));
        }
        writer.write_all(message).await?;
        writer.flush().await
    }

    /// Shut down the write half. Only the first call has any effect.
    pub async fn close(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        writer.shutdown().await
    }

    /// Diagnostic view of this client
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            addr: self.addr,
            name: self.name().map(str::to_owned),
        }
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Client information exposed for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub name: Option<String>,
}
