//! Connection Handler
//!
//! Drives one client through `AwaitingName → Active → Closed`. The first read
//! carries the display name and every later read is relayed as one message.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

use crate::broadcast::Broadcaster;
use crate::config::ChatConfig;
use crate::filter::ContentFilter;
use crate::metrics::Metrics;
use crate::registry::{ClientHandle, Registration};

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingName,
    Active,
    Closed,
}

/// Per-connection state machine
pub struct ConnectionHandler<R> {
    reader: R,
    registration: Registration,
    broadcaster: Arc<Broadcaster>,
    filter: Arc<ContentFilter>,
    metrics: Arc<Metrics>,
    max_name_length: usize,
    max_message_length: usize,
    state: SessionState,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(
        reader: R,
        registration: Registration,
        broadcaster: Arc<Broadcaster>,
        filter: Arc<ContentFilter>,
        metrics: Arc<Metrics>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            reader,
            registration,
            broadcaster,
            filter,
            metrics,
            max_name_length: chat.max_name_length,
            max_message_length: chat.max_message_length,
            state: SessionState::AwaitingName,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn client(&self) -> &Arc<ClientHandle> {
        self.registration.handle()
    }

    /// Run until the peer disconnects
    #[instrument(skip(self), fields(client_id = %self.client().id(), addr = %self.client().addr()))]
    pub async fn run(mut self) {
        let name = match self.await_name().await {
            Some(name) => name,
            None => {
                self.close(None).await;
                return;
            }
        };

        self.transition(SessionState::Active);
        info!("Client registered as '{}'", name);
        let client_id = self.client().id();
        self.broadcaster.announce_join(&name, client_id).await;

        self.relay_messages(&name).await;
        self.close(Some(name)).await;
    }

    async fn await_name(&mut self) -> Option<String> {
        let mut buffer = vec![0u8; self.max_name_length];

        let received = match self.reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Peer closed before sending a name");
                return None;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to read display name");
                return None;
            }
        };

        let name = parse_display_name(&buffer[..received]);
        if !self.client().set_name(name.clone()) {
            warn!("Display name was already set");
        }
        Some(name)
    }

    async fn relay_messages(&mut self, name: &str) {
        let mut buffer = vec![0u8; self.max_message_length];
        let client_id = self.client().id();

        loop {
            let received = match self.reader.read(&mut buffer).await {
                Ok(0) => {
                    debug!("Peer closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Failed to read message");
                    break;
                }
            };

            let message = &mut buffer[..received];
            self.filter.filter_in_place(message);
            let line = format_chat_line(name, message);

            info!(
                target: "chatrelay::chat",
                "{}",
                String::from_utf8_lossy(&line).trim_end()
            );
            self.broadcaster.broadcast(&line, Some(client_id)).await;
            self.metrics.message_relayed();
        }
    }

    async fn close(mut self, name: Option<String>) {
        self.transition(SessionState::Closed);

        let client = Arc::clone(self.client());
        let registry = Arc::clone(self.registration.registry());
        self.registration.release().await;
        self.metrics.set_active_clients(registry.len().await);

        if let Some(name) = &name {
            self.broadcaster.announce_leave(name).await;
        }

        if let Err(e) = client.close().await {
            debug!(error = %e, "Error shutting down client connection");
        }

        info!(
            "Client {} disconnected after {:?}",
            name.as_deref().unwrap_or("<unnamed>"),
            client.connected_for()
        );
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Turn the first read into a display name
///
/// Trailing whitespace and line terminators are dropped. A read made only of
/// such bytes is kept as sent.
pub fn parse_display_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    let trimmed = name.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        name.into_owned()
    } else {
        trimmed.to_string()
    }
}

/// `"<name>: <message>"` without a trailing delimiter
pub fn format_chat_line(name: &str, message: &[u8]) -> Bytes {
    let mut line = BytesMut::with_capacity(name.len() + 2 + message.len());
    line.put_slice(name.as_bytes());
    line.put_slice(b": ");
    line.put_slice(message);
    line.freeze()
}
