//! Connection Manager Implementation
//!
//! Accepts TCP connections, registers a client handle for each one and spawns
//! its [`ConnectionHandler`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::ConnectionHandler;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::filter::ContentFilter;
use crate::metrics::Metrics;
use crate::registry::{ClientHandle, ClientRegistry, Registration, RegistryError};
use crate::Result;

/// Owns the listener and the shared chat state
pub struct ConnectionManager {
    listener: TcpListener,
    config: Arc<Config>,
    registry: Arc<ClientRegistry>,
    broadcaster: Arc<Broadcaster>,
    filter: Arc<ContentFilter>,
    metrics: Arc<Metrics>,
}

impl ConnectionManager {
    /// Bind the listener. A bind failure aborts startup.
    pub async fn bind(config: Arc<Config>, metrics: Arc<Metrics>) -> Result<Self> {
        let bind_addr = config.server.bind_addr;

        info!("Binding TCP listener to {}", bind_addr);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        info!("Successfully bound to {}", listener.local_addr()?);

        let filter = Arc::new(ContentFilter::new(&config.chat.banned_words)?);
        let registry = Arc::new(ClientRegistry::new(config.server.max_clients));
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            config.server.write_timeout,
            Arc::clone(&metrics),
        ));
        info!(
            "Accepting up to {} clients, filtering {} banned words",
            registry.capacity(),
            filter.word_count()
        );

        Ok(Self {
            listener,
            config,
            registry,
            broadcaster,
            filter,
            metrics,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Accept connections until an accept error occurs
    pub async fn run(&self) -> Result<()> {
        info!(
            "Accepting chat clients on {} (max {} clients)",
            self.local_addr()?,
            self.config.server.max_clients
        );

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    return Err(e).context("Failed to accept connection");
                }
            };

            self.dispatch(stream, addr).await;
        }
    }

    /// Accept connections until `shutdown` resolves or an accept error occurs
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                Ok(())
            }
        }
    }

    /// Register the new client and start its handler
    async fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        debug!("Accepted connection from {}", addr);

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let (reader, writer) = stream.into_split();
        let handle = Arc::new(ClientHandle::new(addr, writer));
        let client_id = handle.id();

        let registration = match Registration::register(Arc::clone(&self.registry), handle).await {
            Ok(registration) => registration,
            Err(e @ RegistryError::CapacityExceeded { .. }) => {
                warn!("Rejecting connection from {}: {}", addr, e);
                self.metrics.connection_rejected();
                return;
            }
            Err(e) => {
                error!("Failed to register connection from {}: {}", addr, e);
                return;
            }
        };

        self.metrics.connection_accepted();
        self.metrics.set_active_clients(self.registry.len().await);
        info!(client_id = %client_id, "Client connected from {}", addr);

        let handler = ConnectionHandler::new(
            reader,
            registration,
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.filter),
            Arc::clone(&self.metrics),
            &self.config.chat,
        );
        let task = tokio::spawn(handler.run());

        // A panicking handler is unregistered by its guard; report it here
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(client_id = %client_id, "Connection handler for {} panicked", addr);
                }
            }
        });
    }
}
