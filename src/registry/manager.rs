//! Client Registry Implementation
//!
//! The registry is the only process-wide mutable state. Every access, including
//! the enumeration done while broadcasting, goes through one async mutex, so a
//! client can never be removed and closed while a broadcast is writing to it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{ClientHandle, ClientId, ClientInfo};

/// Registry failures that reject a new client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client registry is full ({capacity} clients)")]
    CapacityExceeded { capacity: usize },

    #[error("client {0} is already registered")]
    AlreadyRegistered(ClientId),
}

/// Capacity-checked collection of active clients
#[derive(Debug)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<ClientHandle>>>,
    capacity: usize,
}

impl ClientRegistry {
    /// Create an empty registry holding at most `capacity` clients
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a client and return the slot it occupies
    pub async fn add(&self, handle: Arc<ClientHandle>) -> Result<usize, RegistryError> {
        let mut clients = self.clients.lock().await;

        if clients.iter().any(|client| client.id() == handle.id()) {
            return Err(RegistryError::AlreadyRegistered(handle.id()));
        }
        if clients.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        clients.push(handle);
        let slot = clients.len() - 1;
        debug!("Registered client in slot {} ({} active)", slot, clients.len());
        Ok(slot)
    }

    /// Remove a client, swapping the last slot into its place
    ///
    /// Removing an absent client is a no-op.
    pub async fn remove(&self, id: ClientId) -> Option<Arc<ClientHandle>> {
        let mut clients = self.clients.lock().await;
        let position = clients.iter().position(|client| client.id() == id)?;
        let removed = clients.swap_remove(position);
        debug!("Unregistered client {} ({} active)", id, clients.len());
        Some(removed)
    }

    /// Lock the registry for a fan-out
    ///
    /// Membership cannot change while the returned snapshot is alive.
    pub async fn snapshot_for_broadcast(&self) -> RegistrySnapshot<'_> {
        RegistrySnapshot {
            clients: self.clients.lock().await,
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().await.iter().any(|client| client.id() == id)
    }

    /// Information about every registered client
    pub async fn members(&self) -> Vec<ClientInfo> {
        self.clients
            .lock()
            .await
            .iter()
            .map(|client| client.info())
            .collect()
    }
}

/// Locked view of the registry used for broadcasting
pub struct RegistrySnapshot<'a> {
    clients: MutexGuard<'a, Vec<Arc<ClientHandle>>>,
}

impl RegistrySnapshot<'_> {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        self.clients.iter()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Registry membership owned by one connection handler
///
/// Call [`Registration::release`] on the normal exit path. If the guard is
/// dropped without being released (for example when the handler task
/// panics), removal is scheduled on the current runtime instead.
pub struct Registration {
    registry: Arc<ClientRegistry>,
    handle: Arc<ClientHandle>,
    released: bool,
}

impl Registration {
    /// Add `handle` to `registry` and tie its membership to the returned guard
    pub async fn register(
        registry: Arc<ClientRegistry>,
        handle: Arc<ClientHandle>,
    ) -> Result<Self, RegistryError> {
        registry.add(Arc::clone(&handle)).await?;
        Ok(Self {
            registry,
            handle,
            released: false,
        })
    }

    pub fn handle(&self) -> &Arc<ClientHandle> {
        &self.handle
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Remove the client from the registry
    pub async fn release(mut self) -> Option<Arc<ClientHandle>> {
        self.released = true;
        self.registry.remove(self.handle.id()).await
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let handle = Arc::clone(&self.handle);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if registry.remove(handle.id()).await.is_some() {
                        warn!(
                            client_id = %handle.id(),
                            addr = %handle.addr(),
                            "Client removed from registry after abnormal handler exit"
                        );
                    }
                    let _ = handle.close().await;
                });
            }
            Err(_) => {
                warn!(
                    client_id = %handle.id(),
                    "No runtime available to unregister client"
                );
            }
        }
    }
}
