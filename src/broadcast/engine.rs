//! Broadcast Engine

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::metrics::Metrics;
use crate::registry::{ClientId, ClientRegistry};

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the message was fully written to
    pub delivered: usize,
    /// Recipients whose write failed or timed out
    pub failed: usize,
}

/// Delivers messages to every registered client except an optional sender
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    write_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>, write_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            registry,
            write_timeout,
            metrics,
        }
    }

    /// Write `message` to every registered client other than `exclude`
    ///
    /// The registry stays locked for the whole fan-out. A failed write is
    /// logged and skipped; the recipient stays registered until its own
    /// handler notices the broken connection.
    pub async fn broadcast(&self, message: &[u8], exclude: Option<ClientId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let snapshot = self.registry.snapshot_for_broadcast().await;
        let members = snapshot.len();

        for client in snapshot.iter() {
            if Some(client.id()) == exclude {
                continue;
            }

            match timeout(self.write_timeout, client.send(message)).await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        client_id = %client.id(),
                        addr = %client.addr(),
                        error = %e,
                        "Failed to deliver message"
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(
                        client_id = %client.id(),
                        addr = %client.addr(),
                        "Message delivery timed out after {:?}",
                        self.write_timeout
                    );
                    report.failed += 1;
                }
            }
        }
        drop(snapshot);

        debug!(
            "Broadcast {} bytes to {} members: {} delivered, {} failed",
            message.len(),
            members,
            report.delivered,
            report.failed
        );
        self.metrics.record_broadcast(&report);
        report
    }

    /// Tell everyone but the new client that it joined
    pub async fn announce_join(&self, name: &str, client: ClientId) -> BroadcastReport {
        self.broadcast(join_notice(name).as_bytes(), Some(client)).await
    }

    /// Tell every remaining client that `name` left
    pub async fn announce_leave(&self, name: &str) -> BroadcastReport {
        self.broadcast(leave_notice(name).as_bytes(), None).await
    }
}

pub fn join_notice(name: &str) -> String {
    format!("*** {} has connected ***\n", name)
}

pub fn leave_notice(name: &str) -> String {
    format!("*** {} has disconnected ***\n", name)
}
