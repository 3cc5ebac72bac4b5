//! Metrics Collector

use anyhow::Context;
use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use tracing::error;

use crate::broadcast::BroadcastReport;
use crate::Result;

/// Prometheus metrics for the chat relay
pub struct Metrics {
    prometheus_registry: Registry,
    connections_total: IntCounter,
    connections_rejected_total: IntCounter,
    active_clients: IntGauge,
    messages_relayed_total: IntCounter,
    delivery_failures_total: IntCounter,
}

/// Point-in-time copy of the metric values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_rejected_total: u64,
    pub active_clients: i64,
    pub messages_relayed_total: u64,
    pub delivery_failures_total: u64,
}

impl Metrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let prometheus_registry = Registry::new();

        let connections_total = IntCounter::new(
            "chatrelay_connections_total",
            "Total number of accepted client connections",
        )?;
        let connections_rejected_total = IntCounter::new(
            "chatrelay_connections_rejected_total",
            "Connections rejected because the client registry was full",
        )?;
        let active_clients = IntGauge::new(
            "chatrelay_active_clients",
            "Number of clients currently registered",
        )?;
        let messages_relayed_total = IntCounter::new(
            "chatrelay_messages_relayed_total",
            "Chat messages received and broadcast to other clients",
        )?;
        let delivery_failures_total = IntCounter::new(
            "chatrelay_delivery_failures_total",
            "Failed writes to individual recipients",
        )?;

        prometheus_registry
            .register(Box::new(connections_total.clone()))
            .context("Failed to register connections_total")?;
        prometheus_registry
            .register(Box::new(connections_rejected_total.clone()))
            .context("Failed to register connections_rejected_total")?;
        prometheus_registry
            .register(Box::new(active_clients.clone()))
            .context("Failed to register active_clients")?;
        prometheus_registry
            .register(Box::new(messages_relayed_total.clone()))
            .context("Failed to register messages_relayed_total")?;
        prometheus_registry
            .register(Box::new(delivery_failures_total.clone()))
            .context("Failed to register delivery_failures_total")?;

        Ok(Self {
            prometheus_registry,
            connections_total,
            connections_rejected_total,
            active_clients,
            messages_relayed_total,
            delivery_failures_total,
        })
    }

    pub fn connection_accepted(&self) {
        self.connections_total.inc();
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected_total.inc();
    }

    pub fn set_active_clients(&self, count: usize) {
        self.active_clients.set(count as i64);
    }

    pub fn message_relayed(&self) {
        self.messages_relayed_total.inc();
    }

    /// Account for the outcome of one fan-out
    pub fn record_broadcast(&self, report: &BroadcastReport) {
        if report.failed > 0 {
            self.delivery_failures_total.inc_by(report.failed as u64);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.get(),
            connections_rejected_total: self.connections_rejected_total.get(),
            active_clients: self.active_clients.get(),
            messages_relayed_total: self.messages_relayed_total.get(),
            delivery_failures_total: self.delivery_failures_total.get(),
        }
    }

    /// Render all metrics in the Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.prometheus_registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to encode Prometheus metrics");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.connection_accepted();
        metrics.connection_accepted();
        metrics.connection_rejected();
        metrics.set_active_clients(2);
        metrics.message_relayed();
        metrics.record_broadcast(&BroadcastReport {
            delivered: 3,
            failed: 2,
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_rejected_total, 1);
        assert_eq!(snapshot.active_clients, 2);
        assert_eq!(snapshot.messages_relayed_total, 1);
        assert_eq!(snapshot.delivery_failures_total, 2);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new().unwrap();
        metrics.message_relayed();

        let output = metrics.export_prometheus();
        assert!(output.contains("chatrelay_messages_relayed_total 1"));
        assert!(output.contains("chatrelay_active_clients 0"));
    }
}
