//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::filter::DEFAULT_BANNED_WORDS;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub monitoring: MonitoringConfig,
}

/// Listener and fan-out settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_clients: usize,
    /// Upper bound for one write to one recipient during a broadcast
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

/// Chat protocol settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Size of the first read, which carries the display name
    pub max_name_length: usize,
    /// Size of every later read; one read is one message
    pub max_message_length: usize,
    pub banned_words: Vec<String>,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            max_clients: 100,
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_name_length: 31,
            max_message_length: 256,
            banned_words: DEFAULT_BANNED_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_addr: None,
        }
    }
}
