//! Configuration Manager

use super::Config;
use crate::filter::MASK_CHAR;
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::Path;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        Self::load_from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from defaults overridden by `lookup`
    ///
    /// `lookup` maps a `CHATRELAY_*` variable name to its value.
    pub fn load_from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(bind_addr) = lookup("CHATRELAY_BIND_ADDR") {
            config.server.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid CHATRELAY_BIND_ADDR: {}", bind_addr))?;
        }

        if let Some(max_clients) = lookup("CHATRELAY_MAX_CLIENTS") {
            config.server.max_clients = max_clients
                .parse::<usize>()
                .with_context(|| format!("Invalid CHATRELAY_MAX_CLIENTS: {}", max_clients))?;
        }

        if let Some(write_timeout) = lookup("CHATRELAY_WRITE_TIMEOUT") {
            config.server.write_timeout = humantime::parse_duration(&write_timeout)
                .with_context(|| format!("Invalid CHATRELAY_WRITE_TIMEOUT: {}", write_timeout))?;
        }

        if let Some(metrics_addr) = lookup("CHATRELAY_METRICS_ADDR") {
            let addr = metrics_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid CHATRELAY_METRICS_ADDR: {}", metrics_addr))?;
            config.monitoring.metrics_addr = Some(addr);
        }

        if let Some(log_level) = lookup("CHATRELAY_LOG_LEVEL") {
            config.monitoring.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        self.validate_chat_config()
            .with_context(|| "Chat configuration validation failed")?;

        self.validate_monitoring_config()
            .with_context(|| "Monitoring configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.max_clients == 0 {
            bail!("max_clients must be greater than 0");
        }

        if self.server.max_clients > 100_000 {
            bail!("max_clients cannot exceed 100,000");
        }

        if self.server.write_timeout.is_zero() {
            bail!("write_timeout must be greater than 0");
        }

        if self.server.write_timeout.as_secs() > 3600 {
            bail!("write_timeout cannot exceed 1 hour");
        }

        Ok(())
    }

    fn validate_chat_config(&self) -> Result<()> {
        if self.chat.max_name_length == 0 {
            bail!("max_name_length must be greater than 0");
        }

        if self.chat.max_name_length > 255 {
            bail!("max_name_length cannot exceed 255 bytes");
        }

        if self.chat.max_message_length == 0 {
            bail!("max_message_length must be greater than 0");
        }

        if self.chat.max_message_length > 65536 {
            bail!("max_message_length cannot exceed 64KB");
        }

        for (i, word) in self.chat.banned_words.iter().enumerate() {
            if word.is_empty() {
                bail!("Banned word {} is empty", i);
            }

            if !word.is_ascii() {
                bail!("Banned word {} must be ASCII", i);
            }

            if word.as_bytes().contains(&MASK_CHAR) {
                bail!("Banned word {} contains the mask character '*'", i);
            }
        }

        Ok(())
    }

    fn validate_monitoring_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.monitoring.log_level.as_str()) {
            bail!(
                "monitoring.log_level must be one of: {}",
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<SocketAddr>,
        port: Option<u16>,
        max_clients: Option<usize>,
        log_level: Option<&str>,
        metrics_addr: Option<SocketAddr>,
    ) {
        if let Some(addr) = bind {
            self.server.bind_addr = addr;
            tracing::info!("CLI override: bind address set to {}", addr);
        }

        if let Some(port) = port {
            self.server.bind_addr.set_port(port);
            tracing::info!("CLI override: port set to {}", port);
        }

        if let Some(max_clients) = max_clients {
            self.server.max_clients = max_clients;
            tracing::info!("CLI override: max clients set to {}", max_clients);
        }

        if let Some(level) = log_level {
            self.monitoring.log_level = level.to_string();
        }

        if let Some(addr) = metrics_addr {
            self.monitoring.metrics_addr = Some(addr);
            tracing::info!("CLI override: metrics address set to {}", addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.server.max_clients, 100);
        assert_eq!(config.chat.max_name_length, 31);
        assert_eq!(config.chat.max_message_length, 256);
        assert_eq!(config.chat.banned_words.len(), 3);
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigManager::load_from_lookup(lookup_from(&[
            ("CHATRELAY_BIND_ADDR", "127.0.0.1:9000"),
            ("CHATRELAY_MAX_CLIENTS", "5"),
            ("CHATRELAY_WRITE_TIMEOUT", "250ms"),
            ("CHATRELAY_LOG_LEVEL", "debug"),
            ("CHATRELAY_METRICS_ADDR", "127.0.0.1:9100"),
        ]))
        .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.server.max_clients, 5);
        assert_eq!(config.server.write_timeout, Duration::from_millis(250));
        assert_eq!(config.monitoring.log_level, "debug");
        assert_eq!(
            config.monitoring.metrics_addr,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(ConfigManager::load_from_lookup(lookup_from(&[(
            "CHATRELAY_MAX_CLIENTS",
            "lots"
        )]))
        .is_err());
        assert!(ConfigManager::load_from_lookup(lookup_from(&[(
            "CHATRELAY_MAX_CLIENTS",
            "0"
        )]))
        .is_err());
        assert!(ConfigManager::load_from_lookup(lookup_from(&[(
            "CHATRELAY_LOG_LEVEL",
            "loud"
        )]))
        .is_err());
    }

    #[test]
    fn test_banned_word_validation() {
        let mut config = Config::default();
        config.chat.banned_words = vec!["fine".to_string(), "".to_string()];
        assert!(config.validate().is_err());

        config.chat.banned_words = vec!["st*r".to_string()];
        assert!(config.validate().is_err());

        config.chat.banned_words = vec!["naïve".to_string()];
        assert!(config.validate().is_err());

        config.chat.banned_words = vec![];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_length_validation() {
        let mut config = Config::default();
        config.chat.max_name_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chat.max_message_length = 1_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        config.merge_with_cli_args(
            Some("127.0.0.1:7000".parse().unwrap()),
            Some(7001),
            Some(3),
            Some("warn"),
            None,
        );

        assert_eq!(config.server.bind_addr, "127.0.0.1:7001".parse().unwrap());
        assert_eq!(config.server.max_clients, 3);
        assert_eq!(config.monitoring.log_level, "warn");
        assert!(config.monitoring.metrics_addr.is_none());
    }
}
