//! ChatRelay - Multi-client TCP chat relay

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::{
    config::{Config, ConfigManager},
    metrics::{Metrics, MetricsServer},
    ConnectionManager, ShutdownCoordinator,
};

/// CLI arguments for ChatRelay
#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
#[command(about = "ChatRelay - Multi-client TCP chat relay")]
#[command(version)]
#[command(long_about = "
ChatRelay - Multi-client TCP chat relay

Clients connect over TCP, send their display name as the first message and
then chat. Every message is filtered for banned words and relayed to all
other connected clients.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  CHATRELAY_BIND_ADDR      - Bind address (e.g., 0.0.0.0:8080)
  CHATRELAY_MAX_CLIENTS    - Maximum concurrent clients
  CHATRELAY_WRITE_TIMEOUT  - Per-recipient write timeout (e.g., 5s, 500ms)
  CHATRELAY_METRICS_ADDR   - Prometheus endpoint address
  CHATRELAY_LOG_LEVEL      - Log level (trace, debug, info, warn, error)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Port to bind to (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum number of concurrent clients
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = load_config(&args)?;
    init_tracing(&config, args.verbose)?;

    if args.validate_config {
        info!("Configuration is valid");
        log_summary(&config);
        return Ok(());
    }

    info!("Starting ChatRelay v{}", env!("CARGO_PKG_VERSION"));
    log_summary(&config);

    let metrics = Arc::new(Metrics::new()?);
    let config = Arc::new(config);

    let metrics_handle = match config.monitoring.metrics_addr {
        Some(addr) => {
            let server = MetricsServer::bind(Arc::clone(&metrics), addr).await?;
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!("Metrics server error: {}", e);
                }
            }))
        }
        None => None,
    };

    let manager = ConnectionManager::bind(Arc::clone(&config), Arc::clone(&metrics)).await?;

    let shutdown = ShutdownCoordinator::new();
    let stopped = shutdown.wait();
    let signals = async {
        if let Err(e) = shutdown.listen_for_signals().await {
            error!("Error setting up signal handlers: {}", e);
        }
    };

    let result = tokio::select! {
        result = manager.run_until(stopped) => result,
        _ = signals => Ok(()),
    };

    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    match result {
        Ok(()) => {
            info!("Server stopped");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {:#}", e);
            Err(e)
        }
    }
}

/// Load configuration: CLI args > config file > environment > defaults
fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    config.merge_with_cli_args(
        args.bind,
        args.port,
        args.max_clients,
        args.log_level.as_deref(),
        args.metrics_addr,
    );

    config
        .validate()
        .context("Final configuration validation failed")?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let log_level = if verbose {
        "debug"
    } else {
        config.monitoring.log_level.as_str()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true),
        )
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

fn log_summary(config: &Config) {
    info!("Bind address: {}", config.server.bind_addr);
    info!("Max clients: {}", config.server.max_clients);
    info!("Write timeout: {:?}", config.server.write_timeout);
    info!(
        "Name/message limits: {}/{} bytes",
        config.chat.max_name_length, config.chat.max_message_length
    );
    info!("Banned words: {}", config.chat.banned_words.len());
    match config.monitoring.metrics_addr {
        Some(addr) => info!("Metrics endpoint: http://{}/metrics", addr),
        None => info!("Metrics endpoint disabled"),
    }
}
