//! ChatRelay Library
//!
//! Multi-client TCP chat relay. Clients register a display name with their
//! first message and every later message is filtered and broadcast to all
//! other connected clients.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod filter;
pub mod metrics;
pub mod registry;
pub mod shutdown;

pub use broadcast::Broadcaster;
pub use config::Config;
pub use connection::ConnectionManager;
pub use filter::ContentFilter;
pub use registry::ClientRegistry;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the chat relay
pub type Result<T> = anyhow::Result<T>;
