//! Connection Management Module
//!
//! Handles TCP connection acceptance, per-client sessions, and teardown.

pub mod handler;
pub mod manager;

pub use handler::{ConnectionHandler, SessionState};
pub use manager::ConnectionManager;
