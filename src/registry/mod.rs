//! Client Registry Module
//!
//! Tracks connected clients under a single exclusion lock.

pub mod client;
pub mod manager;

pub use client::{ClientHandle, ClientId, ClientInfo, ClientWriter};
pub use manager::{ClientRegistry, Registration, RegistryError, RegistrySnapshot};
