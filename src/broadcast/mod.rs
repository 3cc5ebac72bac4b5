//! Broadcast Module
//!
//! Fans messages out to registered clients.

pub mod engine;

pub use engine::{join_notice, leave_notice, BroadcastReport, Broadcaster};
