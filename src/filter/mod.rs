//! Content Filter Module
//!
//! Masks banned words in chat messages before they are relayed.

pub mod content;

pub use content::{ContentFilter, DEFAULT_BANNED_WORDS, MASK_CHAR};
