//! Banned Word Masking
//!
//! Every occurrence of a banned word, in any ASCII letter casing, is
//! overwritten with `*` characters of the same length. Message length and all
//! other bytes are left untouched, so filtering is idempotent.

use anyhow::{bail, Context};
use regex::bytes::{Regex, RegexBuilder};
use tracing::debug;

use crate::Result;

/// Character used to mask banned words
pub const MASK_CHAR: u8 = b'*';

/// Words masked when no list is configured
pub const DEFAULT_BANNED_WORDS: [&str; 3] = ["badword1", "badword2", "badword3"];

/// Masks banned words in raw message bytes
#[derive(Debug, Clone)]
pub struct ContentFilter {
    patterns: Vec<Regex>,
}

impl ContentFilter {
    /// Build a filter for the given word list
    pub fn new<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(words.len());

        for word in words {
            let word = word.as_ref();
            if word.is_empty() {
                bail!("Banned word list contains an empty word");
            }
            if word.as_bytes().contains(&MASK_CHAR) {
                bail!("Banned word '{}' contains the mask character", word);
            }

            // Byte-level, ASCII-only case folding: a match always spans
            // exactly the word's byte length.
            let pattern = RegexBuilder::new(&regex::escape(word))
                .case_insensitive(true)
                .unicode(false)
                .build()
                .with_context(|| format!("Failed to compile banned word '{}'", word))?;
            patterns.push(pattern);
        }

        debug!("Content filter loaded with {} banned words", patterns.len());
        Ok(Self { patterns })
    }

    /// Build a filter for [`DEFAULT_BANNED_WORDS`]
    pub fn from_defaults() -> Result<Self> {
        Self::new(&DEFAULT_BANNED_WORDS)
    }

    /// Number of banned words
    pub fn word_count(&self) -> usize {
        self.patterns.len()
    }

    /// Mask banned words directly in `message`
    ///
    /// Words are handled in list order, and each one is searched again from
    /// the start until it no longer occurs.
    pub fn filter_in_place(&self, message: &mut [u8]) {
        for pattern in &self.patterns {
            while let Some(range) = pattern.find(message).map(|found| found.range()) {
                message[range].fill(MASK_CHAR);
            }
        }
    }

    /// Return a masked copy of `message`
    pub fn filter(&self, message: &[u8]) -> Vec<u8> {
        let mut filtered = message.to_vec();
        self.filter_in_place(&mut filtered);
        filtered
    }

    /// Whether `message` contains any banned word
    pub fn is_clean(&self, message: &[u8]) -> bool {
        !self.patterns.iter().any(|pattern| pattern.is_match(message))
    }
}
