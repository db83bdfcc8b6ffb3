//! Correlation id generation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::MessageId;

/// Mints identifiers for outbound data frames.
///
/// An id combines the wall-clock millisecond (hex) with 32 bits of
/// randomness, e.g. `19283f0a1c2-4be91f07`. That is unique enough for
/// correlation within one endpoint's lifetime — the only scope in which
/// these ids are ever compared. Cross-process global uniqueness is not a
/// goal.
#[derive(Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self
    }

    /// Returns a fresh id.
    pub fn next(&mut self) -> MessageId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let noise: u32 = rand::rng().random();
        MessageId(format!("{millis:x}-{noise:08x}"))
    }
}
