//! Domain Entities - Core business objects
//!
//! The persisted counter row and the in-memory views derived from it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The single persisted counter row (`t.id = 1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRow {
    /// Number of increments committed on the primary
    pub value: i64,
    /// RFC 3339 commit instant with nanoseconds, empty before the first write
    pub timestamp: String,
}

/// Immutable view of the last observed counter state.
///
/// Sessions copy one of these out of the broadcaster so that every frame
/// they serialize is consistent even while the monitor keeps publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub value: i64,
    pub latency: Duration,
}

impl Snapshot {
    pub fn new(value: i64, latency: Duration) -> Self {
        Self { value, latency }
    }

    /// Wire payload for a stream frame.
    pub fn to_event(&self) -> UpdateEvent {
        UpdateEvent {
            value: self.value,
            latency: self.latency.as_secs_f64(),
        }
    }
}

/// Payload of an `update` server-sent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub value: i64,
    /// Replication latency in seconds
    pub latency: f64,
}
