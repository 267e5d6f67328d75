//! Counter Store Port
//!
//! Defines the interface to the single-row counter table.
//! The store is shared by every request task and the change monitor,
//! so implementations must be safe for concurrent use.

use crate::domain::entities::CounterRow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for the replicated counter row.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the current value and commit timestamp.
    async fn read(&self) -> anyhow::Result<CounterRow>;

    /// Add one to the counter and stamp it with `committed_at`.
    ///
    /// Only ever called on the primary region.
    async fn increment(&self, committed_at: DateTime<Utc>) -> anyhow::Result<()>;
}
