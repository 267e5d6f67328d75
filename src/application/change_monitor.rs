//! Change Monitor - replicated write detection
//!
//! Background task that turns change-feed signals into broadcaster
//! publishes. Each signal triggers one cycle: read the counter row,
//! compare with the last published value, and if it moved, compute the
//! replication latency and publish a new generation.

use crate::domain::entities::Snapshot;
use crate::domain::ports::{ChangeFeed, ChangeFeedError, CounterStore};
use crate::domain::services::Broadcaster;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fatal monitor termination.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("change feed lost: {0}")]
    FeedLost(#[from] ChangeFeedError),
    #[error("monitor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("monitor stopped unexpectedly")]
    Stopped,
}

/// Commit timestamp that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid commit timestamp {timestamp:?}: {source}")]
pub struct LatencyError {
    timestamp: String,
    #[source]
    source: chrono::ParseError,
}

/// Elapsed time between a commit timestamp and the instant it was observed.
///
/// An empty timestamp (row never written) yields zero, as does an
/// observation that appears to precede the commit because of clock skew.
pub fn replication_latency(
    timestamp: &str,
    observed_at: DateTime<Utc>,
) -> Result<Duration, LatencyError> {
    if timestamp.is_empty() {
        return Ok(Duration::ZERO);
    }
    let committed = DateTime::parse_from_rfc3339(timestamp).map_err(|source| LatencyError {
        timestamp: timestamp.to_string(),
        source,
    })?;
    Ok((observed_at - committed.with_timezone(&Utc))
        .to_std()
        .unwrap_or(Duration::ZERO))
}

/// Result of one monitor cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Value matched the last publish; nothing was broadcast
    Unchanged(i64),
    /// A new generation was published
    Published(Snapshot),
}

pub struct ChangeMonitor {
    store: Arc<dyn CounterStore>,
    broadcaster: Arc<Broadcaster>,
}

impl ChangeMonitor {
    pub fn new(store: Arc<dyn CounterStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Run one read/compare/publish cycle.
    ///
    /// Store errors are returned to the caller; the broadcaster is left
    /// untouched in that case.
    pub async fn observe(&self) -> anyhow::Result<Observation> {
        let row = self.store.read().await?;
        let observed_at = Utc::now();

        if row.value == self.broadcaster.snapshot().value {
            return Ok(Observation::Unchanged(row.value));
        }

        let latency = match replication_latency(&row.timestamp, observed_at) {
            Ok(latency) => latency,
            Err(e) => {
                tracing::warn!("monitor: {}; reporting zero latency", e);
                Duration::ZERO
            }
        };

        let snapshot = Snapshot::new(row.value, latency);
        if self.broadcaster.publish(snapshot) {
            tracing::info!(
                value = snapshot.value,
                latency_secs = latency.as_secs_f64(),
                "value changed"
            );
            Ok(Observation::Published(snapshot))
        } else {
            Ok(Observation::Unchanged(row.value))
        }
    }

    async fn cycle(&self) {
        match self.observe().await {
            Ok(Observation::Unchanged(value)) => {
                tracing::debug!(value, "monitor: value unchanged");
            }
            Ok(Observation::Published(_)) => {}
            Err(e) => tracing::warn!("monitor: cannot read counter, skipping cycle: {:#}", e),
        }
    }

    /// Drive the monitor until the feed fails.
    ///
    /// A priming cycle runs first so subscribers start from the stored
    /// value instead of zero.
    pub async fn run<F: ChangeFeed>(self, mut feed: F) -> Result<(), MonitorError> {
        self.cycle().await;
        loop {
            if let Err(e) = feed.changed().await {
                tracing::error!("monitor: {}", e);
                return Err(e.into());
            }
            self.cycle().await;
        }
    }

    /// Start the monitor as a background task.
    pub fn spawn<F: ChangeFeed + 'static>(self, feed: F) -> MonitorHandle {
        MonitorHandle {
            task: Some(tokio::spawn(self.run(feed))),
        }
    }
}

/// Owner of the running monitor task.
///
/// Dropping the handle aborts the task, which drops the change feed and
/// releases its filesystem subscription.
pub struct MonitorHandle {
    task: Option<JoinHandle<Result<(), MonitorError>>>,
}

impl MonitorHandle {
    /// Wait for the monitor to terminate. It only does so on failure.
    pub async fn wait(&mut self) -> MonitorError {
        let Some(task) = self.task.as_mut() else {
            return MonitorError::Stopped;
        };
        let result = task.await;
        self.task = None;
        match result {
            Ok(Ok(())) => MonitorError::Stopped,
            Ok(Err(e)) => e,
            Err(e) => MonitorError::Task(e),
        }
    }

    /// Stop the monitor and wait for its task to finish.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            tracing::info!("change monitor stopped");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
