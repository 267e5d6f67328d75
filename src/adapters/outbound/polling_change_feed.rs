//! Polling Change Feed
//!
//! Implements ChangeFeed by comparing file modification times and sizes at
//! a fixed interval. For filesystems that do not deliver notifications
//! (network mounts, some container overlays).

use crate::domain::ports::{ChangeFeed, ChangeFeedError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

pub struct PollingChangeFeed {
    /// Watched files with their last seen stamp (`None` = absent)
    files: Vec<(PathBuf, Option<FileStamp>)>,
    interval: Interval,
}

impl PollingChangeFeed {
    pub fn new(paths: &[PathBuf], poll_interval: Duration) -> Self {
        let files = paths
            .iter()
            .map(|p| (p.clone(), FileStamp::of(p)))
            .collect();
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(?poll_interval, "polling for database writes");
        Self { files, interval }
    }

    /// Files whose stamp moved since the last check.
    fn check_files(&mut self) -> Vec<PathBuf> {
        let mut modified = Vec::new();
        for (path, last) in self.files.iter_mut() {
            let current = FileStamp::of(path);
            if current.is_some() && current != *last {
                modified.push(path.clone());
            }
            *last = current;
        }
        modified
    }
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn changed(&mut self) -> Result<(), ChangeFeedError> {
        loop {
            self.interval.tick().await;
            let modified = self.check_files();
            if !modified.is_empty() {
                tracing::trace!(?modified, "database files changed");
                return Ok(());
            }
        }
    }
}
