//! Filesystem Change Feed
//!
//! Implements ChangeFeed with OS file notifications (inotify, FSEvents,
//! ...) on the data file and its WAL sidecar.
//!
//! The parent directory is watched rather than the files themselves: the
//! WAL file may not exist yet and is recreated after checkpoints, and the
//! replicator may swap the data file. Events are filtered by file name.

use crate::domain::ports::{ChangeFeed, ChangeFeedError};
use async_trait::async_trait;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub struct NotifyChangeFeed {
    // Dropping the watcher ends the OS subscription.
    _watcher: RecommendedWatcher,
    signals: mpsc::Receiver<()>,
    errors: mpsc::UnboundedReceiver<notify::Error>,
}

impl NotifyChangeFeed {
    /// Subscribe to write events on `paths`.
    pub fn watch(paths: &[PathBuf]) -> Result<Self, ChangeFeedError> {
        let names: BTreeSet<OsString> = paths
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_owned()))
            .collect();
        let dirs: BTreeSet<PathBuf> = paths.iter().map(|p| parent_dir(p)).collect();

        // Capacity 1: signals arriving while one is pending are coalesced.
        let (signal_tx, signals) = mpsc::channel(1);
        let (error_tx, errors) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_write(&event.kind) && touches(&event, &names) {
                        let _ = signal_tx.try_send(());
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(e);
                }
            },
            Config::default(),
        )
        .map_err(|e| ChangeFeedError::Subscription(e.into()))?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| ChangeFeedError::Watch {
                    path: dir.clone(),
                    source: source.into(),
                })?;
            tracing::info!(dir = %dir.display(), "watching for database writes");
        }

        Ok(Self {
            _watcher: watcher,
            signals,
            errors,
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn touches(event: &Event, names: &BTreeSet<OsString>) -> bool {
    event
        .paths
        .iter()
        .filter_map(|p| p.file_name())
        .any(|n| names.contains(n))
}

/// Wait for the next signal. A watcher error wins over a pending signal.
async fn next_signal(
    signals: &mut mpsc::Receiver<()>,
    errors: &mut mpsc::UnboundedReceiver<notify::Error>,
) -> Result<(), ChangeFeedError> {
    tokio::select! {
        biased;
        err = errors.recv() => match err {
            Some(e) => Err(ChangeFeedError::Subscription(e.into())),
            None => Err(ChangeFeedError::Closed),
        },
        signal = signals.recv() => signal.ok_or(ChangeFeedError::Closed),
    }
}

#[async_trait]
impl ChangeFeed for NotifyChangeFeed {
    async fn changed(&mut self) -> Result<(), ChangeFeedError> {
        next_signal(&mut self.signals, &mut self.errors).await
    }
}
