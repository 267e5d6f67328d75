//! Change Feed Port
//!
//! A source of "the store may have changed" signals. The monitor does not
//! care where they come from: filesystem notifications, mtime polling, or
//! a replication callback all satisfy the contract.

use async_trait::async_trait;
use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a change feed.
///
/// Any of these means no future change can be observed.
#[derive(Debug, thiserror::Error)]
pub enum ChangeFeedError {
    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("change subscription failed: {0}")]
    Subscription(#[source] BoxError),
    #[error("change feed closed")]
    Closed,
}

#[async_trait]
pub trait ChangeFeed: Send {
    /// Wait for the next change signal.
    ///
    /// Several underlying events may be folded into one signal.
    async fn changed(&mut self) -> Result<(), ChangeFeedError>;
}
