//! Stream Session - one long-lived update stream per client
//!
//! A session yields the current snapshot immediately, then one snapshot per
//! broadcaster generation until the server shuts down. Client disconnects
//! are handled by dropping: the transport drops the stream, which cancels
//! the pending generation wait and ends the session.

use crate::domain::entities::Snapshot;
use crate::domain::services::{Broadcaster, Generation};
use crate::infrastructure::{SessionGuard, ShutdownController};
use futures::Stream;
use std::sync::Arc;
use uuid::Uuid;

pub struct StreamSession {
    id: Uuid,
    broadcaster: Arc<Broadcaster>,
    shutdown: ShutdownController,
    frames: u64,
    _guard: SessionGuard,
}

impl StreamSession {
    /// Register a new session.
    pub fn open(broadcaster: Arc<Broadcaster>, shutdown: ShutdownController) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "stream connected");
        Self {
            id,
            broadcaster,
            _guard: shutdown.session_guard(),
            shutdown,
            frames: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for `generation` to be superseded.
    ///
    /// Returns `false` if the server is shutting down instead.
    async fn next_change(&self, generation: Generation) -> bool {
        tokio::select! {
            _ = generation.invalidated() => true,
            _ = self.shutdown.cancelled() => {
                tracing::debug!(session = %self.id, "stream closed by shutdown");
                false
            }
        }
    }

    /// Turn the session into a stream of snapshots.
    ///
    /// Each item is copied out of the broadcaster together with the token
    /// used to wait for the next one, so no publish can slip between them.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot> + Send + 'static {
        futures::stream::unfold(
            (self, None::<Generation>),
            |(mut session, pending)| async move {
                if let Some(generation) = pending {
                    if !session.next_change(generation).await {
                        return None;
                    }
                }
                let (generation, snapshot) = session.broadcaster.subscribe();
                session.frames += 1;
                Some((snapshot, (session, Some(generation))))
            },
        )
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        tracing::info!(session = %self.id, frames = self.frames, "stream disconnected");
    }
}
