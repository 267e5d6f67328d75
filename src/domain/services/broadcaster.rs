//! Broadcaster - generation-token fan-out
//!
//! Holds the last observed counter state together with a generation token.
//! Publishing a change retires the current token, which wakes every task
//! that captured it, and installs a fresh one for later subscribers.
//!
//! A token is the receiving half of a `watch` channel whose sender never
//! sends: dropping the sender is the broadcast. Because the receiver is
//! created under the same lock that guards the state, capturing a token
//! and then waiting on it cannot miss a publish that happens in between.

use crate::domain::entities::Snapshot;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Opaque handle on one generation of the counter state.
#[derive(Debug)]
pub struct Generation {
    rx: watch::Receiver<()>,
}

impl Generation {
    /// Resolve once this generation has been superseded.
    ///
    /// Cancel-safe: dropping the future leaves nothing registered.
    pub async fn invalidated(mut self) {
        while self.rx.changed().await.is_ok() {}
    }

    pub fn is_invalidated(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

struct NotifyState {
    generation: watch::Sender<()>,
    value: i64,
    latency: Duration,
    published: u64,
}

/// Process-wide "current counter value" signal.
///
/// Constructed once at startup and shared via `Arc` between the change
/// monitor (the only writer) and every stream session.
pub struct Broadcaster {
    state: Mutex<NotifyState>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(());
        Self {
            state: Mutex::new(NotifyState {
                generation,
                value: 0,
                latency: Duration::ZERO,
                published: 0,
            }),
        }
    }

    /// Capture the current generation token and state in one step.
    pub fn subscribe(&self) -> (Generation, Snapshot) {
        let state = self.state.lock();
        let generation = Generation {
            rx: state.generation.subscribe(),
        };
        (generation, Snapshot::new(state.value, state.latency))
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot::new(state.value, state.latency)
    }

    /// Number of publishes so far.
    pub fn generations(&self) -> u64 {
        self.state.lock().published
    }

    /// Publish `snapshot` if its value differs from the last one.
    ///
    /// Returns `false` (and wakes nobody) when the value is unchanged.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        let (next, _) = watch::channel(());
        let retired = {
            let mut state = self.state.lock();
            if state.value == snapshot.value {
                return false;
            }
            state.value = snapshot.value;
            state.latency = snapshot.latency;
            state.published += 1;
            std::mem::replace(&mut state.generation, next)
        };
        // Waking waiters happens outside the lock.
        drop(retired);
        true
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_millis(100);

    #[test]
    fn test_new_broadcaster_is_zero() {
        let b = Broadcaster::new();
        assert_eq!(b.snapshot(), Snapshot::default());
        assert_eq!(b.generations(), 0);
    }

    #[test]
    fn test_publish_updates_snapshot() {
        let b = Broadcaster::new();
        assert!(b.publish(Snapshot::new(4, Duration::from_millis(20))));
        assert_eq!(b.snapshot(), Snapshot::new(4, Duration::from_millis(20)));
        assert_eq!(b.generations(), 1);
    }

    #[test]
    fn test_publish_same_value_is_noop() {
        let b = Broadcaster::new();
        assert!(b.publish(Snapshot::new(1, Duration::from_millis(5))));
        let (generation, _) = b.subscribe();

        assert!(!b.publish(Snapshot::new(1, Duration::from_secs(9))));
        assert!(!generation.is_invalidated());
        assert_eq!(b.generations(), 1);
        // Latency of a deduplicated observation is not recorded
        assert_eq!(b.snapshot().latency, Duration::from_millis(5));
    }

    #[test]
    fn test_publish_invalidates_captured_token() {
        let b = Broadcaster::new();
        let (generation, _) = b.subscribe();
        assert!(!generation.is_invalidated());

        b.publish(Snapshot::new(1, Duration::ZERO));
        assert!(generation.is_invalidated());
    }

    #[test]
    fn test_token_captured_after_publish_is_valid() {
        let b = Broadcaster::new();
        b.publish(Snapshot::new(1, Duration::ZERO));
        let (generation, snap) = b.subscribe();
        assert!(!generation.is_invalidated());
        assert_eq!(snap.value, 1);
    }

    #[tokio::test]
    async fn test_waiter_is_woken_by_publish() {
        let b = Arc::new(Broadcaster::new());
        let (generation, _) = b.subscribe();

        let waiter = tokio::spawn(async move { generation.invalidated().await });
        tokio::task::yield_now().await;
        b.publish(Snapshot::new(1, Duration::ZERO));

        assert!(timeout(WAIT, waiter).await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_before_wait_is_not_missed() {
        let b = Broadcaster::new();
        let (generation, _) = b.subscribe();
        b.publish(Snapshot::new(1, Duration::ZERO));

        // Waiting starts after the publish and still resolves
        assert!(timeout(WAIT, generation.invalidated()).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_spurious_wake() {
        let b = Broadcaster::new();
        b.publish(Snapshot::new(1, Duration::ZERO));
        let (generation, _) = b.subscribe();

        assert!(timeout(WAIT, generation.invalidated()).await.is_err());
    }

    #[tokio::test]
    async fn test_dedup_keeps_waiters_blocked() {
        let b = Broadcaster::new();
        b.publish(Snapshot::new(2, Duration::ZERO));
        let (generation, _) = b.subscribe();
        b.publish(Snapshot::new(2, Duration::ZERO));

        assert!(timeout(WAIT, generation.invalidated()).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_wakes_all_waiters() {
        let b = Arc::new(Broadcaster::new());
        let mut waiters = Vec::new();
        for _ in 0..16 {
            let (generation, _) = b.subscribe();
            let b = b.clone();
            waiters.push(tokio::spawn(async move {
                generation.invalidated().await;
                b.subscribe().1
            }));
        }

        b.publish(Snapshot::new(9, Duration::ZERO));

        for waiter in waiters {
            let snap = timeout(WAIT, waiter).await.unwrap().unwrap();
            assert_eq!(snap.value, 9);
        }
    }
}
