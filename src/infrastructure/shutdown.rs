//! Graceful Shutdown Handler
//!
//! Signals shutdown to the HTTP server and every open stream session, and
//! tracks how many sessions are still draining.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;

/// Shutdown coordinator for graceful termination.
#[derive(Clone)]
pub struct ShutdownController {
    shutdown_initiated: Arc<AtomicBool>,
    active_sessions: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
    drain_complete: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            drain_complete: Arc::new(Notify::new()),
        }
    }

    /// Initiate graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been initiated, including before the call.
    pub async fn cancelled(&self) {
        // Subscribe before checking the flag so a concurrent shutdown is seen.
        let mut rx = self.shutdown_tx.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Track a session until the returned guard is dropped.
    pub fn session_guard(&self) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            controller: self.clone(),
        }
    }

    fn session_ended(&self) {
        let prev = self.active_sessions.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 && self.is_shutdown() {
            self.drain_complete.notify_waiters();
        }
    }

    /// Wait for all sessions to end (with timeout).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = self.drain_complete.notified();
        if self.active_sessions() == 0 {
            return true;
        }

        tokio::select! {
            _ = drained => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "drain timeout: {} stream sessions still active",
                    self.active_sessions()
                );
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one open stream session.
pub struct SessionGuard {
    controller: ShutdownController,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.controller.session_ended();
    }
}

/// Wait for Ctrl+C or SIGTERM, then initiate shutdown.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
        assert_eq!(controller.active_sessions(), 0);
    }

    #[test]
    fn test_shutdown_initiates_once() {
        let controller = ShutdownController::new();
        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutdown());
    }

    #[test]
    fn test_session_guards() {
        let controller = ShutdownController::new();
        let a = controller.session_guard();
        let b = controller.session_guard();
        assert_eq!(controller.active_sessions(), 2);

        drop(a);
        assert_eq!(controller.active_sessions(), 1);
        drop(b);
        assert_eq!(controller.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_after_shutdown() {
        let controller = ShutdownController::new();
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.cancelled().await })
        };
        tokio::task::yield_now().await;

        controller.shutdown();
        let result = tokio::time::timeout(Duration::from_millis(100), waiter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_when_already_shut_down() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result =
            tokio::time::timeout(Duration::from_millis(100), controller.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_pending_without_shutdown() {
        let controller = ShutdownController::new();
        let result =
            tokio::time::timeout(Duration::from_millis(50), controller.cancelled()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_drain_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();
        assert!(controller.wait_for_drain(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_with_sessions() {
        let controller = ShutdownController::new();
        let guard = controller.session_guard();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.session_guard();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }
}
