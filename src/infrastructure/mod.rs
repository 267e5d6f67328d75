//! Infrastructure Layer
//!
//! Cross-cutting concerns shared by the server and its sessions.

pub mod shutdown;

pub use shutdown::{shutdown_signal, SessionGuard, ShutdownController};
