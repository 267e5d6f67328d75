//! Application Layer
//!
//! Long-running use cases built on the domain: the change monitor that
//! feeds the broadcaster, and the per-client stream sessions reading it.

mod change_monitor;
mod stream_session;

pub use change_monitor::{
    replication_latency, ChangeMonitor, LatencyError, MonitorError, MonitorHandle, Observation,
};
pub use stream_session::StreamSession;
