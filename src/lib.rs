//! replica-counter Library
//!
//! Replication-aware request handling for a single-writer SQLite database
//! replicated to read-only regions: change detection on the replicated
//! file, fan-out of updates to streaming clients, and write/region replay
//! routing.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{ChangeMonitor, MonitorHandle, StreamSession};
pub use config::{load_config, Config};
pub use domain::entities::{CounterRow, Snapshot, UpdateEvent};
pub use domain::ports::{ChangeFeed, ChangeFeedError, CounterStore};
pub use domain::services::{Broadcaster, RegionRouter, RouteDecision};
pub use domain::value_objects::{Region, RegionCode};
