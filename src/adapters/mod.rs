//! Adapters Layer
//!
//! `inbound` drives the application (HTTP); `outbound` implements the
//! domain ports (SQLite store, change feeds).

pub mod inbound;
pub mod outbound;
