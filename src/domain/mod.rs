//! Domain Layer
//!
//! Counter state, region identity and the pure logic around them.
//! Adapters plug in through the traits in `ports`.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use value_objects::{Region, RegionCode};
