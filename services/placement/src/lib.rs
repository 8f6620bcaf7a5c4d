//! berth placement engine.
//!
//! This crate ships the `placement-engine` binary, but the engine itself is a
//! library so it can be embedded and integration tested against the
//! in-memory store.

pub mod api;
pub mod cluster;
pub mod config;
pub mod model;
pub mod placement;
pub mod reservation;
pub mod seed;
pub mod state;
pub mod store;
pub mod zones;
