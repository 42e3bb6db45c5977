//! Swarm monitor: the event loop tying observer, store and resolver together.
//!
//! The monitor guarantees at most one resolution per hash at a time in this
//! process, never resolves a hash already stored as `Success`, and records
//! every sighting.

mod config;
mod runner;
mod types;

pub use config::MonitorConfig;
pub use runner::SwarmMonitor;
pub use types::{MonitorError, MonitorStatus};
