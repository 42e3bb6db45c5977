//! Metadata resolution for announced info hashes.
//!
//! The resolver registers a metadata-only fetch with the swarm observer,
//! waits a bounded time for metadata, and records the terminal outcome.
//! Whether a hash should be resolved at all is decided by the monitor.

mod runner;
mod types;

pub use runner::MetadataResolver;
pub use types::{Resolution, ResolutionOutcome, ResolutionState, ResolveError, ResolverConfig};
