//! Append-only log of terminal resolution outcomes.

mod entry;
mod handle;
mod sink;
mod writer;

pub use entry::*;
pub use handle::*;
pub use sink::*;
pub use writer::*;
