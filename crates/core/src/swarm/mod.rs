//! Swarm observer abstraction.
//!
//! The monitor consumes the BitTorrent engine through the `SwarmObserver`
//! trait: a pollable event stream plus "resolve magnet to metadata".

mod librqbit;
pub mod lsd;
mod types;

pub use librqbit::LibrqbitObserver;
pub use types::*;
