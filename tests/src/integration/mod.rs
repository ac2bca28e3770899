//! Cross-crate chain scenarios.

mod mempool;
mod peg;
mod properties;
mod reorg;
mod stake;
