//! # Peg-Chain Test Suite
//!
//! Cross-crate scenarios driven through `ChainState` on regtest parameters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # TestChain: in-memory stores, manual clock, block builders
//! └── integration/
//!     ├── reorg.rs         # deep reorganizations, transaction resubmission
//!     ├── mempool.rs       # conflicts, orphans, block-driven eviction
//!     ├── peg.rs           # frozen outputs, fraction conservation
//!     ├── stake.rs         # proof-of-stake blocks end to end
//!     └── properties.rs    # randomized fork choice, maturity, double spends
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pc-tests
//!
//! # By category
//! cargo test -p pc-tests integration::reorg
//!
//! # Benchmarks
//! cargo bench -p pc-tests
//! ```

pub mod fixtures;

#[cfg(test)]
mod integration;
