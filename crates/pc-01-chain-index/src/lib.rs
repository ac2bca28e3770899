//! # Chain Index (pc-01)
//!
//! In-memory index of every known block header, valid or not, on any
//! branch. Records live in an append-only arena and refer to each other
//! by [`BlockId`]; nothing is ever removed.
//!
//! ```text
//!   genesis ── b1 ── b2 ── b3 ── b4   ← best (next links set along here)
//!                     └── b3' ── b4' ── b5'   (prev links only)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Trust monotonic | `chain_trust(child) > chain_trust(parent)` |
//! | One next | `next` is set on at most one child: the best-chain one |
//! | Stable ids | A `BlockId` stays valid for the life of the index |
//! | Lazy supply | `peg_supply_index` is derived from ancestors on demand |

pub mod domain;

pub use domain::arena::ChainIndex;
pub use domain::entities::{BlockFlags, BlockId, BlockIndex, PegVote};
pub use domain::errors::IndexError;
