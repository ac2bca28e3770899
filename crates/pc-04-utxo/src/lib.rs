//! # UTXO Engine (pc-04)
//!
//! Tracks which committed outputs are spent and decides whether a
//! transaction may spend its inputs.
//!
//! ```text
//!   fetch_inputs: queued batch ──► TxDb (body from block file) ──► PoolView
//!                                   │
//!   connect_inputs ◄────────────────┘
//!      pass 1: bounds · maturity · timestamps · frozen · value range
//!      pass 2: double spend · signatures · mark spent in `queued`
//!      then:   conservation · fee · peg fractions (pc-05)
//!
//!   disconnect_inputs: clear spent slots, erase own TxIndex
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Single spend | `spent[n]` is set by exactly one connected spender |
//! | Inverse | `disconnect_inputs` restores the index bytes `connect_inputs` changed |
//! | Pool isolation | `TxPos::Mempool` entries are never persisted |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::tx_db::TxDb;
pub use domain::context::{ConnectContext, ConnectedTx, FetchedInputs};
pub use domain::errors::UtxoError;
pub use domain::tx_index::{QueuedChanges, TxIndex, TxPos};
pub use ports::outbound::PoolView;
pub use service::{outpoints, stake_fractions, UtxoEngine};
