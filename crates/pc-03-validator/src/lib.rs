//! # Validator (pc-03)
//!
//! Stateless checks on transactions and blocks. Nothing here reads the
//! chain, the UTXO set or the clock; callers pass what context a rule needs.
//!
//! ```text
//!  loose tx ──► check_transaction ──► is_standard_tx ──► mempool
//!  block    ──► check_block ─┬─► check_proof_of_work (PoW only)
//!                            ├─► check_transaction (every tx)
//!                            └─► verify_block_signature
//! ```
//!
//! ## Error Scoring
//!
//! | Error | Score |
//! |-------|-------|
//! | empty inputs/outputs, null prevout | 10 |
//! | bad target, failed PoW, timestamp rules | 50 |
//! | every other structural failure | 100 |
//! | [`NonStandard`] | 0 (soft) |

pub mod block;
pub mod errors;
pub mod fees;
pub mod transaction;

pub use block::{
    block_signing_key, block_staker, check_block, check_proof_of_work, sign_block,
    verify_block_signature, CheckFlags,
};
pub use errors::{BlockCheckError, NonStandard, TxCheckError};
pub use fees::{min_fee, relay_fee};
pub use transaction::{check_transaction, is_standard_tx};
