//! # Peg Accountant (pc-05)
//!
//! Every spendable value is carried as [`Fractions`]: `PEG_SIZE` buckets
//! that split into reserve and liquidity at the current supply index.
//!
//! ```text
//!   ┌──────────────┐   InputFractions    ┌──────────────────────────┐
//!   │  pc-04 utxo  │ ──────────────────► │ calculate_*_fractions    │
//!   └──────┬───────┘                     └────────────┬─────────────┘
//!          │ FractionsSource                          │ TxFractions
//!          ▼                                          ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ PegDb (StoreTxn view)                                        │
//!   │  fractions · spendable/frozen indices · frozen queue · ledger │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | output buckets sum to the output value, none negative | `calculate_*_fractions` |
//! | fee fractions equal `value_in - value_out` | `calculate_standard_fractions` |
//! | a frozen output is never in the spendable index | `PegDb::connect_tx`, sweep |
//! | disconnect pops exactly the records connect appended | `PegDb::disconnect_tx` |

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::peg_db::PegDb;
pub use domain::calc::{
    calculate_stake_fractions, calculate_standard_fractions, classify_stake, freeze_duration,
    notary_marker, InputFractions, TxFractions, NOTARY_F_MARKER, NOTARY_V_MARKER,
};
pub use domain::errors::PegError;
pub use domain::fractions::{FractionFlags, Fractions};
pub use domain::ledger::{Balance, FrozenEntry, LedgerKind, LedgerRecord, OutputRef};
pub use domain::vote::{parse_vote, VOTE_DEFLATE, VOTE_INFLATE};
pub use ports::outbound::FractionsSource;
