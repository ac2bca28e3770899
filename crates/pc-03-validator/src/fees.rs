//! Fee floors.
//!
//! | Floor | Formula | Enforced by |
//! |-------|---------|-------------|
//! | [`min_fee`] | `(1 + size/1000) * min_tx_fee`, after peg activation at least `(n_in + n_out) * peg_fee_per_io` | block connect and mempool admission |
//! | [`relay_fee`] | `(1 + size/1000) * min_relay_fee` | free-relay rate limiter |

use shared_types::{Amount, ChainParams};

/// Smallest fee a transaction must pay to be mined.
pub fn min_fee(size: usize, n_in: usize, n_out: usize, peg_active: bool, params: &ChainParams) -> Amount {
    let per_kb = (1 + size as i64 / 1000).saturating_mul(params.min_tx_fee);
    if !peg_active {
        return per_kb;
    }
    let per_io = ((n_in + n_out) as i64).saturating_mul(params.peg_fee_per_io);
    per_kb.max(per_io)
}

/// Fee below which admission counts against the free-relay budget.
pub fn relay_fee(size: usize, params: &ChainParams) -> Amount {
    (1 + size as i64 / 1000).saturating_mul(params.min_relay_fee)
}
