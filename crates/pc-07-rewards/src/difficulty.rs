//! Block trust and difficulty retargeting.
//!
//! PoW and PoS blocks retarget independently: each kind looks only at the
//! spacing between its own two most recent blocks.
//!
//! ```text
//! new = old * ((interval - 1) * spacing + 2 * actual)
//!           / ((interval + 1) * spacing)
//! ```

use pc_01_chain_index::{BlockId, ChainIndex};
use primitive_types::{U256, U512};
use shared_types::target::{decode_compact, encode_compact};
use shared_types::ChainParams;

/// Expected number of hashes to meet `bits`: `(!target / (target + 1)) + 1`.
/// Invalid or zero targets carry no trust.
pub fn block_trust(bits: u32) -> U256 {
    let target = match decode_compact(bits) {
        Some(t) if !t.is_zero() => t,
        _ => return U256::zero(),
    };
    match target.checked_add(U256::one()) {
        Some(denominator) => (!target / denominator) + U256::one(),
        None => U256::one(),
    }
}

/// `bits` required for a block of the given kind built on `prev`.
pub fn next_target_required(
    index: &ChainIndex,
    prev: Option<BlockId>,
    proof_of_stake: bool,
    params: &ChainParams,
) -> u32 {
    let limit = if proof_of_stake {
        params.pos_limit
    } else {
        params.pow_limit
    };
    let limit_bits = encode_compact(limit);

    let Some(prev) = prev else {
        return limit_bits;
    };
    if params.no_retarget {
        return limit_bits;
    }

    let last = index.last_of_kind(prev, proof_of_stake);
    let Some(before_last) = index.prev(last) else {
        return limit_bits;
    };
    let last_prev = index.last_of_kind(before_last, proof_of_stake);
    if index.prev(last_prev).is_none() {
        return limit_bits;
    }

    let spacing = i64::from(params.target_spacing);
    let mut actual = i64::from(index.get(last).time()) - i64::from(index.get(last_prev).time());
    if actual < 0 {
        actual = spacing;
    }

    let Some(old) = decode_compact(index.get(last).header.bits) else {
        return limit_bits;
    };
    let interval = i64::from(params.target_interval());
    let numerator = ((interval - 1) * spacing + 2 * actual) as u64;
    let denominator = ((interval + 1) * spacing) as u64;

    let scaled = U512::from(old) * U512::from(numerator) / U512::from(denominator.max(1));
    let new = U256::try_from(scaled).unwrap_or(limit);
    if new.is_zero() || new > limit {
        return limit_bits;
    }
    encode_compact(new)
}
