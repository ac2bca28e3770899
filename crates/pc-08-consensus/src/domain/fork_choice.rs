//! # Fork Choice
//!
//! A candidate tip replaces the best tip when its chain trust is strictly
//! greater. Failing that, a deep fork is still taken when a trusted staker
//! produced any block of the candidate branch:
//!
//! ```text
//!   fork ── b1 ── … ── b25           ← best  (best.height - fork.height > depth)
//!     └──── c1 ── c2(trusted) ── c3  ← candidate: switch despite less trust
//! ```
//!
//! Trust alone is monotonic; the tiebreak is not, and is kept as is.

use pc_01_chain_index::{BlockId, ChainIndex};
use shared_types::ChainParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkDecision {
    Stay,
    /// Candidate carries more trust.
    MoreTrust,
    /// Deep fork taken because a trusted staker built on the candidate branch.
    TrustedStaker,
}

impl ForkDecision {
    pub fn switches(self) -> bool {
        self != ForkDecision::Stay
    }
}

pub fn choose_fork(
    index: &ChainIndex,
    best: BlockId,
    candidate: BlockId,
    params: &ChainParams,
) -> ForkDecision {
    if candidate == best || index.get(candidate).is_failed() {
        return ForkDecision::Stay;
    }
    if index.get(candidate).chain_trust > index.get(best).chain_trust {
        return ForkDecision::MoreTrust;
    }
    if params.trusted_stakers.is_empty() {
        return ForkDecision::Stay;
    }

    let Some(fork) = index.find_fork(best, candidate) else {
        return ForkDecision::Stay;
    };
    let depth = index.get(best).height.saturating_sub(index.get(fork).height);
    if depth <= params.staker_tiebreak_depth {
        return ForkDecision::Stay;
    }
    let trusted = index
        .ancestors(candidate)
        .take_while(|id| *id != fork)
        .any(|id| {
            index
                .get(id)
                .staker
                .is_some_and(|staker| params.is_trusted_staker(&staker))
        });
    if trusted {
        ForkDecision::TrustedStaker
    } else {
        ForkDecision::Stay
    }
}
