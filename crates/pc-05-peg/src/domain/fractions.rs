//! # Fractions
//!
//! Every output value is held as `PEG_SIZE` buckets. Bucket `i` counts as
//! reserve while `i < supply` and as liquid otherwise, where `supply` is the
//! peg supply index of the block being connected.
//!
//! ```text
//!  bucket:  0   1   2  ...  supply-1 | supply ... PEG_SIZE-1
//!           └──────── reserve ───────┘ └────── liquid ──────┘
//! ```
//!
//! A freshly minted value is spread geometrically: each bucket takes 0.2%
//! of what is left and the last bucket takes the remainder.
//!
//! Storage packs a distribution equal to the standard spread of its total
//! as that total alone; anything else is stored sparsely.

use serde::{Deserialize, Serialize};
use shared_types::{Amount, PEG_SIZE};
use std::fmt;

/// Share of the remaining value each bucket takes in a standard spread
/// (1/500 = 0.2%).
pub const PEG_RATE_DIVISOR: Amount = 500;

bitflags::bitflags! {
    /// Freeze markers carried by a fraction set.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    #[serde(transparent)]
    pub struct FractionFlags: u32 {
        /// Bridge-frozen (notary `**F**`).
        const NOTARY_F = 1 << 0;
        /// Validator-frozen (notary `**V**`).
        const NOTARY_V = 1 << 1;
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PackedFractions", into = "PackedFractions")]
pub struct Fractions {
    pub flags: FractionFlags,
    /// Time the freeze ends; meaningless without flags.
    pub lock_time: u32,
    buckets: Vec<Amount>,
}

impl Default for Fractions {
    fn default() -> Self {
        Self::new()
    }
}

impl Fractions {
    /// All buckets zero.
    pub fn new() -> Self {
        Self {
            flags: FractionFlags::empty(),
            lock_time: 0,
            buckets: vec![0; PEG_SIZE],
        }
    }

    /// Standard geometric spread of `value`.
    pub fn std(value: Amount) -> Self {
        let mut out = Self::new();
        let mut remaining = value;
        for bucket in out.buckets.iter_mut().take(PEG_SIZE - 1) {
            let part = remaining / PEG_RATE_DIVISOR;
            *bucket = part;
            remaining -= part;
        }
        out.buckets[PEG_SIZE - 1] = remaining;
        out
    }

    pub fn buckets(&self) -> &[Amount] {
        &self.buckets
    }

    pub fn total(&self) -> Amount {
        self.buckets.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.buckets.iter().all(|b| *b == 0)
    }

    pub fn is_non_negative(&self) -> bool {
        self.buckets.iter().all(|b| *b >= 0)
    }

    /// Sum of buckets below `supply`.
    pub fn reserve(&self, supply: usize) -> Amount {
        self.buckets[..supply.min(PEG_SIZE)].iter().sum()
    }

    /// Sum of buckets at or above `supply`.
    pub fn liquid(&self, supply: usize) -> Amount {
        self.buckets[supply.min(PEG_SIZE)..].iter().sum()
    }

    /// `(reserve, liquid)` parts. Flags are not carried over.
    pub fn split_at(&self, supply: usize) -> (Fractions, Fractions) {
        let cut = supply.min(PEG_SIZE);
        let mut reserve = Fractions::new();
        let mut liquid = Fractions::new();
        reserve.buckets[..cut].copy_from_slice(&self.buckets[..cut]);
        liquid.buckets[cut..].copy_from_slice(&self.buckets[cut..]);
        (reserve, liquid)
    }

    pub fn add(&mut self, other: &Fractions) {
        for (a, b) in self.buckets.iter_mut().zip(&other.buckets) {
            *a += *b;
        }
    }

    /// Frozen and still locked at `time`.
    pub fn is_frozen_at(&self, time: u32) -> bool {
        !self.flags.is_empty() && self.lock_time > time
    }

    /// Move `amount` out of `self`, drawing from every bucket in proportion
    /// to its share of the total.
    ///
    /// Floors each bucket's share, then hands the remaining units one at a
    /// time to the lowest buckets that still have value, so the result is
    /// exact and deterministic. `amount` is clamped to `[0, total]`.
    pub fn take_ratio_part(&mut self, amount: Amount) -> Fractions {
        let total = self.total();
        let mut out = Fractions::new();
        if amount <= 0 || total <= 0 {
            return out;
        }
        if amount >= total {
            std::mem::swap(&mut out.buckets, &mut self.buckets);
            return out;
        }

        let mut moved: Amount = 0;
        for (dst, src) in out.buckets.iter_mut().zip(&self.buckets) {
            let part = (i128::from(*src) * i128::from(amount) / i128::from(total)) as Amount;
            *dst = part;
            moved += part;
        }
        let mut rest = amount - moved;
        for (dst, src) in out.buckets.iter_mut().zip(&self.buckets) {
            if rest == 0 {
                break;
            }
            if *src - *dst > 0 {
                *dst += 1;
                rest -= 1;
            }
        }
        for (src, dst) in self.buckets.iter_mut().zip(&out.buckets) {
            *src -= *dst;
        }
        out
    }
}

impl fmt::Debug for Fractions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fractions")
            .field("total", &self.total())
            .field("flags", &self.flags)
            .field("lock_time", &self.lock_time)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
enum PackedBuckets {
    Std(Amount),
    Sparse(Vec<(u16, Amount)>),
}

#[derive(Serialize, Deserialize)]
struct PackedFractions {
    flags: u32,
    lock_time: u32,
    buckets: PackedBuckets,
}

impl From<Fractions> for PackedFractions {
    fn from(fractions: Fractions) -> Self {
        let total = fractions.total();
        let buckets = if fractions.buckets == Fractions::std(total).buckets {
            PackedBuckets::Std(total)
        } else {
            PackedBuckets::Sparse(
                fractions
                    .buckets
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v != 0)
                    .map(|(i, v)| (i as u16, *v))
                    .collect(),
            )
        };
        Self {
            flags: fractions.flags.bits(),
            lock_time: fractions.lock_time,
            buckets,
        }
    }
}

impl TryFrom<PackedFractions> for Fractions {
    type Error = String;

    fn try_from(packed: PackedFractions) -> Result<Self, Self::Error> {
        let mut out = match packed.buckets {
            PackedBuckets::Std(total) => Fractions::std(total),
            PackedBuckets::Sparse(entries) => {
                let mut out = Fractions::new();
                for (index, value) in entries {
                    let slot = out
                        .buckets
                        .get_mut(index as usize)
                        .ok_or_else(|| format!("bucket {index} out of range"))?;
                    *slot = value;
                }
                out
            }
        };
        out.flags = FractionFlags::from_bits_truncate(packed.flags);
        out.lock_time = packed.lock_time;
        Ok(out)
    }
}
