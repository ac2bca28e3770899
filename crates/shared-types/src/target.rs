//! Compact target encoding (`bits`).
//!
//! `bits` packs a 256-bit target as a one-byte size and a 23-bit mantissa
//! with a sign bit. Negative and overflowing encodings are invalid.

use crate::entities::Hash;
use primitive_types::U256;

/// Decode `bits` into a target, `None` if negative or overflowing.
pub fn decode_compact(bits: u32) -> Option<U256> {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;

    let negative = word != 0 && bits & 0x0080_0000 != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    if negative || overflow {
        return None;
    }

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        U256::from(word) << (8 * (size - 3) as usize)
    };
    Some(target)
}

pub fn encode_compact(target: U256) -> u32 {
    let mut size = (target.bits() as u32 + 7) / 8;
    let mut compact: u32 = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u64() as u32
    };
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Interpret a hash as a little-endian 256-bit number.
pub fn hash_to_u256(hash: &Hash) -> U256 {
    U256::from_little_endian(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_compact_values() {
        let target = decode_compact(0x1d00_ffff).unwrap();
        assert_eq!(target, U256::from(0xffffu64) << 208);
        assert_eq!(encode_compact(target), 0x1d00_ffff);
    }

    #[test]
    fn test_half_range_limit() {
        let limit = U256::MAX >> 1;
        let bits = encode_compact(limit);
        assert_eq!(bits, 0x207f_ffff);
        // Compact form truncates the mantissa.
        assert!(decode_compact(bits).unwrap() <= limit);
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(decode_compact(0x0480_0001), None);
    }

    #[test]
    fn test_overflow_rejected() {
        assert_eq!(decode_compact(0xff12_3456), None);
    }

    #[test]
    fn test_small_size() {
        assert_eq!(decode_compact(0x0112_0000), Some(U256::from(0x12)));
        assert_eq!(encode_compact(U256::from(0x12)), 0x0112_0000);
    }
}
