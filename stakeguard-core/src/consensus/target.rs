//! Compact target encoding
//!
//! `bits` values use the Bitcoin compact format: one exponent byte (size in
//! bytes) followed by a 23-bit mantissa and a sign bit. Negative and
//! overflowing encodings decode to a zero target, which no kernel can meet
//! except the all-zero hash.

use primitive_types::{U256, U512};

const MANTISSA_MASK: u32 = 0x007f_ffff;
const SIGN_BIT: u32 = 0x0080_0000;

/// Result of decoding a compact value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTarget {
    pub target: U256,
    pub negative: bool,
    pub overflow: bool,
}

/// Decode a compact value, reporting sign and overflow
pub fn decode_compact(bits: u32) -> DecodedTarget {
    let size = bits >> 24;
    let mut word = bits & MANTISSA_MASK;

    let negative = word != 0 && (bits & SIGN_BIT) != 0;
    let overflow =
        word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

    let target = if overflow {
        U256::zero()
    } else if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        U256::from(word) << (8 * (size - 3) as usize)
    };

    DecodedTarget {
        target,
        negative,
        overflow,
    }
}

/// Target a `bits` value stands for; invalid encodings give zero
pub fn target_from_compact(bits: u32) -> U256 {
    let decoded = decode_compact(bits);
    if decoded.negative || decoded.overflow {
        U256::zero()
    } else {
        decoded.target
    }
}

/// Encode a target in compact form (lossy below the top three bytes)
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = (target.bits() as u32 + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u32()
    };

    // Keep the sign bit clear by moving a byte into the exponent
    if compact & SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Per-unit target scaled by a stake weight, without overflow
pub fn weighted_target(bits: u32, weight: u64) -> U512 {
    U512::from(target_from_compact(bits)) * U512::from(weight)
}
