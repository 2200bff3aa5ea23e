use primitive_types::U256;

use crate::{
    error::CodecError,
    traits::{ConsensusDecoding, ConsensusEncoding, Cursor},
};

/// A 32-bit mantissa+exponent compact difficulty target, encoded and decoded
/// exactly as Bitcoin's `nBits` ("compact" target representation): the low
/// 3 bytes are the mantissa, the high byte is the base-256 exponent, and bit
/// 23 of the mantissa is a sign flag (always `0` for a valid target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatingInteger(pub u32);

const FIELD: &str = "floating_integer";

impl FloatingInteger {
    /// The share-chain / block target this compact value represents.
    ///
    /// Mirrors Bitcoin Core's `arith_uint256::SetCompact`: `target =
    /// mantissa * 256^(exponent - 3)` for `exponent >= 3`, or a right-shift
    /// of the mantissa for `exponent < 3`. A negative-flagged or
    /// overflowing value decodes to zero, matching upstream's permissive
    /// (non-consensus-critical at this layer) compact-target handling;
    /// callers still enforce `target <= MAX_TARGET` themselves.
    pub fn target(&self) -> U256 {
        let exponent = (self.0 >> 24) as u32;
        let mut mantissa = U256::from(self.0 & 0x007f_ffff);
        if self.0 & 0x0080_0000 != 0 {
            return U256::zero();
        }
        if exponent <= 3 {
            mantissa >>= 8 * (3 - exponent);
        } else {
            mantissa <<= 8 * (exponent - 3);
        }
        mantissa
    }

    /// Build the compact representation of `target`, rounding toward the
    /// nearest representable value the way `arith_uint256::GetCompact` does.
    pub fn from_target(target: U256) -> Self {
        let mut size = (target.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            (target.low_u64() << (8 * (3 - size))) as u32
        } else {
            let shifted = target >> (8 * (size - 3));
            shifted.low_u32()
        };
        // The 0x00800000 bit is a sign flag; if the mantissa would set it,
        // shift right one byte and bump the exponent to compensate.
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        FloatingInteger(compact | ((size as u32) << 24))
    }

    /// Expected hash evaluations to find a PoW solution below `target`:
    /// `2^256 / (target + 1)`.
    pub fn attempts(target: U256) -> U256 {
        let max = U256::MAX;
        if target.is_zero() {
            return max;
        }
        max / (target + U256::one())
    }
}

impl ConsensusEncoding for FloatingInteger {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        self.0.consensus_encode(buf);
    }
}

impl ConsensusDecoding for FloatingInteger {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(FloatingInteger(u32::consensus_decode(buf).map_err(|_| CodecError::UnexpectedEof { field: FIELD })?))
    }
}
