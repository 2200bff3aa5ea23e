use crate::{
    error::CodecError,
    traits::{take, ConsensusDecoding, ConsensusEncoding, Cursor},
};

/// A CompactSize-style variable-length unsigned integer.
///
/// Encoding (little-endian throughout):
/// - `< 0xfd`            -> the value itself, 1 byte
/// - `<= 0xffff`         -> `0xfd` followed by a `u16`, 3 bytes
/// - `<= 0xffff_ffff`    -> `0xfe` followed by a `u32`, 5 bytes
/// - otherwise           -> `0xff` followed by a `u64`, 9 bytes
///
/// Decoding rejects any encoding that is not the shortest possible one for
/// the decoded value (`NonCanonicalVarInt`) — otherwise two distinct byte
/// strings would decode to the same `VarInt`, breaking the codec round-trip
/// property shares and peers rely on for hash commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(pub u64);

const FIELD: &str = "varint";

impl From<u64> for VarInt {
    fn from(v: u64) -> Self {
        VarInt(v)
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> Self {
        v.0
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

impl ConsensusEncoding for VarInt {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        match self.0 {
            v if v < 0xfd => buf.push(v as u8),
            v if v <= 0xffff => {
                buf.push(0xfd);
                buf.extend_from_slice(&(v as u16).to_le_bytes());
            },
            v if v <= 0xffff_ffff => {
                buf.push(0xfe);
                buf.extend_from_slice(&(v as u32).to_le_bytes());
            },
            v => {
                buf.push(0xff);
                buf.extend_from_slice(&v.to_le_bytes());
            },
        }
    }
}

impl ConsensusDecoding for VarInt {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let prefix = take(buf, FIELD, 1)?[0];
        let value = match prefix {
            0xff => {
                let bytes = take(buf, FIELD, 8)?;
                let v = u64::from_le_bytes(bytes.try_into().expect("8 bytes"));
                if v <= 0xffff_ffff {
                    return Err(CodecError::NonCanonicalVarInt { field: FIELD });
                }
                v
            },
            0xfe => {
                let bytes = take(buf, FIELD, 4)?;
                let v = u32::from_le_bytes(bytes.try_into().expect("4 bytes")) as u64;
                if v <= 0xffff {
                    return Err(CodecError::NonCanonicalVarInt { field: FIELD });
                }
                v
            },
            0xfd => {
                let bytes = take(buf, FIELD, 2)?;
                let v = u16::from_le_bytes(bytes.try_into().expect("2 bytes")) as u64;
                if v < 0xfd {
                    return Err(CodecError::NonCanonicalVarInt { field: FIELD });
                }
                v
            },
            v => v as u64,
        };
        Ok(VarInt(value))
    }
}
