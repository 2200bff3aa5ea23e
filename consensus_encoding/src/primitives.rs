use primitive_types::U256;

use crate::{
    error::CodecError,
    possibly_none::Sentinel,
    traits::{take, ConsensusDecoding, ConsensusEncoding, Cursor},
    varint::VarInt,
};

macro_rules! impl_le_int {
    ($ty:ty, $field:literal) => {
        impl ConsensusEncoding for $ty {
            fn consensus_encode(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }
        }

        impl ConsensusDecoding for $ty {
            fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
                let bytes = take(buf, $field, std::mem::size_of::<$ty>())?;
                Ok(<$ty>::from_le_bytes(bytes.try_into().expect("exact width")))
            }
        }
    };
}

impl_le_int!(u8, "u8");
impl_le_int!(u16, "u16");
impl_le_int!(u32, "u32");
impl_le_int!(u64, "u64");
impl_le_int!(u128, "u128");

impl ConsensusEncoding for bool {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

impl ConsensusDecoding for bool {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(take(buf, "bool", 1)?[0] != 0)
    }
}

/// A 256-bit hash or difficulty value, encoded little-endian (matching the
/// upstream `pack.IntType(256)` convention used for share/block hashes).
impl ConsensusEncoding for U256 {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        let mut bytes = [0u8; 32];
        self.to_little_endian(&mut bytes);
        buf.extend_from_slice(&bytes);
    }
}

impl ConsensusDecoding for U256 {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let bytes = take(buf, "u256", 32)?;
        Ok(U256::from_little_endian(bytes))
    }
}

impl Sentinel for U256 {
    fn sentinel() -> Self {
        U256::zero()
    }
}

/// A 160-bit value (the pre-v34 pubkey-hash payee field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct U160(pub [u8; 20]);

impl ConsensusEncoding for U160 {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl ConsensusDecoding for U160 {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let bytes = take(buf, "u160", 20)?;
        Ok(U160(bytes.try_into().expect("exact width")))
    }
}

impl<const N: usize> ConsensusEncoding for [u8; N] {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl<const N: usize> ConsensusDecoding for [u8; N] {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let bytes = take(buf, "fixed_bytes", N)?;
        Ok(bytes.try_into().expect("exact width"))
    }
}

/// A length-prefixed byte string: a [`VarInt`] length followed by that many
/// raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarBytes(pub Vec<u8>);

impl ConsensusEncoding for VarBytes {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        VarInt::from(self.0.len()).consensus_encode(buf);
        buf.extend_from_slice(&self.0);
    }
}

impl ConsensusDecoding for VarBytes {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let len = VarInt::consensus_decode(buf)?.0 as usize;
        let bytes = take(buf, "var_bytes", len)?;
        Ok(VarBytes(bytes.to_vec()))
    }
}

impl VarBytes {
    /// Decode, then assert the byte count falls within `min..=max`. Used for
    /// fields with a hard size invariant, e.g. a share's 2..=100 byte
    /// coinbase.
    pub fn decode_bounded(
        buf: &mut Cursor<'_>,
        field: &'static str,
        min: usize,
        max: usize,
    ) -> Result<Self, CodecError> {
        let value = Self::consensus_decode(buf)?;
        if value.0.len() < min || value.0.len() > max {
            return Err(CodecError::LengthOutOfRange {
                field,
                len: value.0.len(),
                min,
                max,
            });
        }
        Ok(value)
    }
}

/// A length-prefixed homogeneous list: a [`VarInt`] count followed by that
/// many wire-encoded elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarList<T>(pub Vec<T>);

impl<T: ConsensusEncoding> ConsensusEncoding for VarList<T> {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        VarInt::from(self.0.len()).consensus_encode(buf);
        for item in &self.0 {
            item.consensus_encode(buf);
        }
    }
}

impl<T: ConsensusDecoding> ConsensusDecoding for VarList<T> {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let len = VarInt::consensus_decode(buf)?.0 as usize;
        let mut items = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            items.push(T::consensus_decode(buf)?);
        }
        Ok(VarList(items))
    }
}

impl<T> From<Vec<T>> for VarList<T> {
    fn from(v: Vec<T>) -> Self {
        VarList(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u256_round_trip_is_little_endian() {
        let value = U256::from(0x0102u64);
        let encoded = value.consensus_encode_to_vec();
        assert_eq!(encoded[0], 0x02);
        assert_eq!(encoded[1], 0x01);
        let mut cursor: Cursor<'_> = &encoded;
        assert_eq!(U256::consensus_decode(&mut cursor).unwrap(), value);
    }

    #[test]
    fn var_bytes_bounds_reject_oversized_coinbase() {
        let too_big = VarBytes(vec![0u8; 101]).consensus_encode_to_vec();
        let mut cursor: Cursor<'_> = &too_big;
        let err = VarBytes::decode_bounded(&mut cursor, "coinbase", 2, 100).unwrap_err();
        assert!(matches!(err, CodecError::LengthOutOfRange { len: 101, .. }));
    }

    #[test]
    fn var_list_round_trips() {
        let list: VarList<u32> = vec![1u32, 2, 3, 4].into();
        let encoded = list.consensus_encode_to_vec();
        let mut cursor: Cursor<'_> = &encoded;
        let decoded = VarList::<u32>::consensus_decode(&mut cursor).unwrap();
        assert_eq!(decoded.0, list.0);
    }

    proptest::proptest! {
        #[test]
        fn any_byte_string_round_trips_through_var_bytes(bytes: Vec<u8>) {
            let encoded = VarBytes(bytes.clone()).consensus_encode_to_vec();
            let mut cursor: Cursor<'_> = &encoded;
            let decoded = VarBytes::consensus_decode(&mut cursor).unwrap();
            assert_eq!(decoded.0, bytes);
            assert!(cursor.is_empty());
        }

        #[test]
        fn any_u32_list_round_trips_through_var_list(values: Vec<u32>) {
            let list: VarList<u32> = values.clone().into();
            let encoded = list.consensus_encode_to_vec();
            let mut cursor: Cursor<'_> = &encoded;
            let decoded = VarList::<u32>::consensus_decode(&mut cursor).unwrap();
            assert_eq!(decoded.0, values);
        }
    }
}
