use crate::{
    error::CodecError,
    traits::{ConsensusDecoding, ConsensusEncoding, Cursor},
};

/// A type whose wire form has a designated "absent" value, so that
/// `Option<Self>` can be encoded without a separate presence flag.
pub trait Sentinel: ConsensusEncoding + ConsensusDecoding + PartialEq + Clone {
    fn sentinel() -> Self;
}

/// Wraps `Option<T>` so that `None` encodes as `T::sentinel()` and any other
/// decoded value is `Some(..)`. Used for `previous_block`, `far_share_hash`
/// and `previous_share_hash`, all of which use `0` as "no such hash".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PossiblyNone<T>(pub Option<T>);

impl<T> From<Option<T>> for PossiblyNone<T> {
    fn from(v: Option<T>) -> Self {
        PossiblyNone(v)
    }
}

impl<T> From<PossiblyNone<T>> for Option<T> {
    fn from(v: PossiblyNone<T>) -> Self {
        v.0
    }
}

impl<T: Sentinel> ConsensusEncoding for PossiblyNone<T> {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        match &self.0 {
            Some(value) => value.consensus_encode(buf),
            None => T::sentinel().consensus_encode(buf),
        }
    }
}

impl<T: Sentinel> ConsensusDecoding for PossiblyNone<T> {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let value = T::consensus_decode(buf)?;
        if value == T::sentinel() {
            Ok(PossiblyNone(None))
        } else {
            Ok(PossiblyNone(Some(value)))
        }
    }
}
