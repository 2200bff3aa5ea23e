use crate::error::CodecError;

/// A cursor over an immutable byte slice, advanced as fields are decoded.
///
/// This is deliberately minimal (no `bytes::Buf` dependency) because every
/// decoder in this crate only ever needs "take N bytes off the front".
pub type Cursor<'a> = &'a [u8];

pub(crate) fn take<'a>(buf: &mut Cursor<'a>, field: &'static str, n: usize) -> Result<&'a [u8], CodecError> {
    if buf.len() < n {
        return Err(CodecError::UnexpectedEof { field });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

/// Total encoder: every value of a schema type has exactly one wire form.
pub trait ConsensusEncoding {
    fn consensus_encode(&self, buf: &mut Vec<u8>);

    fn consensus_encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.consensus_encode(&mut buf);
        buf
    }
}

/// Partial decoder: malformed input fails with a field-tagged [`CodecError`].
pub trait ConsensusDecoding: Sized {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError>;
}

/// Decode a value and assert the buffer is fully consumed. Top-level share
/// records use this; nested fields use [`ConsensusDecoding::consensus_decode`]
/// directly since they share the remainder of the outer buffer.
pub fn decode_exact<T: ConsensusDecoding>(field: &'static str, mut buf: Cursor<'_>) -> Result<T, CodecError> {
    let value = T::consensus_decode(&mut buf)?;
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes {
            field,
            remaining: buf.len(),
        });
    }
    Ok(value)
}
