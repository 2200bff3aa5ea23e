use thiserror::Error;

/// Failure to decode a value from its wire representation.
///
/// Every variant names the field that failed so that callers can log a
/// useful diagnostic without re-parsing the message themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of buffer while decoding `{field}`")]
    UnexpectedEof { field: &'static str },

    #[error("`{field}` used a non-canonical varint encoding")]
    NonCanonicalVarInt { field: &'static str },

    #[error("`{field}` = {value} is not a member of the enum")]
    InvalidEnumValue { field: &'static str, value: u64 },

    #[error("`{field}` has length {len}, which is outside the allowed range {min}..={max}")]
    LengthOutOfRange {
        field: &'static str,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("`{field}` left {remaining} trailing byte(s) unconsumed")]
    TrailingBytes { field: &'static str, remaining: usize },

    #[error("`{field}` is structurally invalid: {reason}")]
    InvalidStructure { field: &'static str, reason: String },
}
