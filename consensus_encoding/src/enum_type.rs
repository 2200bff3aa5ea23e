use crate::error::CodecError;

/// A closed mapping from a wire integer to a labeled Rust value. Types that
/// implement this can use [`decode_strict`] to reject any wire value outside
/// the mapping, as opposed to widening it the way [`Sentinel`](crate::Sentinel)-style
/// wrappers do.
pub trait WireEnum: Sized + Copy {
    const FIELD: &'static str;

    fn from_wire(value: u8) -> Option<Self>;
    fn to_wire(self) -> u8;
}

pub fn decode_strict<E: WireEnum>(value: u8) -> Result<E, CodecError> {
    E::from_wire(value).ok_or(CodecError::InvalidEnumValue {
        field: E::FIELD,
        value: value as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Color {
        Red,
        Green,
        Blue,
    }

    impl WireEnum for Color {
        const FIELD: &'static str = "color";

        fn from_wire(value: u8) -> Option<Self> {
            match value {
                0 => Some(Color::Red),
                1 => Some(Color::Green),
                2 => Some(Color::Blue),
                _ => None,
            }
        }

        fn to_wire(self) -> u8 {
            self as u8
        }
    }

    #[test]
    fn strict_decode_rejects_values_outside_the_map() {
        assert_eq!(decode_strict::<Color>(1), Ok(Color::Green));
        assert_eq!(
            decode_strict::<Color>(9),
            Err(CodecError::InvalidEnumValue {
                field: "color",
                value: 9
            })
        );
    }
}
