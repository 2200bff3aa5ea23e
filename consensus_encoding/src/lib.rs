//! Binary codec for the p2pool share-chain wire format.
//!
//! Every wire type implements [`ConsensusEncoding`] (total) and
//! [`ConsensusDecoding`] (partial, failing with a field-tagged
//! [`CodecError`]). Composite records are ordered tuples of named fields
//! whose wire form is the concatenation of the fields' wire forms, in
//! declaration order.

mod enum_type;
mod error;
mod floating_integer;
mod possibly_none;
mod primitives;
mod traits;
mod varint;

pub use enum_type::{decode_strict, WireEnum};
pub use error::CodecError;
pub use floating_integer::FloatingInteger;
pub use possibly_none::{PossiblyNone, Sentinel};
pub use primitives::{VarBytes, VarList, U160};
pub use traits::{decode_exact, ConsensusDecoding, ConsensusEncoding, Cursor};
pub use varint::VarInt;

pub use primitive_types::U256;
