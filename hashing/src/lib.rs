//! SHA-256 midstate capture (the hash-link used to commit a share inside a
//! coinbase transaction) and the per-network proof-of-work hash functions.

mod error;
mod hash_link;
mod pow;

pub use error::HashingError;
pub use hash_link::{checked_from_prefix, HashLink};
pub use pow::{scrypt_1024_1_1, sha256d, verthash, VerthashData, VERTHASH_DATA_FINGERPRINT};
