use digest::{generic_array::GenericArray, Digest};
use p2pool_encoding::{ConsensusDecoding, ConsensusEncoding, Cursor, VarBytes, VarInt, U256};
use sha2::{compress256, Sha256};

use crate::error::HashingError;

const SHA256_IV: [u32; 8] = [
    0x6a09_e667,
    0xbb67_ae85,
    0x3c6e_f372,
    0xa54f_f53a,
    0x510e_527f,
    0x9b05_688c,
    0x1f83_d9ab,
    0x5be0_cd19,
];

/// The intermediate SHA-256 state captured after consuming a known prefix,
/// allowing the rest of that SHA-256 computation to be resumed later without
/// retransmitting the prefix. Used to commit a share to a coinbase
/// transaction whose trailing bytes (the donation output, the nonce, the ref
/// hash) are only known to the pool, not to whoever built the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashLink {
    pub state: [u32; 8],
    pub extra_data: Vec<u8>,
    /// Total bytes of the original prefix consumed to produce `state` and
    /// `extra_data`, including whatever is still buffered in `extra_data`.
    pub length: u64,
}

impl HashLink {
    /// Capture the SHA-256 midstate after hashing `prefix`, trimming the
    /// known constant `const_ending` suffix out of the buffered remainder
    /// (it is re-supplied by the caller on [`HashLink::resume`]).
    pub fn from_prefix(prefix: &[u8], const_ending: &[u8]) -> Self {
        assert!(
            prefix.ends_with(const_ending),
            "prefix must end with the committed constant suffix"
        );
        let full_block_bytes = (prefix.len() / 64) * 64;
        let (complete, tail) = prefix.split_at(full_block_bytes);

        let mut state = SHA256_IV;
        compress_blocks(&mut state, complete);

        let trim = tail.len().saturating_sub(const_ending.len());
        let extra_data = tail[..trim].to_vec();

        HashLink {
            state,
            extra_data,
            length: prefix.len() as u64,
        }
    }

    /// Finish the SHA-256 pass started by [`HashLink::from_prefix`] over
    /// `data` (re-supplying `const_ending`), then hash the resulting digest
    /// again (p2pool, like Bitcoin, commits via double-SHA-256) and return
    /// it as a little-endian integer, matching the wire convention used for
    /// every other hash in a share.
    pub fn resume(&self, data: &[u8], const_ending: &[u8]) -> U256 {
        let extra_length = (self.length % 64) as usize;
        let mut combined = self.extra_data.clone();
        combined.extend_from_slice(const_ending);
        let start = combined.len().saturating_sub(extra_length);
        let mut stream = combined[start..].to_vec();
        stream.extend_from_slice(data);

        let bits_already_compressed = (self.length - extra_length as u64) * 8;
        let total_bits = bits_already_compressed + (stream.len() as u64) * 8;

        let mut state = self.state;
        let digest1 = finish_sha256(&mut state, &stream, total_bits);
        let digest2 = Sha256::digest(digest1);
        U256::from_little_endian(&digest2)
    }
}

fn compress_blocks(state: &mut [u32; 8], data: &[u8]) {
    debug_assert_eq!(data.len() % 64, 0);
    for chunk in data.chunks(64) {
        let block = GenericArray::clone_from_slice(chunk);
        compress256(state, std::slice::from_ref(&block));
    }
}

/// Pad `tail` per the SHA-256 message schedule (a `0x80` byte, zeroes, an
/// 8-byte big-endian bit count) and run the remaining compressions,
/// returning the finalized big-endian digest.
fn finish_sha256(state: &mut [u32; 8], tail: &[u8], total_bits: u64) -> [u8; 32] {
    let mut padded = tail.to_vec();
    padded.push(0x80);
    while padded.len() % 64 != 56 {
        padded.push(0);
    }
    padded.extend_from_slice(&total_bits.to_be_bytes());
    compress_blocks(state, &padded);

    let mut out = [0u8; 32];
    for (i, word) in state.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// The wire form of a [`HashLink`]: a fixed 32-byte state, a variable-length
/// buffered tail, and a varint byte count.
impl ConsensusEncoding for HashLink {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        let mut state_bytes = [0u8; 32];
        for (i, word) in self.state.iter().enumerate() {
            state_bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        state_bytes.consensus_encode(buf);
        VarBytes(self.extra_data.clone()).consensus_encode(buf);
        VarInt::from(self.length).consensus_encode(buf);
    }
}

impl ConsensusDecoding for HashLink {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, p2pool_encoding::CodecError> {
        let state_bytes = <[u8; 32]>::consensus_decode(buf)?;
        let mut state = [0u32; 8];
        for (i, word) in state.iter_mut().enumerate() {
            *word = u32::from_be_bytes(state_bytes[i * 4..i * 4 + 4].try_into().expect("4 bytes"));
        }
        let extra_data = VarBytes::consensus_decode(buf)?.0;
        let length = VarInt::consensus_decode(buf)?.0;
        Ok(HashLink {
            state,
            extra_data,
            length,
        })
    }
}

/// A decode-time assertion helper mirroring [`HashLink::from_prefix`]'s
/// precondition; kept separate so callers building a link from attacker
/// data (a peer's share) get a typed error instead of a panic.
pub fn checked_from_prefix(prefix: &[u8], const_ending: &[u8]) -> Result<HashLink, HashingError> {
    if !prefix.ends_with(const_ending) {
        return Err(HashingError::PrefixMissingConstEnding);
    }
    Ok(HashLink::from_prefix(prefix, const_ending))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_matches_direct_double_sha256() {
        let prefix = b"the quick brown fox jumps over the lazy dog, many times over ";
        let const_ending = b"over ";
        let tail = b"and some more data after the split point";

        let link = HashLink::from_prefix(prefix, const_ending);
        let via_link = link.resume(tail, const_ending);

        let mut direct = prefix[..prefix.len() - const_ending.len()].to_vec();
        direct.extend_from_slice(const_ending);
        direct.extend_from_slice(tail);
        let first = Sha256::digest(&direct);
        let second = Sha256::digest(first);
        let expected = U256::from_little_endian(&second);

        assert_eq!(via_link, expected);
    }

    #[test]
    fn works_across_many_block_boundaries() {
        for prefix_len in [0usize, 1, 63, 64, 65, 127, 128, 200] {
            let const_ending = b"END!";
            let mut prefix = vec![0xABu8; prefix_len];
            prefix.extend_from_slice(const_ending);
            let tail = vec![0xCDu8; 37];

            let link = HashLink::from_prefix(&prefix, const_ending);
            let via_link = link.resume(&tail, const_ending);

            let mut direct = prefix.clone();
            direct.extend_from_slice(&tail);
            let expected = U256::from_little_endian(&Sha256::digest(Sha256::digest(&direct)));
            assert_eq!(via_link, expected, "prefix_len = {}", prefix_len);
        }
    }

    #[test]
    fn wire_round_trip() {
        let link = HashLink::from_prefix(b"hello world, this is a prefix", b"prefix");
        let encoded = link.consensus_encode_to_vec();
        let mut cursor: Cursor<'_> = &encoded;
        let decoded = HashLink::consensus_decode(&mut cursor).unwrap();
        assert_eq!(decoded, link);
    }
}
