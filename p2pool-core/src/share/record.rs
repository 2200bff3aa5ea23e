//! The `Share` tagged union (§4.4): a compile-time enum over the five known
//! wire versions instead of the upstream's runtime-built `(cls, net)` schema
//! cache (§9 REDESIGN FLAG "Dynamic per-version record shapes").

use p2pool_encoding::{CodecError, ConsensusDecoding, ConsensusEncoding, Cursor, U256};
use p2pool_hashing::sha256d;

use super::types::{MinHeader, ShareInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShareVersion {
    V17 = 17,
    V32 = 32,
    V33 = 33,
    V34 = 34,
    V35 = 35,
}

impl ShareVersion {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            17 => Some(ShareVersion::V17),
            32 => Some(ShareVersion::V32),
            33 => Some(ShareVersion::V33),
            34 => Some(ShareVersion::V34),
            35 => Some(ShareVersion::V35),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// The fixed upgrade graph: every pre-V35 version's only successor is
    /// V35 (§4.4, confirmed against `data.py`'s `SUCCESSOR` class attributes
    /// — this is a star, not a linear chain: V35 itself has no successor).
    pub fn successor(self) -> Option<ShareVersion> {
        match self {
            ShareVersion::V35 => None,
            _ => Some(ShareVersion::V35),
        }
    }

    /// Whether this version carries `payee` as a string address (`>= 34`)
    /// rather than a 160-bit pubkey hash.
    pub fn payee_is_address(self) -> bool {
        self.as_u32() >= 34
    }

    /// Whether this version carries `segwit_data` at all.
    pub fn has_segwit_data(self) -> bool {
        self.as_u32() >= 34
    }

    /// Whether this version still carries `new_tx_hashes`/`tx_hash_refs`
    /// (dropped at v34, §3: "block transactions are no longer carried by
    /// reference through the share chain").
    pub fn has_tx_refs(self) -> bool {
        self.as_u32() < 34
    }

    /// Per-version protocol-version floor reported to peers, independent of
    /// the think loop's measured floor (§4.4 supplement,
    /// `BaseShare.MINIMUM_PROTOCOL_VERSION`). V17 and V32 never override the
    /// base class's 3500; only V33 and V34 lower it to 3300.
    pub fn minimum_protocol_version(self) -> u32 {
        match self {
            ShareVersion::V17 => 3500,
            ShareVersion::V32 => 3500,
            ShareVersion::V33 => 3300,
            ShareVersion::V34 => 3300,
            ShareVersion::V35 => 3500,
        }
    }
}

/// A versioned share record. Each variant owns the same [`ShareInfo`]/
/// [`MinHeader`] pair; the version tag alone decides which optional fields
/// of `ShareInfo` are present on the wire (`ShareVersion::payee_is_address`,
/// `has_segwit_data`, `has_tx_refs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Share {
    V17(ShareBody),
    V32(ShareBody),
    V33(ShareBody),
    V34(ShareBody),
    V35(ShareBody),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareBody {
    pub min_header: MinHeader,
    pub share_info: ShareInfo,
    pub ref_merkle_link: super::types::RefMerkleLink,
    pub last_txout_nonce: u64,
    pub hash_link: p2pool_hashing::HashLink,
    pub merkle_link: super::types::MerkleLink,
}

impl Share {
    pub fn version(&self) -> ShareVersion {
        match self {
            Share::V17(_) => ShareVersion::V17,
            Share::V32(_) => ShareVersion::V32,
            Share::V33(_) => ShareVersion::V33,
            Share::V34(_) => ShareVersion::V34,
            Share::V35(_) => ShareVersion::V35,
        }
    }

    pub fn body(&self) -> &ShareBody {
        match self {
            Share::V17(b) | Share::V32(b) | Share::V33(b) | Share::V34(b) | Share::V35(b) => b,
        }
    }

    pub fn min_header(&self) -> &MinHeader {
        &self.body().min_header
    }

    pub fn share_info(&self) -> &ShareInfo {
        &self.body().share_info
    }

    pub fn previous_share_hash(&self) -> Option<U256> {
        self.share_info().share_data.previous_share_hash
    }

    pub fn successor(&self) -> Option<ShareVersion> {
        self.version().successor()
    }

    fn from_version(version: ShareVersion, body: ShareBody) -> Self {
        match version {
            ShareVersion::V17 => Share::V17(body),
            ShareVersion::V32 => Share::V32(body),
            ShareVersion::V33 => Share::V33(body),
            ShareVersion::V34 => Share::V34(body),
            ShareVersion::V35 => Share::V35(body),
        }
    }

    /// The share's wire hash: double-SHA-256 of its full encoding, matching
    /// every other hash commitment in this codebase (`bitcoin_data.hash256`'s
    /// convention, §4.3).
    pub fn hash(&self) -> U256 {
        sha256d(&self.consensus_encode_to_vec())
    }
}

impl ConsensusEncoding for Share {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        self.version().as_u32().consensus_encode(buf);
        let body = self.body();
        body.min_header.consensus_encode(buf);
        body.share_info.encode(buf);
        body.ref_merkle_link.consensus_encode(buf);
        body.last_txout_nonce.consensus_encode(buf);
        body.hash_link.consensus_encode(buf);
        body.merkle_link.consensus_encode(buf);
    }
}

impl ConsensusDecoding for Share {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let raw_version = u32::consensus_decode(buf)?;
        let version = ShareVersion::from_u32(raw_version).ok_or(CodecError::InvalidEnumValue {
            field: "share.version",
            value: raw_version as u64,
        })?;
        let min_header = MinHeader::consensus_decode(buf)?;
        let share_info = ShareInfo::decode(
            buf,
            version.payee_is_address(),
            version.has_segwit_data(),
            version.has_tx_refs(),
        )?;
        let ref_merkle_link = super::types::RefMerkleLink::consensus_decode(buf)?;
        let last_txout_nonce = u64::consensus_decode(buf)?;
        let hash_link = p2pool_hashing::HashLink::consensus_decode(buf)?;
        let merkle_link = super::types::MerkleLink::consensus_decode(buf)?;
        Ok(Share::from_version(
            version,
            ShareBody {
                min_header,
                share_info,
                ref_merkle_link,
                last_txout_nonce,
                hash_link,
                merkle_link,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_graph_is_a_star_into_v35() {
        assert_eq!(ShareVersion::V17.successor(), Some(ShareVersion::V35));
        assert_eq!(ShareVersion::V32.successor(), Some(ShareVersion::V35));
        assert_eq!(ShareVersion::V33.successor(), Some(ShareVersion::V35));
        assert_eq!(ShareVersion::V34.successor(), Some(ShareVersion::V35));
        assert_eq!(ShareVersion::V35.successor(), None);
    }

    #[test]
    fn schema_switches_happen_exactly_at_v34() {
        assert!(!ShareVersion::V33.payee_is_address());
        assert!(ShareVersion::V34.payee_is_address());
        assert!(ShareVersion::V33.has_tx_refs());
        assert!(!ShareVersion::V34.has_tx_refs());
    }
}
