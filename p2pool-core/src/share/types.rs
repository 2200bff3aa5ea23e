//! The wire types shared by every share version (§3 "Share (C4)").

use p2pool_encoding::{
    CodecError, ConsensusDecoding, ConsensusEncoding, Cursor, FloatingInteger, VarBytes, VarInt, VarList, U160, U256,
};

/// `stale_info`: three named upstream values, everything else widened to
/// `Unknown` rather than rejected (`data.py`'s `{0: None, 253: 'orphan',
/// 254: 'doa'}.get(k, 'unk%i' % k)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleInfo {
    None,
    Orphan,
    Doa,
    Unknown(u8),
}

impl StaleInfo {
    fn to_u8(self) -> u8 {
        match self {
            StaleInfo::None => 0,
            StaleInfo::Orphan => 253,
            StaleInfo::Doa => 254,
            StaleInfo::Unknown(v) => v,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => StaleInfo::None,
            253 => StaleInfo::Orphan,
            254 => StaleInfo::Doa,
            other => StaleInfo::Unknown(other),
        }
    }
}

impl ConsensusEncoding for StaleInfo {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        self.to_u8().consensus_encode(buf);
    }
}

impl ConsensusDecoding for StaleInfo {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(StaleInfo::from_u8(u8::consensus_decode(buf)?))
    }
}

/// `share_data.payee`: a 160-bit pubkey hash for version < 34, a bech32/base58
/// address string for version >= 34 (§3's dynamic-schema note). The variant
/// in play is decided by the enclosing [`crate::share::Share`] tag, not
/// self-describing on the wire, so encode/decode for `Payee` take the
/// version explicitly rather than implementing the blanket traits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payee {
    PubkeyHash(U160),
    Address(String),
}

impl Payee {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Payee::PubkeyHash(h) => h.consensus_encode(buf),
            Payee::Address(s) => VarBytes(s.clone().into_bytes()).consensus_encode(buf),
        }
    }

    pub fn decode(buf: &mut Cursor<'_>, is_address: bool) -> Result<Self, CodecError> {
        if is_address {
            let bytes = VarBytes::decode_bounded(buf, "payee.address", 1, 128)?;
            let s = String::from_utf8(bytes.0).map_err(|_| CodecError::InvalidEnumValue {
                field: "payee.address",
                value: 0,
            })?;
            Ok(Payee::Address(s))
        } else {
            Ok(Payee::PubkeyHash(U160::consensus_decode(buf)?))
        }
    }
}

/// `min_header`: the block-header-shaped prefix, merkle root omitted since
/// it's recomputed from the gentx + transaction list at check time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHeader {
    pub version: u32,
    pub prev_block: Option<U256>,
    pub timestamp: u32,
    pub bits: FloatingInteger,
    pub nonce: u32,
}

impl ConsensusEncoding for MinHeader {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        self.version.consensus_encode(buf);
        p2pool_encoding::PossiblyNone(self.prev_block).consensus_encode(buf);
        self.timestamp.consensus_encode(buf);
        self.bits.consensus_encode(buf);
        self.nonce.consensus_encode(buf);
    }
}

impl ConsensusDecoding for MinHeader {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(MinHeader {
            version: u32::consensus_decode(buf)?,
            prev_block: p2pool_encoding::PossiblyNone::consensus_decode(buf)?.0,
            timestamp: u32::consensus_decode(buf)?,
            bits: FloatingInteger::consensus_decode(buf)?,
            nonce: u32::consensus_decode(buf)?,
        })
    }
}

/// `share_data`, version-agnostic in shape except for [`Payee`] (resolved by
/// the caller, which knows the enclosing version).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareData {
    pub previous_share_hash: Option<U256>,
    pub coinbase: VarBytes,
    pub nonce: u32,
    pub payee: Payee,
    pub subsidy: u64,
    pub donation: u16,
    pub stale_info: StaleInfo,
    pub desired_version: VarInt,
}

impl ShareData {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        p2pool_encoding::PossiblyNone(self.previous_share_hash).consensus_encode(buf);
        self.coinbase.consensus_encode(buf);
        self.nonce.consensus_encode(buf);
        self.payee.encode(buf);
        self.subsidy.consensus_encode(buf);
        self.donation.consensus_encode(buf);
        self.stale_info.consensus_encode(buf);
        self.desired_version.consensus_encode(buf);
    }

    pub fn decode(buf: &mut Cursor<'_>, payee_is_address: bool) -> Result<Self, CodecError> {
        let previous_share_hash = p2pool_encoding::PossiblyNone::consensus_decode(buf)?.0;
        let coinbase = VarBytes::decode_bounded(buf, "share_data.coinbase", 2, 100)?;
        let nonce = u32::consensus_decode(buf)?;
        let payee = Payee::decode(buf, payee_is_address)?;
        let subsidy = u64::consensus_decode(buf)?;
        let donation = u16::consensus_decode(buf)?;
        let stale_info = StaleInfo::consensus_decode(buf)?;
        let desired_version = VarInt::consensus_decode(buf)?;
        Ok(ShareData {
            previous_share_hash,
            coinbase,
            nonce,
            payee,
            subsidy,
            donation,
            stale_info,
            desired_version,
        })
    }
}

/// A merkle branch plus an index that is always `0` on the wire (the gentx
/// is always the first transaction of the block it commits to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleLink {
    pub branch: Vec<U256>,
    pub index: u32,
}

impl ConsensusEncoding for MerkleLink {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        VarList(self.branch.clone()).consensus_encode(buf);
        self.index.consensus_encode(buf);
    }
}

impl ConsensusDecoding for MerkleLink {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let branch = VarList::<U256>::consensus_decode(buf)?.0;
        let index = u32::consensus_decode(buf)?;
        if index != 0 {
            return Err(CodecError::InvalidEnumValue {
                field: "merkle_link.index",
                value: index as u64,
            });
        }
        Ok(MerkleLink { branch, index })
    }
}

/// Segwit-era addition: the transaction-id merkle branch needed to recompute
/// the witness commitment independently of the (no-longer-carried) tx list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitData {
    pub txid_merkle_link: MerkleLink,
}

impl ConsensusEncoding for SegwitData {
    fn consensus_encode(&self, buf: &mut Vec<u8>) {
        self.txid_merkle_link.consensus_encode(buf);
    }
}

impl ConsensusDecoding for SegwitData {
    fn consensus_decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(SegwitData {
            txid_merkle_link: MerkleLink::consensus_decode(buf)?,
        })
    }
}

/// `share_info`: everything needed to reconstruct the header and payout set
/// except what's already fixed by `share_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub share_data: ShareData,
    pub segwit_data: Option<SegwitData>,
    /// Transactions this share introduces, referenced by later shares'
    /// `tx_hash_refs` instead of being retransmitted. `None` for version >= 34
    /// (block transactions are no longer carried by reference, §3).
    pub new_tx_hashes: Option<Vec<U256>>,
    /// `(share_count, tx_count)` pairs; `share_count < 110` always, `(0, j)`
    /// pairs point back into this share's own `new_tx_hashes`.
    pub tx_hash_refs: Option<Vec<(VarInt, VarInt)>>,
    pub far_share_hash: Option<U256>,
    pub max_bits: FloatingInteger,
    pub bits: FloatingInteger,
    pub timestamp: u32,
    pub absheight: u32,
    pub abswork: u128,
}

impl ShareInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.share_data.encode(buf);
        if let Some(segwit) = &self.segwit_data {
            segwit.consensus_encode(buf);
        }
        if let Some(hashes) = &self.new_tx_hashes {
            VarList(hashes.clone()).consensus_encode(buf);
            let refs = self.tx_hash_refs.clone().unwrap_or_default();
            VarInt(refs.len() as u64).consensus_encode(buf);
            for (a, b) in refs {
                a.consensus_encode(buf);
                b.consensus_encode(buf);
            }
        }
        p2pool_encoding::PossiblyNone(self.far_share_hash).consensus_encode(buf);
        self.max_bits.consensus_encode(buf);
        self.bits.consensus_encode(buf);
        self.timestamp.consensus_encode(buf);
        self.absheight.consensus_encode(buf);
        self.abswork.consensus_encode(buf);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn decode(
        buf: &mut Cursor<'_>,
        payee_is_address: bool,
        has_segwit_data: bool,
        has_tx_refs: bool,
    ) -> Result<Self, CodecError> {
        let share_data = ShareData::decode(buf, payee_is_address)?;
        let segwit_data = if has_segwit_data {
            Some(SegwitData::consensus_decode(buf)?)
        } else {
            None
        };
        let (new_tx_hashes, tx_hash_refs) = if has_tx_refs {
            let hashes = VarList::<U256>::consensus_decode(buf)?.0;
            let count = VarInt::consensus_decode(buf)?.0;
            let mut refs = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let a = VarInt::consensus_decode(buf)?;
                let b = VarInt::consensus_decode(buf)?;
                if a.0 >= 110 {
                    return Err(CodecError::LengthOutOfRange {
                        field: "tx_hash_refs.share_count",
                        len: a.0 as usize,
                        min: 0,
                        max: 109,
                    });
                }
                refs.push((a, b));
            }
            // §3: the set of (0, j) pairs must equal {(0,0), ..., (0, |new_tx_hashes|-1)}
            // — every hash this share newly carries must be referenced back exactly once.
            let mut own_refs: Vec<u64> = refs.iter().filter(|(a, _)| a.0 == 0).map(|(_, b)| b.0).collect();
            own_refs.sort_unstable();
            let expected: Vec<u64> = (0..hashes.len() as u64).collect();
            if own_refs != expected {
                return Err(CodecError::InvalidStructure {
                    field: "tx_hash_refs",
                    reason: "(0, j) pairs do not exactly cover new_tx_hashes".to_string(),
                });
            }
            (Some(hashes), Some(refs))
        } else {
            (None, None)
        };
        let far_share_hash = p2pool_encoding::PossiblyNone::consensus_decode(buf)?.0;
        let max_bits = FloatingInteger::consensus_decode(buf)?;
        let bits = FloatingInteger::consensus_decode(buf)?;
        let timestamp = u32::consensus_decode(buf)?;
        let absheight = u32::consensus_decode(buf)?;
        let abswork = u128::consensus_decode(buf)?;
        Ok(ShareInfo {
            share_data,
            segwit_data,
            new_tx_hashes,
            tx_hash_refs,
            far_share_hash,
            max_bits,
            bits,
            timestamp,
            absheight,
            abswork,
        })
    }
}

/// `hash_link`, re-exported under the share module for convenience; the real
/// definition (and its `from_prefix`/`resume` algorithm) lives in `p2pool_hashing`.
pub use p2pool_hashing::HashLink;

/// `ref_merkle_link`: a merkle branch whose index is always `0` (the gentx
/// is always index 0 of the block it's committing to), used by `check` to
/// validate the share's commitment to the gentx.
pub type RefMerkleLink = MerkleLink;

#[cfg(test)]
mod tests {
    use super::*;

    fn share_data() -> ShareData {
        ShareData {
            previous_share_hash: None,
            coinbase: VarBytes(vec![0u8; 4]),
            nonce: 0,
            payee: Payee::PubkeyHash(U160([0u8; 20])),
            subsidy: 0,
            donation: 0,
            stale_info: StaleInfo::None,
            desired_version: VarInt(17),
        }
    }

    fn encode_tx_refs(hashes: &[U256], refs: &[(u64, u64)], buf: &mut Vec<u8>) {
        VarList(hashes.to_vec()).consensus_encode(buf);
        VarInt(refs.len() as u64).consensus_encode(buf);
        for (a, b) in refs {
            VarInt(*a).consensus_encode(buf);
            VarInt(*b).consensus_encode(buf);
        }
    }

    fn tail(buf: &mut Vec<u8>) {
        p2pool_encoding::PossiblyNone::<U256>(None).consensus_encode(buf);
        FloatingInteger(0x1d00ffff).consensus_encode(buf);
        FloatingInteger(0x1d00ffff).consensus_encode(buf);
        0u32.consensus_encode(buf);
        0u32.consensus_encode(buf);
        0u128.consensus_encode(buf);
    }

    #[test]
    fn tx_hash_refs_covering_every_new_hash_decodes() {
        let mut buf = Vec::new();
        share_data().encode(&mut buf);
        let hashes = vec![U256::from(1u64), U256::from(2u64)];
        encode_tx_refs(&hashes, &[(0, 0), (0, 1)], &mut buf);
        tail(&mut buf);
        let mut cursor: Cursor<'_> = &buf[..];
        let info = ShareInfo::decode(&mut cursor, false, false, true).expect("valid refs decode");
        assert_eq!(info.new_tx_hashes, Some(hashes));
    }

    #[test]
    fn tx_hash_refs_missing_a_self_reference_is_rejected() {
        let mut buf = Vec::new();
        share_data().encode(&mut buf);
        let hashes = vec![U256::from(1u64), U256::from(2u64)];
        // Only references index 0; index 1 of `new_tx_hashes` is uncovered.
        encode_tx_refs(&hashes, &[(0, 0)], &mut buf);
        tail(&mut buf);
        let mut cursor: Cursor<'_> = &buf[..];
        let err = ShareInfo::decode(&mut cursor, false, false, true).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure { field: "tx_hash_refs", .. }));
    }
}
