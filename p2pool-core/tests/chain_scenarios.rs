//! Black-box scenarios exercising `validation::check`, `Tracker` and
//! `weights` together through the crate's public API, the way
//! `base_layer/core`'s own top-level `tests/` directory drives its chain
//! validators against hand-built fixtures rather than only unit-testing
//! each module in isolation.

use std::collections::BTreeMap;

use p2pool_core::{
    net_params::{BitcoinCash, NetParams},
    share::{MerkleLink, MinHeader, Payee, RefMerkleLink, Share, ShareBody, ShareData, ShareInfo, ShareVersion, StaleInfo},
    tracker::Tracker,
    validation::{check, CheckError, CheckInput},
};
use p2pool_encoding::{FloatingInteger, U256};

// A compact target comfortably below every built-in net's `max_target`
// (≈2^223, vs. BitcoinCash's ≈2^224), so `bits.target() <= max_target`
// holds without needing a per-net-specific fixture.
const EASY_BITS: u32 = 0x1c7f_ffff;

fn share(
    previous_share_hash: Option<U256>,
    timestamp: u32,
    subsidy: u64,
    payee: &str,
    version: ShareVersion,
    desired_version: u32,
) -> Share {
    let share_data = ShareData {
        previous_share_hash,
        coinbase: p2pool_encoding::VarBytes(vec![0u8; 4]),
        nonce: 0,
        payee: Payee::Address(payee.to_string()),
        subsidy,
        donation: 0,
        stale_info: StaleInfo::None,
        desired_version: p2pool_encoding::VarInt(desired_version as u64),
    };
    let share_info = ShareInfo {
        share_data,
        segwit_data: None,
        new_tx_hashes: None,
        tx_hash_refs: None,
        far_share_hash: None,
        max_bits: FloatingInteger(EASY_BITS),
        bits: FloatingInteger(EASY_BITS),
        timestamp,
        absheight: 0,
        abswork: 0,
    };
    let body = ShareBody {
        min_header: MinHeader {
            version: 1,
            prev_block: None,
            timestamp,
            bits: FloatingInteger(EASY_BITS),
            nonce: 0,
        },
        share_info,
        ref_merkle_link: RefMerkleLink { branch: vec![], index: 0 },
        last_txout_nonce: 0,
        hash_link: p2pool_hashing::HashLink {
            state: [0u32; 8],
            extra_data: vec![],
            length: 0,
        },
        merkle_link: MerkleLink { branch: vec![], index: 0 },
    };
    match version {
        ShareVersion::V35 => Share::V35(body),
        ShareVersion::V34 => Share::V34(body),
        ShareVersion::V33 => Share::V33(body),
        ShareVersion::V32 => Share::V32(body),
        ShareVersion::V17 => Share::V17(body),
    }
}

/// Scenario 1 ("Chain build", §8): a run of clean shares is accepted one by
/// one and the tracker ends up with a single head at the expected height.
#[test]
fn chain_build_accepts_a_run_of_clean_shares() {
    let net = BitcoinCash::default();
    let mut tracker = Tracker::new();
    let mut parent_hash = None;
    let mut parent_naughty = None;
    let mut tip = U256::zero();

    for i in 0..50u32 {
        let s = share(parent_hash, 1000 + i, 0, "miner-a", ShareVersion::V35, 35);
        let hash = s.hash();
        let input = CheckInput {
            hash,
            share: &s,
            parent_naughty,
            header_pow: U256::zero(),
            gentx_outputs: &BTreeMap::new(),
            known_total_fees: Some(0),
            parent_block_height: Some(0),
            donation_address: "DONATE",
        };
        let checked = check(&input, &tracker, &net, 10_000).expect("clean share should validate");
        assert_eq!(checked.naughty, 0);
        tracker.add(hash, s).expect("tracker add should succeed for a fresh hash");
        parent_hash = Some(hash);
        parent_naughty = Some(checked.naughty);
        tip = hash;
    }

    assert_eq!(tracker.len(), 50);
    let (height, _tail) = tracker.get_height_and_last(&tip).expect("tip should be tracked");
    assert_eq!(height, 49);
}

/// Scenario 2 ("Successor rejection", §8): a version switch that doesn't
/// carry the 60% vote window is peer misbehavior, not a silent skip.
#[test]
fn successor_without_enough_votes_is_rejected() {
    let net = BitcoinCash::default();
    let mut tracker = Tracker::new();
    let mut parent_hash = None;

    // 20 v33 shares, none of them voting for v35.
    for i in 0..20u32 {
        let s = share(parent_hash, 1000 + i, 0, "miner-a", ShareVersion::V33, 33);
        let hash = s.hash();
        tracker.add(hash, s).unwrap();
        parent_hash = Some(hash);
    }

    let child = share(parent_hash, 1021, 0, "miner-a", ShareVersion::V35, 35);
    let hash = child.hash();
    let input = CheckInput {
        hash,
        share: &child,
        parent_naughty: Some(0),
        header_pow: U256::zero(),
        gentx_outputs: &BTreeMap::new(),
        known_total_fees: Some(0),
        parent_block_height: Some(0),
        donation_address: "DONATE",
    };
    let err = check(&input, &tracker, &net, 10_000).unwrap_err();
    assert!(matches!(err, CheckError::PeerMisbehaving(_)), "expected a vote-window rejection, got {err:?}");
}

/// Scenario 3 ("Naughty propagation", §8): a subsidy that exceeds the
/// known-fee ceiling marks the share naughty; the next six descendants
/// inherit an incrementing severity; the seventh resets to clean.
#[test]
fn naughty_propagates_for_six_generations_then_resets() {
    let net = BitcoinCash::default();
    let mut tracker = Tracker::new();

    let base_subsidy = net.subsidy(0);
    let bad = share(None, 1000, base_subsidy + 1_000_000, "miner-a", ShareVersion::V33, 33);
    let bad_hash = bad.hash();
    let input = CheckInput {
        hash: bad_hash,
        share: &bad,
        parent_naughty: None,
        header_pow: U256::zero(),
        gentx_outputs: &BTreeMap::new(),
        known_total_fees: Some(0),
        parent_block_height: Some(0),
        donation_address: "DONATE",
    };
    let checked = check(&input, &tracker, &net, 10_000).expect("an over-subsidy share still validates");
    assert_eq!(checked.naughty, 1);
    tracker.add(bad_hash, bad).unwrap();

    let mut parent_hash = bad_hash;
    let mut parent_naughty = checked.naughty;
    let mut naughty_history = vec![checked.naughty];
    for i in 0..7u32 {
        let s = share(Some(parent_hash), 1001 + i, 0, "miner-a", ShareVersion::V33, 33);
        let hash = s.hash();
        let input = CheckInput {
            hash,
            share: &s,
            parent_naughty: Some(parent_naughty),
            header_pow: U256::zero(),
            gentx_outputs: &BTreeMap::new(),
            known_total_fees: Some(0),
            parent_block_height: Some(0),
            donation_address: "DONATE",
        };
        let checked = check(&input, &tracker, &net, 10_000).unwrap();
        naughty_history.push(checked.naughty);
        tracker.add(hash, s).unwrap();
        parent_hash = hash;
        parent_naughty = checked.naughty;
    }

    // generations: [1 (the bad share itself), 2, 3, 4, 5, 6, 7->0, 0]
    assert_eq!(naughty_history, vec![1, 2, 3, 4, 5, 6, 0, 0]);
}

/// Scenario 5 ("Codec negative", §8): a `share_data` blob declaring an
/// oversized coinbase is rejected by the bounded decoder, not silently
/// truncated or accepted.
#[test]
fn oversized_coinbase_is_rejected_by_the_codec() {
    use p2pool_encoding::{ConsensusDecoding, ConsensusEncoding, Cursor, VarBytes};

    let too_big = VarBytes(vec![0u8; 101]).consensus_encode_to_vec();
    let mut cursor: Cursor<'_> = &too_big;
    let err = VarBytes::decode_bounded(&mut cursor, "share_data.coinbase", 2, 100).unwrap_err();
    assert!(matches!(err, p2pool_encoding::CodecError::LengthOutOfRange { len: 101, .. }));
}
