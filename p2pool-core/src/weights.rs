//! PPLNS weight aggregation over a bounded attempts window (§3/§4.6, C6).

use std::collections::BTreeMap;

use p2pool_encoding::{FloatingInteger, U256};
use p2pool_skiplist::Delta;

use crate::{
    share::Share,
    tracker::{payee_key, Tracker},
};

/// Units of 1/65535 donated from every share's weight, carried alongside the
/// attempts-weighted split so the donation bucket pro-rates exactly like any
/// other payee when a boundary share is cut.
const DONATION_SCALE: u64 = 65535;

/// The weights skip-list's delta: a share count, a per-address attempts map,
/// a running total, and the donation-bucket subtotal. `combine` concatenates
/// two adjacent ranges (older ++ newer); this is the same shape as
/// [`crate::tracker::AttributeDelta`] but scoped to payout accounting rather
/// than chain-selection statistics, so it gets its own monoid rather than
/// reusing the tracker's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsDelta {
    pub count: u64,
    pub weights: BTreeMap<String, u64>,
    pub total_attempts: u64,
    pub donation_attempts: u64,
}

impl Delta for WeightsDelta {
    fn identity() -> Self {
        WeightsDelta {
            count: 0,
            weights: BTreeMap::new(),
            total_attempts: 0,
            donation_attempts: 0,
        }
    }

    fn combine(&self, after: &Self) -> Self {
        let mut weights = self.weights.clone();
        for (addr, attempts) in &after.weights {
            *weights.entry(addr.clone()).or_insert(0) += attempts;
        }
        WeightsDelta {
            count: self.count + after.count,
            weights,
            total_attempts: self.total_attempts + after.total_attempts,
            donation_attempts: self.donation_attempts + after.donation_attempts,
        }
    }
}

/// The single-share delta: `attempts(bits)` split `(65535 - donation)` ways
/// to the payee and `donation` ways to the donation bucket, in sixty-five
/// thousandths (§4.6's "integer fraction of 65535 per share").
fn delta_for_share(share: &Share) -> WeightsDelta {
    let info = share.share_info();
    let attempts = FloatingInteger::attempts(info.bits.target());
    let attempts = attempts.min(U256::from(u64::MAX)).as_u64();
    let donation = info.share_data.donation as u64;
    let payee_attempts = attempts.saturating_mul(DONATION_SCALE - donation) / DONATION_SCALE;
    let donation_attempts = attempts - payee_attempts;
    let mut weights = BTreeMap::new();
    weights.insert(payee_key(&info.share_data.payee), payee_attempts);
    WeightsDelta {
        count: 1,
        weights,
        total_attempts: attempts,
        donation_attempts,
    }
}

/// Result of [`accumulate`]: `weights` already has the donation bucket
/// merged in under `donation_address` (§"C6" supplement), ready to hand to
/// the coinbase builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PplnsWeights {
    pub weights: BTreeMap<String, u64>,
    pub total_attempts: u64,
    pub donation_attempts: u64,
}

/// Walk from `start_hash` toward the root, accumulating whichever bound
/// (`max_count` or `max_total_attempts`) binds first. The boundary share is
/// pro-rated: its contribution is scaled by `remaining_attempts /
/// share.attempts` at `DONATION_SCALE` granularity (§4.6).
pub fn accumulate(
    tracker: &Tracker,
    start_hash: U256,
    max_count: u64,
    max_total_attempts: u64,
    donation_address: &str,
) -> PplnsWeights {
    let mut total = WeightsDelta::identity();
    let mut hash = start_hash;
    loop {
        if total.count >= max_count || total.total_attempts >= max_total_attempts {
            break;
        }
        let Some(share) = tracker.get(&hash) else { break };
        let share_delta = delta_for_share(share);

        let count_room = max_count - total.count;
        let attempts_room = max_total_attempts - total.total_attempts;

        let fits_whole = count_room >= 1 && share_delta.total_attempts <= attempts_room;
        let contribution = if fits_whole {
            share_delta
        } else if attempts_room == 0 || count_room == 0 {
            break;
        } else {
            prorate(&share_delta, attempts_room)
        };
        let reached_cap = !fits_whole;
        total = total.combine(&contribution);

        if reached_cap {
            break;
        }
        match share.previous_share_hash() {
            Some(parent) => hash = parent,
            None => break,
        }
    }

    let mut weights = total.weights;
    *weights.entry(donation_address.to_string()).or_insert(0) += total.donation_attempts;

    PplnsWeights {
        weights,
        total_attempts: total.total_attempts,
        donation_attempts: total.donation_attempts,
    }
}

/// Scale a single share's delta down to `remaining_attempts`, at
/// [`DONATION_SCALE`] granularity, preserving the relative payee/donation
/// split as closely as integer rounding allows.
fn prorate(delta: &WeightsDelta, remaining_attempts: u64) -> WeightsDelta {
    if delta.total_attempts == 0 {
        return WeightsDelta::identity();
    }
    let scale = |value: u64| -> u64 {
        ((value as u128) * (remaining_attempts as u128) * (DONATION_SCALE as u128)
            / (delta.total_attempts as u128)
            / (DONATION_SCALE as u128)) as u64
    };
    let weights = delta.weights.iter().map(|(k, v)| (k.clone(), scale(*v))).collect();
    WeightsDelta {
        count: 1,
        weights,
        total_attempts: remaining_attempts,
        donation_attempts: scale(delta.donation_attempts),
    }
}

/// For version < 34 shares: truncate a payout set to the `limit` largest
/// destinations, folding every dropped destination's weight into the
/// donation bucket so `Σ outputs.value` is preserved (§4.7 step 3's
/// ">4000 destinations truncated" rule; a separate caller-side warning fires
/// above 200 since some ASIC firmware rejects oversized coinbases).
pub fn truncate_payout_set(weights: &BTreeMap<String, u64>, donation_address: &str, limit: usize) -> BTreeMap<String, u64> {
    if weights.len() <= limit {
        return weights.clone();
    }
    let mut by_weight: Vec<(&String, &u64)> = weights.iter().collect();
    by_weight.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let mut kept: BTreeMap<String, u64> = by_weight[..limit].iter().map(|(k, v)| ((*k).clone(), **v)).collect();
    let dropped: u64 = by_weight[limit..].iter().map(|(_, v)| **v).sum();
    *kept.entry(donation_address.to_string()).or_insert(0) += dropped;
    kept
}

/// Turn a PPLNS weights split into concrete payout values: 99.5% of
/// `subsidy` divided by attempts weight, 0.5% bonus to `miner_key` (this
/// share's own miner, per §4.7 step 3), truncated to the largest 4000
/// destinations for pre-segwit shares.
pub fn compute_payout(
    weights: &PplnsWeights,
    subsidy: u64,
    miner_key: &str,
    donation_address: &str,
    truncate_to_4000: bool,
) -> BTreeMap<String, u64> {
    let total = weights.total_attempts.max(1) as u128;
    let subsidy = subsidy as u128;
    let mut payout: BTreeMap<String, u64> = weights
        .weights
        .iter()
        .map(|(addr, attempts)| {
            let share = subsidy * 995 / 1000 * (*attempts as u128) / total;
            (addr.clone(), share as u64)
        })
        .collect();
    let allocated: u64 = payout.values().sum();
    let bonus = (subsidy / 200).min(subsidy.saturating_sub(allocated as u128)) as u64;
    *payout.entry(miner_key.to_string()).or_insert(0) += bonus;

    if truncate_to_4000 {
        payout = truncate_payout_set(&payout, donation_address, 4000);
    }
    payout
}

#[cfg(test)]
mod tests {
    use p2pool_encoding::{FloatingInteger, VarBytes, VarInt};

    use super::*;
    use crate::share::{MinHeader, Payee, ShareBody, ShareData, ShareInfo, StaleInfo};

    fn make_share(prev: Option<U256>, payee: &str, bits: u32) -> Share {
        let share_data = ShareData {
            previous_share_hash: prev,
            coinbase: VarBytes(vec![0u8; 4]),
            nonce: 0,
            payee: Payee::Address(payee.to_string()),
            subsidy: 0,
            donation: 0,
            stale_info: StaleInfo::None,
            desired_version: VarInt(35),
        };
        let share_info = ShareInfo {
            share_data,
            segwit_data: None,
            new_tx_hashes: None,
            tx_hash_refs: None,
            far_share_hash: None,
            max_bits: FloatingInteger(bits),
            bits: FloatingInteger(bits),
            timestamp: 0,
            absheight: 0,
            abswork: 0,
        };
        Share::V35(ShareBody {
            min_header: MinHeader {
                version: 1,
                prev_block: prev,
                timestamp: 0,
                bits: FloatingInteger(bits),
                nonce: 0,
            },
            share_info,
            ref_merkle_link: crate::share::RefMerkleLink { branch: vec![], index: 0 },
            last_txout_nonce: 0,
            hash_link: p2pool_hashing::HashLink {
                state: [0u32; 8],
                extra_data: vec![],
                length: 0,
            },
            merkle_link: crate::share::MerkleLink { branch: vec![], index: 0 },
        })
    }

    #[test]
    fn unbounded_window_sums_every_share_attempts() {
        let mut tracker = Tracker::new();
        tracker.add(U256::from(0u64), make_share(None, "A", 0x1d00ffff)).unwrap();
        for i in 1u64..=5 {
            let prev = Some(U256::from(i - 1));
            tracker.add(U256::from(i), make_share(prev, "A", 0x1d00ffff)).unwrap();
        }
        let result = accumulate(&tracker, U256::from(5u64), 1000, u64::MAX, "DONATE");
        let per_share = FloatingInteger(0x1d00ffff).target();
        let attempts = FloatingInteger::attempts(per_share).as_u64();
        assert_eq!(result.total_attempts, attempts * 6);
        assert_eq!(*result.weights.get("A").unwrap(), attempts * 6);
    }

    #[test]
    fn count_cap_stops_after_the_requested_number_of_shares() {
        let mut tracker = Tracker::new();
        tracker.add(U256::from(0u64), make_share(None, "A", 0x1d00ffff)).unwrap();
        for i in 1u64..=10 {
            let prev = Some(U256::from(i - 1));
            tracker.add(U256::from(i), make_share(prev, "A", 0x1d00ffff)).unwrap();
        }
        let result = accumulate(&tracker, U256::from(10u64), 3, u64::MAX, "DONATE");
        let per_share = FloatingInteger::attempts(FloatingInteger(0x1d00ffff).target()).as_u64();
        assert_eq!(result.total_attempts, per_share * 3);
    }

    #[test]
    fn two_miners_split_close_to_their_attempts_share() {
        let mut tracker = Tracker::new();
        tracker.add(U256::from(0u64), make_share(None, "A", 0x1d00ffff)).unwrap();
        let payees = ["A", "B", "A", "B", "A", "B", "A", "A", "A", "B"];
        for (i, payee) in payees.iter().enumerate() {
            let i = i as u64 + 1;
            tracker
                .add(U256::from(i), make_share(Some(U256::from(i - 1)), payee, 0x1d00ffff))
                .unwrap();
        }
        let result = accumulate(&tracker, U256::from(10u64), 1000, u64::MAX, "DONATE");
        let a = *result.weights.get("A").unwrap() as f64;
        let b = *result.weights.get("B").unwrap() as f64;
        let ratio = a / (a + b);
        assert!((ratio - 0.7).abs() < 0.05, "ratio = {ratio}");
    }
}
