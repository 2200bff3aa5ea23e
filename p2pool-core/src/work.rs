//! Work generation (§4.9, C9): build the share-info and payout set for a
//! new candidate share given a parent-chain template and the current best
//! share.
//!
//! Byte-level Bitcoin script/transaction construction (scriptPubKey
//! encoding, the witness-commitment `OP_RETURN`, the gentx's trailing
//! ref-hash `OP_RETURN`) is the node-wiring layer's job: this module works
//! at the value level (destination -> satoshis) the way [`crate::validation`]
//! consumes it, and leaves byte construction to a collaborator the same way
//! parent-chain consensus itself sits behind `NetParams` (§1's Non-goals).

use std::collections::BTreeMap;

use p2pool_encoding::{FloatingInteger, U256};

use crate::{
    net_params::NetParams,
    share::Payee,
    tracker::Tracker,
    weights,
};

/// Bytes reserved in the coinbase for `last_txout_nonce`, fixed across every
/// net (`work.py`'s `COINBASE_NONCE_LENGTH`).
pub const COINBASE_NONCE_LENGTH: usize = 8;

/// Safety margins subtracted from the consensus limits before packing
/// transactions, matching `work.py`'s literal constants.
const SIZE_OVERHEAD: u64 = 80 + 500;
const WEIGHT_OVERHEAD: u64 = 320 + 2000;

#[derive(Debug, Clone)]
pub struct CandidateTx {
    pub hash: U256,
    pub stripped_size: u64,
    pub weight: u64,
    pub fee: Option<u64>,
}

pub struct GenerateTransactionParams<'a> {
    pub tracker: &'a Tracker,
    pub net: &'a dyn NetParams,
    /// The current best share, if any (a fresh chain starts with `None`).
    pub parent_hash: Option<U256>,
    pub desired_timestamp: u32,
    pub desired_target: U256,
    pub candidate_txs: &'a [CandidateTx],
    /// The miner's own payout destination for this share.
    pub payee: Payee,
    pub donation: u16,
    /// The probability-decided donation of this share's own 0.5% bonus,
    /// already resolved by the stratum bridge's per-worker RNG draw (§"C9"
    /// supplement: the generator takes the decision, not the die roll).
    pub donate_worker_fee_share: bool,
    pub donation_address: &'a str,
    pub base_subsidy: Option<u64>,
    pub prototype_subsidy: u64,
    pub absheight: u32,
    pub abswork: u128,
    pub share_version_is_pre_segwit: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedWork {
    pub bits: FloatingInteger,
    pub max_bits: FloatingInteger,
    pub included_tx_hashes: Vec<U256>,
    pub excluded_tx_hashes: Vec<U256>,
    pub subsidy: u64,
    pub outputs: BTreeMap<String, u64>,
}

/// `clip(value, [lo, hi])`, the same clamp `work.py` applies to `bits`.
fn clip(value: U256, lo: U256, hi: U256) -> U256 {
    value.clamp(lo, hi)
}

#[allow(clippy::too_many_arguments)]
pub fn generate_transaction(params: &GenerateTransactionParams<'_>) -> GeneratedWork {
    let net = params.net;

    // 1. pre_target from an attempts-per-second estimate, clamped around the
    // parent's max_bits then to the net-wide [MIN_TARGET, MAX_TARGET].
    let parent_max_target = params
        .parent_hash
        .and_then(|h| params.tracker.get(&h))
        .map(|s| s.share_info().max_bits.target())
        .unwrap_or_else(|| net.max_target());

    let pre_target = match params.parent_hash.and_then(|h| params.tracker.get_average_strength(&h, net.target_lookbehind())) {
        Some(attempts_per_second) if attempts_per_second > 0.0 => {
            let target_f = u128::MAX as f64 / (attempts_per_second * net.share_period() as f64);
            U256::from(target_f.max(0.0) as u128)
        }
        _ => parent_max_target,
    };
    let lo = parent_max_target - parent_max_target / 10;
    let hi = parent_max_target + parent_max_target / 10;
    let pre_target = clip(pre_target, lo.min(hi), lo.max(hi));
    let pre_target = clip(pre_target, net.min_target(), net.max_target());
    let max_bits = FloatingInteger::from_target(pre_target);

    let bits_target = clip(params.desired_target, pre_target / 30, pre_target);
    let bits = FloatingInteger::from_target(bits_target);

    // 2. Select transactions in input order under the size/weight budget.
    let mut stripped_total = 0u64;
    let mut weight_total = 0u64;
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for tx in params.candidate_txs {
        let fits_size = stripped_total + tx.stripped_size + SIZE_OVERHEAD <= net.block_max_size();
        let fits_weight = weight_total + tx.weight + WEIGHT_OVERHEAD <= net.block_max_weight();
        if fits_size && fits_weight {
            stripped_total += tx.stripped_size;
            weight_total += tx.weight;
            included.push(tx);
        } else {
            excluded.push(tx);
        }
    }

    // 3. Subsidy: prefer subtracting excluded fees from the template's
    // subsidy (exact); fall back to building up from a base subsidy when an
    // excluded tx's fee isn't known.
    let all_excluded_known = excluded.iter().all(|tx| tx.fee.is_some());
    let subsidy = if all_excluded_known {
        let excluded_fees: u64 = excluded.iter().filter_map(|tx| tx.fee).sum();
        params.prototype_subsidy.saturating_sub(excluded_fees)
    } else {
        let included_fees: u64 = included.iter().filter_map(|tx| tx.fee).sum();
        params.base_subsidy.unwrap_or(params.prototype_subsidy) + included_fees
    };

    // 4. Weights at parent, then the payout split (§4.7 step 3).
    let max_total_attempts = 65535u64
        .saturating_mul(net.spread())
        .saturating_mul(FloatingInteger::attempts(bits.target()).min(U256::from(u64::MAX)).as_u64());
    let miner_key = crate::tracker::payee_key(&params.payee);
    let outputs = match params.parent_hash {
        Some(parent_hash) => {
            let pplns = weights::accumulate(params.tracker, parent_hash, net.chain_length(), max_total_attempts, params.donation_address);
            weights::compute_payout(&pplns, subsidy, &miner_key, params.donation_address, params.share_version_is_pre_segwit)
        }
        None => {
            let mut outputs = BTreeMap::new();
            outputs.insert(miner_key, subsidy);
            outputs
        }
    };

    GeneratedWork {
        bits,
        max_bits,
        included_tx_hashes: included.iter().map(|tx| tx.hash).collect(),
        excluded_tx_hashes: excluded.iter().map(|tx| tx.hash).collect(),
        subsidy,
        outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net_params::BitcoinCash;

    #[test]
    fn unconstrained_budget_includes_every_candidate() {
        let net = BitcoinCash::default();
        let tracker = Tracker::new();
        let candidates = vec![
            CandidateTx { hash: U256::from(1u64), stripped_size: 200, weight: 800, fee: Some(1000) },
            CandidateTx { hash: U256::from(2u64), stripped_size: 300, weight: 1200, fee: Some(2000) },
        ];
        let params = GenerateTransactionParams {
            tracker: &tracker,
            net: &net,
            parent_hash: None,
            desired_timestamp: 0,
            desired_target: net.max_target(),
            candidate_txs: &candidates,
            payee: Payee::Address("miner".to_string()),
            donation: 0,
            donate_worker_fee_share: false,
            donation_address: "DONATE",
            base_subsidy: None,
            prototype_subsidy: 5_000_000_000,
            absheight: 0,
            abswork: 0,
            share_version_is_pre_segwit: false,
        };
        let result = generate_transaction(&params);
        assert_eq!(result.included_tx_hashes.len(), 2);
        assert!(result.excluded_tx_hashes.is_empty());
        assert_eq!(result.subsidy, 5_000_000_000);
    }
}
