//! Chain selection (§4.8, C8): pick a best head, decide what to request
//! next, and punish misbehaving branches.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use p2pool_encoding::{FloatingInteger, U256};

use crate::{
    net_params::NetParams,
    share::Share,
    tracker::{Tracker, VerifiedTracker},
    validation::{CheckError, CheckedShare},
};

/// Net-level mutable state `think` writes and the encoders/validators read
/// (§9 REDESIGN FLAG: "fold the global flag into a per-core-context atomic").
#[derive(Debug, Default)]
pub struct ThinkState {
    pub padding_bugfix: AtomicBool,
    pub min_protocol_version: AtomicU32,
}

impl ThinkState {
    pub fn padding_bugfix(&self) -> bool {
        self.padding_bugfix.load(Ordering::Relaxed)
    }

    pub fn min_protocol_version(&self) -> u32 {
        self.min_protocol_version.load(Ordering::Relaxed)
    }
}

/// One entry of `desired_requests`: request `share_hash` from `peer`, but
/// only while the request is still useful — cutoffs make stale requests a
/// no-op on the transport side instead of a separately-tracked cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredRequest {
    pub share_hash: U256,
    pub timestamp_cutoff: u64,
    pub target_cutoff: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DecoratedScore {
    pub work: U256,
    pub naughty: u8,
    pub time_seen: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ThinkResult {
    pub best_head: Option<U256>,
    pub desired_requests: Vec<DesiredRequest>,
    pub decorated_heads: Vec<(U256, DecoratedScore)>,
    /// Share hashes whose branch was judged bad enough to ban the peer that
    /// sent them; attributing a hash back to the peer that delivered it is
    /// the transport's bookkeeping (C11), not the tracker's.
    pub bad_share_hashes: Vec<U256>,
    pub punish_aggressively: bool,
}

/// `(severity, reason)`: `-1` marks "this share is also a block, never skip
/// past it"; a positive value means the walk should jump past this share to
/// its best non-naughty descendant (§4.8).
pub fn should_punish_reason(tracker: &Tracker, naughty: &HashMap<U256, u8>, hash: &U256, header_pow: Option<U256>) -> (i64, &'static str) {
    let Some(share) = tracker.get(hash) else {
        return (0, "unknown");
    };
    let info = share.share_info();
    if let Some(pow) = header_pow {
        if pow <= info.bits.target() {
            return (-1, "block solution");
        }
    }
    let n = *naughty.get(hash).unwrap_or(&0);
    if n > 0 {
        return (n as i64, "naughty");
    }
    (0, "clean")
}

/// Recursive max over non-naughty descendants: the deepest, highest-work
/// clean branch reachable from `hash`. If every descendant is naughty,
/// returns `hash` itself (§9: "this is intentional").
pub fn best_descendent(tracker: &Tracker, naughty: &HashMap<U256, u8>, hash: U256) -> U256 {
    let mut best = hash;
    let mut best_work = tracker.get_work(&hash).unwrap_or_default();
    for child in tracker.children(&hash).copied().collect::<Vec<_>>() {
        if naughty.get(&child).copied().unwrap_or(0) > 0 {
            continue;
        }
        let candidate = best_descendent(tracker, naughty, child);
        let candidate_work = tracker.get_work(&candidate).unwrap_or_default();
        if candidate_work > best_work {
            best = candidate;
            best_work = candidate_work;
        }
    }
    best
}

/// An approximate lower bound on recent pool hashrate: work over the range
/// `(tail, best_head(tail) - chain_length*15/16]`, normalized by elapsed
/// parent-chain time (grounded on `data.py`'s tail-scoring heuristic).
fn score(tracker: &Tracker, head: U256, chain_length: u64, parent_block_period_secs: u64, blocks_since_parent: u64) -> U256 {
    let cutoff = chain_length * 15 / 16;
    let Some(height) = tracker.get_height_and_last(&head).map(|(h, _)| h) else {
        return U256::zero();
    };
    let n = cutoff.min(height);
    let Some(ancestor) = tracker.get_nth_parent_hash(&head, n) else {
        return U256::zero();
    };
    let Some(delta) = tracker.get_delta(&head, &ancestor) else {
        return U256::zero();
    };
    let denom = (1 + blocks_since_parent) * parent_block_period_secs.max(1);
    delta.work / U256::from(denom.max(1))
}

/// §4.8 steps 1–2: extend the `verified` subtracker along the frontier of
/// each full-tracker head that isn't already verified, populating the two
/// outputs the rest of `think` leaves for the caller to act on: parent
/// requests for history we don't have, and the hashes of branches whose
/// verification failed outright.
///
/// For each unverified head this walks two windows down from the head (the
/// near-head shares beyond the already-verified `chain_length` depth, and
/// however much of the chain toward `chain_length` isn't verified yet),
/// stopping a window early the moment it reaches a hash `verified` already
/// knows about (everything below it was handled by an earlier pass).
/// `verify` is expected to wrap `validation::check` with whatever
/// gentx/fee/header context the caller already has for `hash`.
#[allow(clippy::too_many_arguments)]
fn verify_frontier(
    tracker: &Tracker,
    verified: &mut VerifiedTracker,
    naughty: &mut HashMap<U256, u8>,
    chain_length: u64,
    timestamp_cutoff: u64,
    target_cutoff: U256,
    verify: &mut dyn FnMut(&Tracker, U256) -> Result<CheckedShare, CheckError>,
) -> (Vec<DesiredRequest>, Vec<U256>) {
    let mut desired_requests = Vec::new();
    let mut bad_share_hashes = Vec::new();

    for head in tracker.heads().copied().collect::<Vec<_>>() {
        if verified.contains(&head) {
            continue;
        }
        let Some((height, _)) = tracker.get_height_and_last(&head) else {
            continue;
        };

        let step1_depth = height.saturating_sub(chain_length).min(5);
        // `height + 1` is the full local chain (head down to its tail
        // inclusive); when that's shorter than `chain_length` the whole
        // thing gets walked rather than stopping one share short of the
        // tail.
        let step2_depth = (height + 1).min(chain_length);
        let walk_depth = step1_depth.max(step2_depth).max(1);

        let chain: Vec<U256> = tracker.get_chain(head, walk_depth).collect();
        // `chain` runs newest (head) to oldest; a share's validity depends
        // on its parent's, so walk it oldest-to-newest — a failure bans not
        // just itself but every newer (already-queued) descendant in the
        // window, matching §4.8's "mark the branch bad".
        let oldest_first: Vec<U256> = chain.iter().rev().copied().collect();
        let mut hit_failure = false;
        for (pos, hash) in oldest_first.iter().enumerate() {
            if verified.contains(hash) {
                continue;
            }
            match verify(tracker, *hash) {
                Ok(checked) => {
                    verified.add(tracker, *hash);
                    naughty.insert(*hash, checked.naughty);
                }
                Err(CheckError::MissingParent(parent)) => {
                    desired_requests.push(DesiredRequest {
                        share_hash: parent,
                        timestamp_cutoff,
                        target_cutoff,
                    });
                    hit_failure = true;
                    break;
                }
                Err(_) => {
                    bad_share_hashes.extend(oldest_first[pos..].iter().copied());
                    hit_failure = true;
                    break;
                }
            }
        }
        if hit_failure {
            continue;
        }

        // The walk ran out of known history before reaching a real root:
        // the oldest share we could resolve still names a parent we don't
        // have recorded at all.
        if (chain.len() as u64) < walk_depth {
            if let Some(last) = chain.last() {
                if let Some(missing_parent) = tracker
                    .get(last)
                    .and_then(Share::previous_share_hash)
                    .filter(|p| !tracker.contains(p))
                {
                    desired_requests.push(DesiredRequest {
                        share_hash: missing_parent,
                        timestamp_cutoff,
                        target_cutoff,
                    });
                }
            }
        }
    }

    (desired_requests, bad_share_hashes)
}

#[derive(Default)]
pub struct Think {
    pub state: ThinkState,
}

impl Think {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-running with an unchanged tracker/`naughty` map yields
    /// the same `best_head` and an equal `desired_requests` set (§5, §8).
    ///
    /// Runs the §4.8 steps 1–2 verification frontier first (via
    /// [`verify_frontier`]), mutating `verified` and `naughty` in place, then
    /// ranks tails/heads over the full tracker as before. `verify` is called
    /// at most once per not-yet-verified share reachable from a head within
    /// this tick's walk depth.
    #[allow(clippy::too_many_arguments)]
    pub fn think(
        &self,
        tracker: &Tracker,
        verified: &mut VerifiedTracker,
        naughty: &mut HashMap<U256, u8>,
        net: &dyn NetParams,
        now: u64,
        blocks_since_parent: u64,
        header_pow_of_heads: &HashMap<U256, U256>,
        verify: &mut dyn FnMut(&Tracker, U256) -> Result<CheckedShare, CheckError>,
    ) -> ThinkResult {
        let chain_length = net.chain_length();

        let frontier_timestamp_cutoff = now.saturating_sub(3600);
        let (desired_requests, bad_share_hashes) = verify_frontier(
            tracker,
            verified,
            naughty,
            chain_length,
            frontier_timestamp_cutoff,
            net.max_target(),
            verify,
        );
        let naughty: &HashMap<U256, u8> = naughty;

        // 3. Rank tails by an approximate pool-hashrate lower bound.
        let mut best_tail = None;
        let mut best_tail_score = U256::zero();
        for tail in tracker.tails() {
            let head_for_tail = tracker
                .heads()
                .filter(|h| tracker.get_height_and_last(h).map(|(_, last)| last == *tail).unwrap_or(false))
                .max_by_key(|h| tracker.get_work(h).unwrap_or_default());
            let Some(head) = head_for_tail else { continue };
            let s = score(tracker, *head, chain_length, net.block_period(), blocks_since_parent);
            if best_tail.is_none() || s > best_tail_score {
                best_tail = Some(*tail);
                best_tail_score = s;
            }
        }

        let Some(best_tail) = best_tail else {
            return ThinkResult::default();
        };

        // 4. Rank heads within the best tail by (work, -naughty, -time_seen).
        let mut decorated_heads: Vec<(U256, DecoratedScore)> = tracker
            .heads()
            .filter(|h| tracker.get_height_and_last(h).map(|(_, last)| last == best_tail).unwrap_or(false))
            .map(|h| {
                let (height, tail) = tracker.get_height_and_last(h).unwrap_or((0, *h));
                let skip = 5u64.min(height);
                let ancestor_5 = tracker.get_nth_parent_hash(h, skip).unwrap_or(*h);
                let mut work = tracker.get_delta(&ancestor_5, &tail).map(|d| d.work).unwrap_or_default();
                let n = *naughty.get(h).unwrap_or(&0);
                if n > 0 {
                    let target = tracker.get(h).map(|s| s.share_info().bits.target()).unwrap_or_default();
                    work = work.saturating_sub(FloatingInteger::attempts(target));
                }
                let time_seen = tracker.get(h).map(|s| s.share_info().timestamp).unwrap_or(0);
                (*h, DecoratedScore { work, naughty: n, time_seen })
            })
            .collect();
        decorated_heads.sort_by(|a, b| {
            b.1.work
                .cmp(&a.1.work)
                .then(a.1.naughty.cmp(&b.1.naughty))
                .then(b.1.time_seen.cmp(&a.1.time_seen))
        });

        let mut punish_aggressively = false;
        let mut best_head = decorated_heads.first().map(|(h, _)| *h);

        // 5. Walk down from the chosen head, skipping punishable subchains.
        if let Some(mut current) = best_head {
            let mut steps = 0u64;
            loop {
                if steps >= chain_length {
                    break;
                }
                let header_pow = header_pow_of_heads.get(&current).copied();
                let (severity, _) = should_punish_reason(tracker, naughty, &current, header_pow);
                if severity <= 0 {
                    break;
                }
                punish_aggressively = true;
                let jumped = best_descendent(tracker, naughty, current);
                if jumped == current {
                    break;
                }
                current = jumped;
                steps += 1;
            }
            best_head = Some(current);
        }

        // 6. Cutoffs for desired requests.
        let best_ts = best_head.and_then(|h| tracker.get(&h)).map(|s| s.share_info().timestamp as u64).unwrap_or(now);
        let timestamp_cutoff = now.min(best_ts).saturating_sub(3600);
        let target_cutoff = best_head
            .and_then(|h| tracker.get(&h))
            .map(|s| s.share_info().bits.target())
            .unwrap_or(net.max_target());

        // 7. padding_bugfix flips once the chosen head's version crosses the
        // segwit-era fix line.
        let crosses_fix = best_head
            .and_then(|h| tracker.get(&h))
            .map(|s| s.version().as_u32() >= 35)
            .unwrap_or(false);
        self.state.padding_bugfix.store(crosses_fix, Ordering::Relaxed);

        ThinkResult {
            best_head,
            desired_requests,
            decorated_heads,
            bad_share_hashes,
            punish_aggressively,
        }
    }

    /// Helper for callers assembling `desired_requests` once they know which
    /// parent hashes are missing (populated by tracker `MissingParent`
    /// errors encountered while walking peer-delivered shares).
    pub fn desired_requests_for(&self, missing: &[U256], timestamp_cutoff: u64, target_cutoff: U256) -> Vec<DesiredRequest> {
        missing
            .iter()
            .map(|h| DesiredRequest {
                share_hash: *h,
                timestamp_cutoff,
                target_cutoff,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use p2pool_encoding::{FloatingInteger, VarBytes, VarInt};

    use super::*;
    use crate::{
        net_params::BitcoinCash,
        share::{MinHeader, Payee, ShareBody, ShareData, ShareInfo, StaleInfo},
    };

    #[test]
    fn best_descendent_returns_self_when_every_descendant_is_naughty() {
        let tracker = Tracker::new();
        let naughty = HashMap::new();
        let hash = U256::from(1u64);
        assert_eq!(best_descendent(&tracker, &naughty, hash), hash);
    }

    fn make_share(prev: Option<U256>, bits: u32, timestamp: u32) -> Share {
        let share_data = ShareData {
            previous_share_hash: prev,
            coinbase: VarBytes(vec![0u8; 4]),
            nonce: 0,
            payee: Payee::Address("addr1".to_string()),
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
            timestamp,
            absheight: 0,
            abswork: 0,
        };
        Share::V35(ShareBody {
            min_header: MinHeader {
                version: 536870912,
                prev_block: prev,
                timestamp,
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

    fn hash_of(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn think_verifies_a_fresh_chain_and_leaves_no_desired_requests() {
        let mut tracker = Tracker::new();
        tracker.add(hash_of(0), make_share(None, 0x1d00ffff, 1_000)).unwrap();
        for i in 1u64..=3 {
            tracker.add(hash_of(i), make_share(Some(hash_of(i - 1)), 0x1d00ffff, 1_000 + i as u32)).unwrap();
        }

        let net = BitcoinCash::default();
        let mut verified = VerifiedTracker::new();
        let mut naughty = HashMap::new();
        let mut verify = |_tracker: &Tracker, hash: U256| Ok(CheckedShare { hash, naughty: 0 });

        let think = Think::new();
        let result = think.think(&tracker, &mut verified, &mut naughty, &net, 2_000, 0, &HashMap::new(), &mut verify);

        assert_eq!(result.best_head, Some(hash_of(3)));
        assert!(result.desired_requests.is_empty());
        assert!(result.bad_share_hashes.is_empty());
        for i in 0..=3 {
            assert!(verified.contains(&hash_of(i)), "share {i} should have been verified");
        }
    }

    #[test]
    fn think_marks_the_failing_branch_bad_and_leaves_its_verified_ancestor_alone() {
        let mut tracker = Tracker::new();
        tracker.add(hash_of(0), make_share(None, 0x1d00ffff, 1_000)).unwrap();
        tracker.add(hash_of(1), make_share(Some(hash_of(0)), 0x1d00ffff, 1_001)).unwrap();
        tracker.add(hash_of(2), make_share(Some(hash_of(1)), 0x1d00ffff, 1_002)).unwrap();

        let net = BitcoinCash::default();
        let mut verified = VerifiedTracker::new();
        verified.add(&tracker, hash_of(0));
        let mut naughty = HashMap::new();
        let bad = hash_of(1);
        let mut verify = move |_tracker: &Tracker, hash: U256| {
            if hash == bad {
                Err(CheckError::Invalid("forced failure".to_string()))
            } else {
                Ok(CheckedShare { hash, naughty: 0 })
            }
        };

        let think = Think::new();
        let result = think.think(&tracker, &mut verified, &mut naughty, &net, 2_000, 0, &HashMap::new(), &mut verify);

        assert!(result.bad_share_hashes.contains(&hash_of(1)));
        assert!(result.bad_share_hashes.contains(&hash_of(2)));
        assert!(!verified.contains(&hash_of(1)));
        assert!(!verified.contains(&hash_of(2)));
        assert!(verified.contains(&hash_of(0)), "already-verified ancestor must be left alone");
    }

    #[test]
    fn think_requests_a_parent_the_tracker_never_recorded() {
        // The tracker's own `add` invariant forbids recording a share whose
        // parent isn't already present, so the only way the frontier sees a
        // "parent we don't have" is the verifier itself reporting one (e.g.
        // a v<34 share whose fee/gentx context isn't resolvable yet without
        // it) — exercise that path directly.
        let orphan_parent = hash_of(999);
        let mut tracker = Tracker::new();
        tracker.add(hash_of(0), make_share(None, 0x1d00ffff, 1_000)).unwrap();

        let net = BitcoinCash::default();
        let mut verified = VerifiedTracker::new();
        let mut naughty = HashMap::new();
        let mut verify = move |_tracker: &Tracker, hash: U256| {
            if hash == hash_of(0) {
                Err(CheckError::MissingParent(orphan_parent))
            } else {
                Ok(CheckedShare { hash, naughty: 0 })
            }
        };

        let think = Think::new();
        let result = think.think(&tracker, &mut verified, &mut naughty, &net, 2_000, 0, &HashMap::new(), &mut verify);

        assert!(result.desired_requests.iter().any(|r| r.share_hash == orphan_parent));
        assert!(result.bad_share_hashes.is_empty());
        assert!(!verified.contains(&hash_of(0)));
    }
}
