//! The in-memory share forest (§3/§4.5, C5): height/chain queries and
//! skip-list-backed aggregates over ancestor ranges.

mod attribute;
mod error;

use std::collections::{HashMap, HashSet};

use p2pool_encoding::U256;
use p2pool_skiplist::SkipList;

pub use attribute::{delta_for_share, payee_key, AttributeDelta, UserStats};
pub use error::TrackerError;

use crate::share::Share;

/// A forest of shares keyed by hash. `reverse[h]` is the set of `h`'s direct
/// children; `heads` are hashes with no recorded child; `tails` are hashes
/// with no recorded parent (pending shares aside, every parent is either a
/// tail or itself tracked — §4.5's invariant).
#[derive(Debug, Default)]
pub struct Tracker {
    items: HashMap<U256, Share>,
    reverse: HashMap<U256, HashSet<U256>>,
    heads: HashSet<U256>,
    tails: HashSet<U256>,
    skiplist: SkipList<U256, AttributeDelta>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, h: &U256) -> bool {
        self.items.contains_key(h)
    }

    pub fn get(&self, h: &U256) -> Option<&Share> {
        self.items.get(h)
    }

    pub fn heads(&self) -> impl Iterator<Item = &U256> {
        self.heads.iter()
    }

    pub fn tails(&self) -> impl Iterator<Item = &U256> {
        self.tails.iter()
    }

    pub fn children(&self, h: &U256) -> impl Iterator<Item = &U256> {
        self.reverse.get(h).into_iter().flatten()
    }

    /// Insert `share`, keyed by `hash`. Two shares with the same hash are
    /// de-duplicated at insert (§5 "Ordering"): inserting an already-present
    /// hash is an error rather than a silent no-op, so callers notice a
    /// retransmission instead of masking a bug.
    pub fn add(&mut self, hash: U256, share: Share) -> Result<(), TrackerError> {
        if self.items.contains_key(&hash) {
            return Err(TrackerError::Duplicate(hash));
        }
        match share.previous_share_hash() {
            None => {
                self.skiplist.insert_root(hash);
                self.tails.insert(hash);
            }
            Some(parent) => {
                if !self.skiplist.contains(&parent) {
                    return Err(TrackerError::MissingParent(parent));
                }
                let delta = delta_for_share(&share);
                self.skiplist.insert(hash, parent, delta);
                self.reverse.entry(parent).or_default().insert(hash);
                self.heads.remove(&parent);
            }
        }
        self.heads.insert(hash);
        self.items.insert(hash, share);
        Ok(())
    }

    /// Drop `h`'s own bookkeeping. Children already recorded keep their
    /// skip-list pointers (harmless dangling jumps, per the skip-list's own
    /// contract) but are no longer reachable through `reverse`/`heads`
    /// traversal from `h` — callers only call this once `h` is unreachable
    /// from every current head.
    pub fn remove(&mut self, h: &U256) {
        if let Some(share) = self.items.remove(h) {
            if let Some(parent) = share.previous_share_hash() {
                if let Some(siblings) = self.reverse.get_mut(&parent) {
                    siblings.remove(h);
                }
            }
        }
        self.reverse.remove(h);
        self.heads.remove(h);
        self.tails.remove(h);
        self.skiplist.remove(h);
    }

    pub fn get_height_and_last(&self, h: &U256) -> Option<(u64, U256)> {
        let height = self.skiplist.height(h)?;
        let last = self.skiplist.nth_ancestor(h, height)?;
        Some((height, last))
    }

    pub fn get_nth_parent_hash(&self, h: &U256, n: u64) -> Option<U256> {
        self.skiplist.nth_ancestor(h, n)
    }

    /// Up to `n` ancestors starting at (and including) `h`, oldest-bounded
    /// lazily: iteration stops early if a tail is reached before `n` items.
    pub fn get_chain(&self, h: U256, n: u64) -> Chain<'_> {
        Chain {
            tracker: self,
            next: Some(h),
            remaining: n,
        }
    }

    pub fn get_delta(&self, from: &U256, to: &U256) -> Option<AttributeDelta> {
        self.skiplist.delta(from, to)
    }

    /// Total work from `h` down to its tail.
    pub fn get_work(&self, h: &U256) -> Option<U256> {
        let (_, last) = self.get_height_and_last(h)?;
        self.get_delta(h, &last).map(|d| d.work)
    }

    /// Attempts-per-second estimate over the last `lookbehind` shares ending
    /// at `h` (grounded on `get_pool_attempts_per_second` in the original
    /// source; feeds C9's `pre_target` estimate and C8's tail `score`).
    pub fn get_average_strength(&self, h: &U256, lookbehind: u64) -> Option<f64> {
        let height = self.skiplist.height(h)?;
        let n = lookbehind.min(height);
        if n == 0 {
            return None;
        }
        let ancestor = self.skiplist.nth_ancestor(h, n)?;
        let delta = self.skiplist.delta(h, &ancestor)?;
        let t_h = self.items.get(h)?.share_info().timestamp;
        let t_a = self.items.get(&ancestor)?.share_info().timestamp;
        let dt = t_h.saturating_sub(t_a).max(1) as f64;
        let work = delta.work.min(U256::from(u128::MAX)).as_u128() as f64;
        Some(work / dt)
    }

    pub fn get_stale_counts(&self, h: &U256, lookbehind: u64) -> Option<(u64, u64, u64)> {
        let height = self.skiplist.height(h)?;
        let n = lookbehind.min(height);
        let ancestor = self.skiplist.nth_ancestor(h, n)?;
        let delta = self.skiplist.delta(h, &ancestor)?;
        Some((delta.count, delta.orphan_count, delta.doa_count))
    }

    /// Per-payee `(orphan_rate, doa_rate)` over the last `lookbehind` shares,
    /// the aggregate the upstream web UI surfaces per miner (§4.5 supplement).
    pub fn get_user_stale_props(&self, h: &U256, lookbehind: u64) -> Option<HashMap<String, (f64, f64)>> {
        let height = self.skiplist.height(h)?;
        let n = lookbehind.min(height);
        let ancestor = self.skiplist.nth_ancestor(h, n)?;
        let delta = self.skiplist.delta(h, &ancestor)?;
        Some(
            delta
                .per_user
                .into_iter()
                .map(|(addr, stats)| {
                    let count = stats.count.max(1) as f64;
                    (addr, (stats.orphan_count as f64 / count, stats.doa_count as f64 / count))
                })
                .collect(),
        )
    }
}

/// The `verified` subtracker (§4.5): "a subset forest with its own heads/
/// tails; `verified.add` assumes `add`; neither ever implicitly validates."
/// It never stores a [`Share`] itself — only which hashes already present in
/// the full [`Tracker`] have passed [`crate::validation::check`] — so the
/// think loop can tell "known" from "known and verified" apart.
#[derive(Debug, Default)]
pub struct VerifiedTracker {
    verified: HashSet<U256>,
    reverse: HashMap<U256, HashSet<U256>>,
    heads: HashSet<U256>,
    tails: HashSet<U256>,
}

impl VerifiedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.verified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verified.is_empty()
    }

    pub fn contains(&self, h: &U256) -> bool {
        self.verified.contains(h)
    }

    pub fn heads(&self) -> impl Iterator<Item = &U256> {
        self.heads.iter()
    }

    pub fn tails(&self) -> impl Iterator<Item = &U256> {
        self.tails.iter()
    }

    /// Mark `hash` verified. Assumes `hash` is already present in `tracker`
    /// (i.e. `Tracker::add` has run for it) — this never itself calls
    /// `check`, it only records that the caller already did. A no-op if
    /// `hash` is already marked verified.
    pub fn add(&mut self, tracker: &Tracker, hash: U256) {
        if self.verified.contains(&hash) {
            return;
        }
        match tracker.get(&hash).and_then(Share::previous_share_hash) {
            Some(parent) if self.verified.contains(&parent) => {
                self.reverse.entry(parent).or_default().insert(hash);
                self.heads.remove(&parent);
            }
            _ => {
                // Either a root share or a share whose parent hasn't been
                // verified yet: `hash` starts a new component of the
                // verified subset forest.
                self.tails.insert(hash);
            }
        }
        self.verified.insert(hash);
        self.heads.insert(hash);
    }

    /// Drop `h`'s own bookkeeping, mirroring `Tracker::remove`.
    pub fn remove(&mut self, h: &U256) {
        if !self.verified.remove(h) {
            return;
        }
        self.reverse.remove(h);
        self.heads.remove(h);
        self.tails.remove(h);
    }
}

pub struct Chain<'a> {
    tracker: &'a Tracker,
    next: Option<U256>,
    remaining: u64,
}

impl<'a> Iterator for Chain<'a> {
    type Item = U256;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.tracker.get(&current).and_then(Share::previous_share_hash);
        Some(current)
    }
}
