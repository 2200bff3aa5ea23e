use std::{
    collections::HashMap,
    hash::Hash,
};

use crate::delta::Delta;

/// Binary-lifted ancestor pointers over a forest of nodes, each carrying a
/// [`Delta`] accumulated along the way.
///
/// `K` is typically a share hash; `D` is the aggregate being tracked (an
/// `AttributeDelta` for the tracker, a weights tuple for PPLNS). A node with
/// no parent (a tail/root) is inserted via [`SkipList::insert_root`]; every
/// other node is inserted via [`SkipList::insert`] once its parent is already
/// present.
#[derive(Debug, Clone)]
pub struct SkipList<K, D> {
    // up[h] = [(2^0-th ancestor, delta over (ancestor, h]), (2^1-th ancestor, ...), ...]
    up: HashMap<K, Vec<(K, D)>>,
    height: HashMap<K, u64>,
}

impl<K, D> Default for SkipList<K, D> {
    fn default() -> Self {
        SkipList {
            up: HashMap::new(),
            height: HashMap::new(),
        }
    }
}

impl<K, D> SkipList<K, D>
where
    K: Eq + Hash + Clone,
    D: Delta,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, h: &K) -> bool {
        self.height.contains_key(h)
    }

    pub fn height(&self, h: &K) -> Option<u64> {
        self.height.get(h).copied()
    }

    /// Insert a node with no parent (a tail of the forest).
    pub fn insert_root(&mut self, h: K) {
        self.up.insert(h.clone(), Vec::new());
        self.height.insert(h, 0);
    }

    /// Insert `h` whose parent `parent` is already present, contributing
    /// `own_delta` (the delta for the single edge `parent -> h`).
    ///
    /// Panics if `parent` has not been inserted yet; callers (the tracker)
    /// only ever insert in arrival order after checking the parent is known,
    /// so this is a programmer error rather than a runtime condition.
    pub fn insert(&mut self, h: K, parent: K, own_delta: D) {
        let parent_height = *self
            .height
            .get(&parent)
            .expect("skip-list parent must be inserted before its child");
        self.height.insert(h.clone(), parent_height + 1);

        let mut levels: Vec<(K, D)> = vec![(parent, own_delta)];
        loop {
            let level = levels.len() - 1;
            let (ancestor, delta) = &levels[level];
            let Some(ancestor_levels) = self.up.get(ancestor) else {
                break;
            };
            let Some((next_ancestor, next_delta)) = ancestor_levels.get(level) else {
                break;
            };
            let combined = next_delta.combine(delta);
            levels.push((next_ancestor.clone(), combined));
        }
        self.up.insert(h, levels);
    }

    /// Remove a node's own bookkeeping. Skip-list pointers of nodes that
    /// jump *through* `h` are left as-is (pointing past where `h` used to
    /// be is harmless; the forest only ever forgets shares that are no
    /// longer reachable from any current head, at which point nothing
    /// will walk through them again).
    pub fn remove(&mut self, h: &K) {
        self.up.remove(h);
        self.height.remove(h);
    }

    /// The `n`-th ancestor of `h` (`n == 0` returns `h` itself).
    pub fn nth_ancestor(&self, h: &K, n: u64) -> Option<K> {
        if n == 0 {
            return self.height.get(h).map(|_| h.clone());
        }
        let mut cur = h.clone();
        let mut remaining = n;
        while remaining > 0 {
            let level = (63 - remaining.leading_zeros()) as usize;
            let levels = self.up.get(&cur)?;
            let (ancestor, _) = levels.get(level)?;
            cur = ancestor.clone();
            remaining -= 1u64 << level;
        }
        Some(cur)
    }

    /// The combined delta over the half-open range `(to, from]`, i.e. every
    /// edge walking from `to` down to `from`. `to` must be an ancestor of
    /// `from` (or equal to it, in which case the result is [`Delta::identity`]).
    pub fn delta(&self, from: &K, to: &K) -> Option<D> {
        let height_from = *self.height.get(from)?;
        let height_to = *self.height.get(to)?;
        if height_to > height_from {
            return None;
        }
        let n = height_from - height_to;
        if n == 0 {
            return Some(D::identity());
        }
        let mut cur = from.clone();
        let mut remaining = n;
        let mut acc: Option<D> = None;
        while remaining > 0 {
            let level = (63 - remaining.leading_zeros()) as usize;
            let levels = self.up.get(&cur)?;
            let (ancestor, delta) = levels.get(level)?;
            acc = Some(match acc {
                None => delta.clone(),
                Some(prev) => delta.combine(&prev),
            });
            cur = ancestor.clone();
            remaining -= 1u64 << level;
        }
        debug_assert!(cur == *to, "delta range did not terminate at the requested ancestor");
        acc
    }

    /// The per-level `(ancestor, delta)` pairs for `h`, largest jump last.
    /// Exposed so callers that need a bespoke greedy walk (the PPLNS weights
    /// accumulator's bounded-cap walk) can inspect candidate jumps without
    /// re-deriving them.
    pub fn levels(&self, h: &K) -> Option<&[(K, D)]> {
        self.up.get(h).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Sum(i64);

    impl Delta for Sum {
        fn identity() -> Self {
            Sum(0)
        }

        fn combine(&self, after: &Self) -> Self {
            Sum(self.0 + after.0)
        }
    }

    fn build_chain(n: u64) -> SkipList<u64, Sum> {
        let mut sl = SkipList::new();
        sl.insert_root(0);
        for i in 1..=n {
            sl.insert(i, i - 1, Sum(i as i64));
        }
        sl
    }

    #[test]
    fn nth_ancestor_matches_repeated_parent_walk() {
        let sl = build_chain(300);
        for h in [1u64, 50, 128, 255, 300] {
            for n in [0u64, 1, 5, 17, 64, h] {
                if n > h {
                    continue;
                }
                assert_eq!(sl.nth_ancestor(&h, n), Some(h - n), "h={h} n={n}");
            }
        }
    }

    #[test]
    fn delta_sums_match_naive_sum() {
        let sl = build_chain(300);
        for (from, to) in [(300u64, 0u64), (50, 10), (128, 127), (17, 17)] {
            let naive: i64 = ((to + 1)..=from).sum();
            assert_eq!(sl.delta(&from, &to), Some(Sum(naive)), "from={from} to={to}");
        }
    }

    #[test]
    fn monoid_associativity_across_a_split_point() {
        let sl = build_chain(300);
        let whole = sl.delta(&300, &0).unwrap();
        let a = sl.delta(&300, &150).unwrap();
        let b = sl.delta(&150, &0).unwrap();
        assert_eq!(whole, a.combine(&b));
    }

    #[test]
    fn delta_rejects_non_ancestor_ordering() {
        let sl = build_chain(10);
        assert_eq!(sl.delta(&3, &7), None);
    }

    #[test]
    fn remove_drops_bookkeeping_without_panicking_neighbours() {
        let mut sl = build_chain(10);
        sl.remove(&5);
        assert!(!sl.contains(&5));
        // Nodes built before the removal still answer queries that don't
        // route back through 5's own bookkeeping.
        assert_eq!(sl.nth_ancestor(&10, 10), Some(0));
    }
}
