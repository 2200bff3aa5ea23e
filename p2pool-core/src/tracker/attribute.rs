//! `AttributeDelta`: the commutative monoid the tracker's skip-list
//! aggregates over ancestor ranges (§3 "Tracker forest (C5)").

use std::collections::BTreeMap;

use p2pool_encoding::{FloatingInteger, U256};
use p2pool_skiplist::Delta;

use crate::share::{Payee, Share, StaleInfo};

/// Per-payee counters accumulated over a range of shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub count: u64,
    pub orphan_count: u64,
    pub doa_count: u64,
}

impl UserStats {
    fn combine(&self, other: &Self) -> Self {
        UserStats {
            count: self.count + other.count,
            orphan_count: self.orphan_count + other.orphan_count,
            doa_count: self.doa_count + other.doa_count,
        }
    }
}

/// The tracker's skip-list delta: work (attempts), share count, and
/// stale-ness counters, both pool-wide and per payee (the latter backs
/// `get_user_stale_props`, the web-UI-adjacent aggregate named in §4.5's
/// supplement).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDelta {
    pub work: U256,
    pub count: u64,
    pub orphan_count: u64,
    pub doa_count: u64,
    pub per_user: BTreeMap<String, UserStats>,
}

impl Delta for AttributeDelta {
    fn identity() -> Self {
        AttributeDelta {
            work: U256::zero(),
            count: 0,
            orphan_count: 0,
            doa_count: 0,
            per_user: BTreeMap::new(),
        }
    }

    fn combine(&self, after: &Self) -> Self {
        let mut per_user = self.per_user.clone();
        for (k, v) in &after.per_user {
            per_user
                .entry(k.clone())
                .and_modify(|existing| *existing = existing.combine(v))
                .or_insert(*v);
        }
        AttributeDelta {
            work: self.work + after.work,
            count: self.count + after.count,
            orphan_count: self.orphan_count + after.orphan_count,
            doa_count: self.doa_count + after.doa_count,
            per_user,
        }
    }
}

/// A stable string key for a share's payout destination, used as the
/// `per_user` map key. Address shares use the address verbatim; pubkey-hash
/// shares use its lowercase hex.
pub fn payee_key(payee: &Payee) -> String {
    match payee {
        Payee::Address(addr) => addr.clone(),
        Payee::PubkeyHash(hash) => hash.0.iter().map(|b| format!("{:02x}", b)).collect(),
    }
}

/// The single-share delta contributed by `share` when it becomes a new leaf
/// of the tracker.
pub fn delta_for_share(share: &Share) -> AttributeDelta {
    let info = share.share_info();
    let work = FloatingInteger::attempts(info.bits.target());
    let (orphan, doa) = match info.share_data.stale_info {
        StaleInfo::Orphan => (1, 0),
        StaleInfo::Doa => (0, 1),
        StaleInfo::None | StaleInfo::Unknown(_) => (0, 0),
    };
    let mut per_user = BTreeMap::new();
    per_user.insert(
        payee_key(&info.share_data.payee),
        UserStats {
            count: 1,
            orphan_count: orphan,
            doa_count: doa,
        },
    );
    AttributeDelta {
        work,
        count: 1,
        orphan_count: orphan,
        doa_count: doa,
        per_user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_a_combine_no_op() {
        let mut per_user = BTreeMap::new();
        per_user.insert(
            "addr".to_string(),
            UserStats {
                count: 3,
                orphan_count: 1,
                doa_count: 0,
            },
        );
        let delta = AttributeDelta {
            work: U256::from(100u64),
            count: 3,
            orphan_count: 1,
            doa_count: 0,
            per_user,
        };
        assert_eq!(delta.combine(&AttributeDelta::identity()), delta);
        assert_eq!(AttributeDelta::identity().combine(&delta), delta);
    }
}
