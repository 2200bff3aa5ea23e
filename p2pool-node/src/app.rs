//! Wiring between the core engine's collaborator traits and a concrete
//! runtime: a periodic think/store loop plus the per-connection stratum
//! session state. No business logic lives here — everything this module
//! does is hand the core the things it asked for in `interfaces.rs`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::Context;
use log::{info, warn};
use p2pool_core::{
    config::PoolConfig,
    interfaces::ParentRpc,
    net_params::NetParams,
    share::Share,
    store::ShareStore,
    think::Think,
    tracker::{Tracker, VerifiedTracker},
    validation::{check, CheckInput},
};
use p2pool_encoding::{decode_exact, U256};

pub struct App {
    pub net: Arc<dyn NetParams>,
    pub rpc: Arc<dyn ParentRpc>,
    pub config: PoolConfig,
    pub tracker: Tracker,
    pub verified: VerifiedTracker,
    pub naughty: HashMap<U256, u8>,
    pub think: Think,
    pub store: ShareStore,
}

impl App {
    pub fn new(net: Arc<dyn NetParams>, rpc: Arc<dyn ParentRpc>, config: PoolConfig, store_dir: &str) -> anyhow::Result<Self> {
        let store = ShareStore::open(store_dir, net.name().to_string()).context("opening share store")?;
        Ok(App {
            net,
            rpc,
            config,
            tracker: Tracker::new(),
            verified: VerifiedTracker::new(),
            naughty: HashMap::new(),
            think: Think::new(),
            store,
        })
    }

    /// Reload whatever shares survived a prior run (§4.10: "replay on
    /// startup") before the think loop starts making decisions.
    pub fn replay_store(&mut self) -> anyhow::Result<()> {
        let mut restored = 0usize;
        let tracker = &mut self.tracker;
        self.store
            .load(
                |hash, bytes| match decode_exact::<Share>("stored_share", &bytes) {
                    Ok(share) => {
                        if tracker.add(hash, share).is_ok() {
                            restored += 1;
                        }
                    },
                    Err(e) => warn!(target: "p2pool_node::app", "dropping malformed stored share {hash}: {e}"),
                },
                |_hash| {},
            )
            .context("loading persisted shares")?;
        info!(target: "p2pool_node::app", "restored {restored} shares from the on-disk store");
        Ok(())
    }

    /// One pass of the §4.8 think loop against the currently-known chain
    /// state. Returns the selected best head, if the forest is non-empty.
    ///
    /// The verifier this wires in re-checks each share against the tracker
    /// alone: without a live gentx/fee-cache feed this demo binary has no
    /// reconstructed payout or parent-header PoW to check against, so it
    /// passes `header_pow` as the share's own declared target (always
    /// satisfying the PoW gate) and leaves `gentx_outputs`/`known_total_fees`/
    /// `parent_block_height` empty — a real deployment wires those from the
    /// parent RPC template and the stratum session's share submissions.
    pub async fn think_once(&mut self, now: u64) -> Option<U256> {
        let header_pow_of_heads = Default::default();
        let net = self.net.clone();
        let donation_address = net.donation_address().to_string();
        let naughty_snapshot = self.naughty.clone();
        let mut verify = move |tracker: &Tracker, hash: U256| {
            let share = tracker.get(&hash).expect("verify only runs for hashes already in the tracker");
            let info = share.share_info();
            let parent_naughty = info
                .share_data
                .previous_share_hash
                .and_then(|p| naughty_snapshot.get(&p).copied());
            let input = CheckInput {
                hash,
                share,
                parent_naughty,
                header_pow: info.bits.target(),
                gentx_outputs: &BTreeMap::new(),
                known_total_fees: None,
                parent_block_height: None,
                donation_address: &donation_address,
            };
            check(&input, tracker, net.as_ref(), now)
        };

        let result = self.think.think(
            &self.tracker,
            &mut self.verified,
            &mut self.naughty,
            self.net.as_ref(),
            now,
            0,
            &header_pow_of_heads,
            &mut verify,
        );
        if result.best_head.is_none() {
            warn!(target: "p2pool_node::app", "think loop has no chain to select a head from yet");
        }
        result.best_head
    }
}
