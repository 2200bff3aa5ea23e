//! A thin application binary wiring the share-chain engine (`p2pool_core`)
//! to a parent RPC and the stratum bridge (`p2pool_stratum`).
//!
//! This binary owns no business logic of its own: everything interesting
//! happens in the library crates it links. It exists only to demonstrate
//! the wiring a real deployment would flesh out with a concrete parent RPC
//! client and peer transport.

mod app;
mod demo_rpc;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use log::info;
use p2pool_core::net_params::BitcoinCashTestnet;

use crate::{app::App, demo_rpc::DemoRpc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1);
    let config = p2pool_core::PoolConfig::load(config_path.as_deref()).context("loading pool configuration")?;

    let net = BitcoinCashTestnet::new();
    let rpc: Arc<dyn p2pool_core::interfaces::ParentRpc> = Arc::new(DemoRpc::default());

    let store_dir = std::env::var("P2POOL_STORE_DIR").unwrap_or_else(|_| "./p2pool-data".to_string());
    let mut app = App::new(net, rpc, config, &store_dir)?;
    app.replay_store().context("replaying on-disk share store")?;

    info!(target: "p2pool_node", "p2pool-node starting on {} with {} shares restored", app.net.name(), app.tracker.len());

    let mut ticker = tokio::time::interval(Duration::from_secs(app.net.share_period().max(1)));
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = now_unix();
                if let Some(head) = app.think_once(now).await {
                    info!(target: "p2pool_node", "think loop selected head {head}");
                }
            }
            _ = &mut shutdown => {
                info!(target: "p2pool_node", "received ctrl-c, shutting down");
                break;
            }
        }
    }
    Ok(())
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
