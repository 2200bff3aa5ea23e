//! The two collaborator traits the core consumes rather than owns (§6):
//! the parent-chain RPC client and the peer-to-peer transport. Both are
//! `async_trait`s, the teacher's own choice for its comms-facing interfaces
//! (`base_node::comms_interface`).

use async_trait::async_trait;
use p2pool_encoding::U256;
use thiserror::Error;

/// A block template as reported by the parent chain daemon (`getblocktemplate`
/// in spirit). `transaction_fees[i]` corresponds to `transactions[i]` and is
/// `None` when the daemon hasn't computed it (mirrors upstream's
/// `fee_cache`/`known_txs` partial-knowledge handling, §4.7 step 5 and §9's
/// open question).
#[derive(Debug, Clone)]
pub struct Template {
    pub version: u32,
    pub prev_block: U256,
    pub bits: p2pool_encoding::FloatingInteger,
    pub height: u64,
    pub coinbaseflags: Vec<u8>,
    pub rules: Vec<String>,
    pub transactions: Vec<Vec<u8>>,
    pub transaction_hashes: Vec<U256>,
    pub transaction_fees: Vec<Option<u64>>,
    pub subsidy: u64,
    pub last_update: u64,
}

#[derive(Debug, Clone)]
pub struct BlockchainInfo {
    pub chain: String,
}

#[derive(Debug, Error)]
pub enum ParentRpcError {
    #[error("parent RPC unavailable: {0}")]
    Unavailable(String),
    #[error("parent RPC rejected the request: {0}")]
    Rejected(String),
}

/// The parent-chain daemon, consumed as an opaque oracle (§6). Retries and
/// backoff are the caller's responsibility (§5's "Cancellation & timeouts");
/// this trait only describes the request/response shape.
#[async_trait]
pub trait ParentRpc: Send + Sync {
    async fn get_work(&self) -> Result<Template, ParentRpcError>;

    async fn submit_block(&self, block: &[u8], force: bool) -> Result<(), ParentRpcError>;

    async fn get_new_address(&self, label: &str) -> Result<String, ParentRpcError>;

    async fn get_auxblock(&self) -> Result<Option<Vec<u8>>, ParentRpcError>;

    async fn create_auxblock(&self, address: &str) -> Result<Vec<u8>, ParentRpcError>;

    async fn submit_auxblock(&self, hash: &str, auxpow: &[u8]) -> Result<bool, ParentRpcError>;

    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, ParentRpcError>;

    async fn get_block_header(&self, hash: U256) -> Result<bool, ParentRpcError>;
}

/// Direction of an accounted byte transfer, for `traffic_happened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficDirection {
    Sent,
    Received,
}

/// The peer-to-peer transport, consumed as "deliver share"/"request share by
/// hash"/"broadcast share" (§6). Wire framing and peer discovery live
/// entirely on the other side of this trait.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    type PeerAddr: Send + Sync + Clone + std::fmt::Debug + Eq + std::hash::Hash;

    async fn broadcast_share(&self, hash: U256);

    async fn request_share(&self, peer: &Self::PeerAddr, hash: U256) -> Result<Vec<u8>, ParentRpcError>;

    /// Signal that `peer` misbehaved; the transport decides whether/how long
    /// to ban it (§6: "Peer-misbehavior outcome is a signal returned to the
    /// transport").
    fn report_misbehaving(&self, peer: &Self::PeerAddr, reason: &str);

    fn traffic_happened(&self, direction: TrafficDirection, bytes: usize);
}
