//! A `ParentRpc` stub with no real daemon behind it, so this binary can
//! start and run its think loop without a live node to talk to. A real
//! deployment swaps this for an RPC client speaking the parent daemon's
//! actual wire protocol.

use async_trait::async_trait;
use p2pool_core::interfaces::{BlockchainInfo, ParentRpc, ParentRpcError, Template};
use p2pool_encoding::U256;

#[derive(Debug, Default)]
pub struct DemoRpc;

#[async_trait]
impl ParentRpc for DemoRpc {
    async fn get_work(&self) -> Result<Template, ParentRpcError> {
        Err(ParentRpcError::Unavailable("no parent daemon wired into this demo binary".to_string()))
    }

    async fn submit_block(&self, _block: &[u8], _force: bool) -> Result<(), ParentRpcError> {
        Err(ParentRpcError::Unavailable("no parent daemon wired into this demo binary".to_string()))
    }

    async fn get_new_address(&self, _label: &str) -> Result<String, ParentRpcError> {
        Err(ParentRpcError::Unavailable("no parent daemon wired into this demo binary".to_string()))
    }

    async fn get_auxblock(&self) -> Result<Option<Vec<u8>>, ParentRpcError> {
        Ok(None)
    }

    async fn create_auxblock(&self, _address: &str) -> Result<Vec<u8>, ParentRpcError> {
        Err(ParentRpcError::Unavailable("no parent daemon wired into this demo binary".to_string()))
    }

    async fn submit_auxblock(&self, _hash: &str, _auxpow: &[u8]) -> Result<bool, ParentRpcError> {
        Ok(false)
    }

    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, ParentRpcError> {
        Ok(BlockchainInfo {
            chain: "bitcoincash_testnet".to_string(),
        })
    }

    async fn get_block_header(&self, _hash: U256) -> Result<bool, ParentRpcError> {
        Ok(false)
    }
}
