//! Per-currency network parameters (§4.2/C2).
//!
//! `NetParams` is the collaborator boundary the core validates and mines
//! against without knowing anything about a specific coin's consensus rules
//! beyond what's exposed here. `padding_bugfix` is the one piece of mutable
//! state (§9's REDESIGN FLAG: "fold the global flag into `NetParams` as a
//! per-core-context atomic"); it is written only by the think loop (§4.8
//! step 7) and read by the share codec when deciding how to zero-pad an
//! output script.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use p2pool_encoding::U256;
use p2pool_hashing::{scrypt_1024_1_1, sha256d, verthash as verthash_fn, VerthashData, VERTHASH_DATA_FINGERPRINT};
use thiserror::Error;

use crate::interfaces::{ParentRpc, ParentRpcError};

#[derive(Debug, Error)]
pub enum NetParamsError {
    #[error("parent RPC error while checking readiness: {0}")]
    Rpc(#[from] ParentRpcError),
    #[error("parent daemon reports chain `{actual}`, expected `{expected}`")]
    WrongChain { expected: String, actual: String },
}

/// Per-currency constants and functions. Implementors are expected to be
/// cheap to clone (an `Arc<dyn NetParams>` is the typical way they're
/// shared across the tracker, validator and work generator).
#[async_trait]
pub trait NetParams: Send + Sync {
    fn name(&self) -> &'static str;

    /// The parent chain's proof-of-work hash of a serialized block header.
    fn pow(&self, header_bytes: &[u8]) -> U256;

    fn subsidy(&self, height: u64) -> u64;

    fn address_version(&self) -> u8;
    fn p2sh_address_version(&self) -> u8;
    fn human_readable_part(&self) -> &'static str;

    /// Parent-chain block interval, in seconds.
    fn block_period(&self) -> u64;
    fn sane_target_range(&self) -> (U256, U256);
    fn dust_threshold(&self) -> u64;
    fn dumb_scrypt_diff(&self) -> u64;

    /// Share-chain block interval, in seconds.
    fn share_period(&self) -> u64;
    /// PPLNS lookbehind, in shares: the verification depth and the payout
    /// window coincide for every built-in network (§SPEC_FULL "C2": `REAL_CHAIN_LENGTH
    /// == CHAIN_LENGTH` everywhere).
    fn chain_length(&self) -> u64;
    fn real_chain_length(&self) -> u64;
    fn target_lookbehind(&self) -> u64;
    fn spread(&self) -> u64;
    fn min_target(&self) -> U256;
    fn max_target(&self) -> U256;
    /// Whether the share store survives a restart.
    fn persist(&self) -> bool;
    fn block_max_size(&self) -> u64;
    fn block_max_weight(&self) -> u64;

    fn donation_address(&self) -> &str;

    fn verthash(&self) -> Option<&VerthashData> {
        None
    }

    fn padding_bugfix(&self) -> bool;
    fn set_padding_bugfix(&self, value: bool);

    async fn check_ready(&self, rpc: &dyn ParentRpc) -> Result<(), NetParamsError> {
        let info = rpc.get_blockchain_info().await?;
        if info.chain != self.expected_chain_name() {
            return Err(NetParamsError::WrongChain {
                expected: self.expected_chain_name().to_string(),
                actual: info.chain,
            });
        }
        Ok(())
    }

    /// The `chain` field `getblockchaininfo` is expected to report; used by
    /// the default [`NetParams::check_ready`].
    fn expected_chain_name(&self) -> &'static str;
}

macro_rules! net_params_common {
    ($ty:ident, $name:literal, $donation_address:literal) => {
        #[derive(Debug)]
        pub struct $ty {
            padding_bugfix: AtomicBool,
        }

        impl Default for $ty {
            fn default() -> Self {
                $ty {
                    padding_bugfix: AtomicBool::new(false),
                }
            }
        }

        impl $ty {
            pub fn new() -> Arc<Self> {
                Arc::new(Self::default())
            }
        }
    };
}

net_params_common!(BitcoinCash, "bitcoincash", "1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB");

#[async_trait]
impl NetParams for BitcoinCash {
    fn name(&self) -> &'static str {
        "bitcoincash"
    }

    fn pow(&self, header_bytes: &[u8]) -> U256 {
        sha256d(header_bytes)
    }

    fn subsidy(&self, height: u64) -> u64 {
        (50 * 100_000_000u64) >> ((height + 1) / 210_000)
    }

    fn address_version(&self) -> u8 {
        0
    }

    fn p2sh_address_version(&self) -> u8 {
        5
    }

    fn human_readable_part(&self) -> &'static str {
        "bitcoincash"
    }

    fn block_period(&self) -> u64 {
        600
    }

    fn sane_target_range(&self) -> (U256, U256) {
        (
            U256::MAX / U256::from(1u64 << 32) / U256::from(100_000_000u64) - U256::one(),
            U256::MAX / U256::from(1u64 << 32) - U256::one(),
        )
    }

    fn dust_threshold(&self) -> u64 {
        100_000
    }

    fn dumb_scrypt_diff(&self) -> u64 {
        1
    }

    fn share_period(&self) -> u64 {
        60
    }

    fn chain_length(&self) -> u64 {
        4320
    }

    fn real_chain_length(&self) -> u64 {
        4320
    }

    fn target_lookbehind(&self) -> u64 {
        200
    }

    fn spread(&self) -> u64 {
        3
    }

    fn min_target(&self) -> U256 {
        U256::zero()
    }

    fn max_target(&self) -> U256 {
        U256::MAX / U256::from(1u64 << 32) - U256::one()
    }

    fn persist(&self) -> bool {
        false
    }

    fn block_max_size(&self) -> u64 {
        32_000_000
    }

    fn block_max_weight(&self) -> u64 {
        128_000_000
    }

    fn donation_address(&self) -> &str {
        "1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB"
    }

    fn padding_bugfix(&self) -> bool {
        self.padding_bugfix.load(Ordering::Relaxed)
    }

    fn set_padding_bugfix(&self, value: bool) {
        self.padding_bugfix.store(value, Ordering::Relaxed);
    }

    fn expected_chain_name(&self) -> &'static str {
        "main"
    }
}

net_params_common!(BitcoinCashTestnet, "bitcoincash_testnet", "1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB");

#[async_trait]
impl NetParams for BitcoinCashTestnet {
    fn name(&self) -> &'static str {
        "bitcoincash_testnet"
    }

    fn pow(&self, header_bytes: &[u8]) -> U256 {
        sha256d(header_bytes)
    }

    fn subsidy(&self, height: u64) -> u64 {
        (50 * 100_000_000u64) >> ((height + 1) / 210_000)
    }

    fn address_version(&self) -> u8 {
        111
    }

    fn p2sh_address_version(&self) -> u8 {
        196
    }

    fn human_readable_part(&self) -> &'static str {
        "bchtest"
    }

    fn block_period(&self) -> u64 {
        600
    }

    fn sane_target_range(&self) -> (U256, U256) {
        (
            U256::MAX / U256::from(1u64 << 32) / U256::from(100_000_000u64) - U256::one(),
            U256::MAX / U256::from(1u64 << 32) - U256::one(),
        )
    }

    fn dust_threshold(&self) -> u64 {
        100_000
    }

    fn dumb_scrypt_diff(&self) -> u64 {
        1
    }

    fn share_period(&self) -> u64 {
        60
    }

    fn chain_length(&self) -> u64 {
        4320
    }

    fn real_chain_length(&self) -> u64 {
        4320
    }

    fn target_lookbehind(&self) -> u64 {
        200
    }

    fn spread(&self) -> u64 {
        3
    }

    fn min_target(&self) -> U256 {
        U256::zero()
    }

    fn max_target(&self) -> U256 {
        U256::MAX / U256::from(1u64 << 32) - U256::one()
    }

    fn persist(&self) -> bool {
        false
    }

    fn block_max_size(&self) -> u64 {
        32_000_000
    }

    fn block_max_weight(&self) -> u64 {
        128_000_000
    }

    fn donation_address(&self) -> &str {
        "1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB"
    }

    fn padding_bugfix(&self) -> bool {
        self.padding_bugfix.load(Ordering::Relaxed)
    }

    fn set_padding_bugfix(&self, value: bool) {
        self.padding_bugfix.store(value, Ordering::Relaxed);
    }

    fn expected_chain_name(&self) -> &'static str {
        "test"
    }
}

net_params_common!(LitecoinTestnet, "litecoin_testnet", "mvYnoJqBNXYjHT7YZ2Eio27KX4xAkiALsK");

#[async_trait]
impl NetParams for LitecoinTestnet {
    fn name(&self) -> &'static str {
        "litecoin_testnet"
    }

    fn pow(&self, header_bytes: &[u8]) -> U256 {
        scrypt_1024_1_1(header_bytes)
    }

    fn subsidy(&self, height: u64) -> u64 {
        (50 * 100_000_000u64) >> ((height + 1) / 840_000)
    }

    fn address_version(&self) -> u8 {
        111
    }

    fn p2sh_address_version(&self) -> u8 {
        58
    }

    fn human_readable_part(&self) -> &'static str {
        "tltc"
    }

    fn block_period(&self) -> u64 {
        150
    }

    fn sane_target_range(&self) -> (U256, U256) {
        (U256::from(1u64) << 127, (U256::from(1u64) << 240) - U256::one())
    }

    fn dust_threshold(&self) -> u64 {
        100_000_000
    }

    fn dumb_scrypt_diff(&self) -> u64 {
        65536
    }

    fn share_period(&self) -> u64 {
        4
    }

    fn chain_length(&self) -> u64 {
        400
    }

    fn real_chain_length(&self) -> u64 {
        400
    }

    fn target_lookbehind(&self) -> u64 {
        200
    }

    fn spread(&self) -> u64 {
        3
    }

    fn min_target(&self) -> U256 {
        U256::zero()
    }

    fn max_target(&self) -> U256 {
        U256::MAX / U256::from(20u64) - U256::one()
    }

    fn persist(&self) -> bool {
        false
    }

    fn block_max_size(&self) -> u64 {
        1_000_000
    }

    fn block_max_weight(&self) -> u64 {
        4_000_000
    }

    fn donation_address(&self) -> &str {
        "mvYnoJqBNXYjHT7YZ2Eio27KX4xAkiALsK"
    }

    fn padding_bugfix(&self) -> bool {
        self.padding_bugfix.load(Ordering::Relaxed)
    }

    fn set_padding_bugfix(&self, value: bool) {
        self.padding_bugfix.store(value, Ordering::Relaxed);
    }

    fn expected_chain_name(&self) -> &'static str {
        "test"
    }
}

/// Vertcoin mainnet. Verthash requires the ~1 GiB data file to be loaded
/// separately via [`Vertcoin::with_verthash_data`]; until then [`NetParams::pow`]
/// falls back to double-SHA-256 of the Verthash seed, which will never match
/// the live network (callers must load the data file before mining/validating
/// for real).
#[derive(Debug)]
pub struct Vertcoin {
    padding_bugfix: AtomicBool,
    verthash_data: Option<VerthashData>,
}

impl Default for Vertcoin {
    fn default() -> Self {
        Vertcoin {
            padding_bugfix: AtomicBool::new(false),
            verthash_data: None,
        }
    }
}

impl Vertcoin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_verthash_data(path: &std::path::Path) -> Result<Arc<Self>, p2pool_hashing::HashingError> {
        let data = VerthashData::load(path, VERTHASH_DATA_FINGERPRINT)?;
        Ok(Arc::new(Vertcoin {
            padding_bugfix: AtomicBool::new(false),
            verthash_data: Some(data),
        }))
    }
}

#[async_trait]
impl NetParams for Vertcoin {
    fn name(&self) -> &'static str {
        "vertcoin"
    }

    fn pow(&self, header_bytes: &[u8]) -> U256 {
        match &self.verthash_data {
            Some(data) => verthash_fn(header_bytes, data),
            None => sha256d(header_bytes),
        }
    }

    fn subsidy(&self, height: u64) -> u64 {
        (50 * 100_000_000u64) >> ((height + 1) / 840_000)
    }

    fn address_version(&self) -> u8 {
        71
    }

    fn p2sh_address_version(&self) -> u8 {
        5
    }

    fn human_readable_part(&self) -> &'static str {
        "vtc"
    }

    fn block_period(&self) -> u64 {
        150
    }

    fn sane_target_range(&self) -> (U256, U256) {
        (
            U256::MAX / U256::from(100_000_000_000_000_000u64) - U256::one(),
            U256::MAX / U256::from(100_000u64) - U256::one(),
        )
    }

    fn dust_threshold(&self) -> u64 {
        100_000
    }

    fn dumb_scrypt_diff(&self) -> u64 {
        256
    }

    fn share_period(&self) -> u64 {
        15
    }

    fn chain_length(&self) -> u64 {
        2880
    }

    fn real_chain_length(&self) -> u64 {
        2880
    }

    fn target_lookbehind(&self) -> u64 {
        200
    }

    fn spread(&self) -> u64 {
        12
    }

    fn min_target(&self) -> U256 {
        U256::zero()
    }

    fn max_target(&self) -> U256 {
        U256::MAX / U256::from(1u64 << 20) - U256::one()
    }

    fn persist(&self) -> bool {
        true
    }

    fn block_max_size(&self) -> u64 {
        8_000_000
    }

    fn block_max_weight(&self) -> u64 {
        32_000_000
    }

    fn donation_address(&self) -> &str {
        "VhHihrm7NXndAQEZWqrJTBCDmd4ED3bXYE"
    }

    fn verthash(&self) -> Option<&VerthashData> {
        self.verthash_data.as_ref()
    }

    fn padding_bugfix(&self) -> bool {
        self.padding_bugfix.load(Ordering::Relaxed)
    }

    fn set_padding_bugfix(&self, value: bool) {
        self.padding_bugfix.store(value, Ordering::Relaxed);
    }

    fn expected_chain_name(&self) -> &'static str {
        "main"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsidy_halves_at_the_expected_height() {
        let net = BitcoinCash::default();
        assert_eq!(net.subsidy(0), 50 * 100_000_000);
        assert_eq!(net.subsidy(209_999), 50 * 100_000_000);
        assert_eq!(net.subsidy(210_000), 25 * 100_000_000);
    }

    #[test]
    fn padding_bugfix_flag_round_trips() {
        let net = BitcoinCash::default();
        assert!(!net.padding_bugfix());
        net.set_padding_bugfix(true);
        assert!(net.padding_bugfix());
    }

    #[test]
    fn real_chain_length_never_shortens_the_verification_window() {
        for net in [
            &BitcoinCash::default() as &dyn NetParams,
            &BitcoinCashTestnet::default(),
            &LitecoinTestnet::default(),
            &Vertcoin::default(),
        ] {
            assert_eq!(net.chain_length(), net.real_chain_length());
        }
    }
}
