//! The configuration surface consumed by the core (§6 "Configuration surface
//! consumed"), layered with the `config` crate the way
//! `applications/minotari_node` layers its own `ApplicationConfig`.

use serde::{Deserialize, Serialize};

/// Either a fixed payout address or "ask the parent RPC for a fresh one
/// every so often" (`get_new_address`, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressConfig {
    Address(String),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Fraction of this node's own subsidy share donated to the hard-coded
    /// donation address, in percent.
    pub donation_percentage: f64,
    /// Probability that a connected worker's 0.5%-bonus share is also
    /// redirected to the donation address rather than paid to the worker.
    pub worker_fee: f64,
    /// Target seconds between shares this node mines (feeds the stratum
    /// bridge's per-connection difficulty retarget).
    pub share_rate: f64,
    pub address: AddressConfig,
    /// Extra addresses this node will also recognize as "ours" when
    /// tallying payouts for its own UI (not a core concern, but carried
    /// through since the upstream config file does).
    #[serde(default)]
    pub timeaddresses: Vec<String>,
    /// Fixed strings appended to coinbase scriptSigs.
    #[serde(default)]
    pub coinb_texts: Vec<String>,
    /// Whether to apply the punish (naughty-skip) chain-selection policy at
    /// all, or mine through naughty branches anyway.
    #[serde(default = "default_punish")]
    pub punish: bool,
    /// Merged-mining auxiliary chain RPC URLs, each run through an
    /// independent retry loop (§5 "Cancellation & timeouts").
    #[serde(default)]
    pub merged_urls: Vec<String>,
}

fn default_punish() -> bool {
    true
}

impl PoolConfig {
    /// Load layered configuration: defaults, then an optional config file,
    /// then environment variables prefixed `P2POOL_` (the same file+env
    /// layering `applications/minotari_node` builds its `config::Config` with).
    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("donation_percentage", 0.5)?
            .set_default("worker_fee", 0.0)?
            .set_default("share_rate", 10.0)?
            .set_default("punish", true)?;
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("P2POOL").separator("__"));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_config_round_trips_through_json() {
        let dynamic = AddressConfig::Dynamic;
        let json = serde_json::to_string(&dynamic).unwrap();
        assert_eq!(json, "\"dynamic\"");
        let fixed: AddressConfig = serde_json::from_str("{\"address\":\"1abc\"}").unwrap();
        assert_eq!(fixed, AddressConfig::Address("1abc".to_string()));
    }
}
