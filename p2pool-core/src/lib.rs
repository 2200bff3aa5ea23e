//! The p2pool share-chain engine: share format, tracker, chain selection,
//! payout computation and persistence.
//!
//! This crate owns none of its own I/O — parent-chain RPC and peer
//! transport are collaborator traits ([`interfaces::ParentRpc`],
//! [`interfaces::PeerTransport`]) a binary crate wires in.

pub mod config;
pub mod interfaces;
pub mod net_params;
pub mod share;
pub mod store;
pub mod think;
pub mod tracker;
pub mod validation;
pub mod weights;
pub mod work;

pub use config::PoolConfig;
pub use net_params::{NetParams, NetParamsError};
pub use store::{ShareStore, StoreError};
pub use think::{Think, ThinkResult, ThinkState};
pub use tracker::{Tracker, VerifiedTracker};
pub use validation::{check, CheckError, CheckInput, CheckedShare};
