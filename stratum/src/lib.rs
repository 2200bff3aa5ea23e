//! The miner-facing stratum bridge (§4.11, §6): JSON-RPC line protocol,
//! username parsing, per-connection difficulty retarget, and BIP310
//! version-rolling mask negotiation.
//!
//! Line framing (where a connection's bytes are split into lines) and
//! socket I/O are the node-wiring layer's job (§1's Non-goals: "the
//! miner-facing stratum line framing" is out of core scope) — this crate
//! only knows how to turn one already-split line into a [`protocol::StratumRequest`]
//! and a line back out.

pub mod difficulty;
pub mod error;
pub mod protocol;
pub mod session;
pub mod username;
pub mod version_rolling;

pub use difficulty::DifficultyTracker;
pub use error::StratumError;
pub use protocol::{StratumNotify, StratumRequest};
pub use session::{SessionEvent, StratumSession};
pub use username::ParsedUsername;
