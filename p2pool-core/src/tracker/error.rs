use p2pool_encoding::U256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("share {0:#x} already present")]
    Duplicate(U256),
    #[error("share references unknown parent {0:#x}")]
    MissingParent(U256),
}
