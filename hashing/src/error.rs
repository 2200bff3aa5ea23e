use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashingError {
    #[error("hash-link prefix does not end with the expected constant suffix")]
    PrefixMissingConstEnding,

    #[error("verthash data file fingerprint mismatch: expected {expected}, got {actual}")]
    VerthashFingerprintMismatch { expected: String, actual: String },

    #[error("failed to memory-map verthash data file at {path}: {source}")]
    VerthashDataIo {
        path: String,
        #[source]
        source: std::sync::Arc<std::io::Error>,
    },
}
