use thiserror::Error;

#[derive(Debug, Error)]
pub enum StratumError {
    #[error("malformed JSON-RPC line: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown stratum method `{0}`")]
    UnknownMethod(String),

    #[error("`{0}` expects params shaped as {1}")]
    BadParams(&'static str, &'static str),

    #[error("username `{0}` is not of the form user[_|.worker][+pseudodiff][/sharediff]")]
    BadUsername(String),

    #[error("invalid version mask")]
    InvalidVersionMask,

    #[error("share difficulty below the session's current pseudodiff")]
    DifficultyTooLow,
}

/// The JSON-RPC error code the work-assembly path refuses with when the
/// parent template isn't ready yet (§7 "stratum work-assembly refuses with
/// JSON-RPC code `-12345`").
pub const WORK_NOT_READY_CODE: i64 = -12345;
