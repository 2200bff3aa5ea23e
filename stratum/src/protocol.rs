//! The stratum wire protocol (§4.11, §6): one JSON object per line, method
//! names dispatched the way every stratum pool implements it (positional
//! array `params`, not a named-field object) rather than a generic
//! JSON-RPC 2.0 request shape.

use serde_json::{json, Value};

use crate::error::StratumError;

/// An inbound `mining.*` call. `id` is echoed back verbatim in the response
/// line; stratum notifications (`id: null`) are never inbound.
#[derive(Debug, Clone, PartialEq)]
pub enum StratumRequest {
    Subscribe {
        id: Value,
        user_agent: Option<String>,
        session_id: Option<String>,
    },
    Authorize {
        id: Value,
        username: String,
        password: Option<String>,
    },
    /// BIP310 `mining.configure`; only the `version-rolling` extension is
    /// understood, everything else is acknowledged as unsupported.
    Configure {
        id: Value,
        extensions: Vec<String>,
        version_rolling_mask: Option<u32>,
    },
    Submit {
        id: Value,
        username: String,
        job_id: String,
        extranonce2: String,
        ntime: u32,
        nonce: u32,
        /// Present only when version-rolling was negotiated.
        version_bits: Option<u32>,
    },
}

impl StratumRequest {
    pub fn id(&self) -> &Value {
        match self {
            StratumRequest::Subscribe { id, .. }
            | StratumRequest::Authorize { id, .. }
            | StratumRequest::Configure { id, .. }
            | StratumRequest::Submit { id, .. } => id,
        }
    }

    /// Parse a single line of the protocol (already stripped of its
    /// trailing newline).
    pub fn parse(line: &str) -> Result<Self, StratumError> {
        let value: Value = serde_json::from_str(line)?;
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| StratumError::BadParams("request", "a `method` string field"))?;
        let params = value.get("params").cloned().unwrap_or(Value::Array(vec![]));
        let params = params.as_array().cloned().ok_or(StratumError::BadParams("params", "an array"))?;

        match method {
            "mining.subscribe" => Ok(StratumRequest::Subscribe {
                id,
                user_agent: params.first().and_then(Value::as_str).map(str::to_string),
                session_id: params.get(1).and_then(Value::as_str).map(str::to_string),
            }),
            "mining.authorize" => {
                let username = params
                    .first()
                    .and_then(Value::as_str)
                    .ok_or(StratumError::BadParams("mining.authorize", "[username, password?]"))?
                    .to_string();
                Ok(StratumRequest::Authorize {
                    id,
                    username,
                    password: params.get(1).and_then(Value::as_str).map(str::to_string),
                })
            },
            "mining.configure" => {
                let extensions: Vec<String> = params
                    .first()
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                let version_rolling_mask = params
                    .get(1)
                    .and_then(|opts| opts.get("version-rolling.mask"))
                    .and_then(Value::as_str)
                    .and_then(|s| u32::from_str_radix(s, 16).ok());
                Ok(StratumRequest::Configure {
                    id,
                    extensions,
                    version_rolling_mask,
                })
            },
            "mining.submit" => {
                let get_str = |i: usize| params.get(i).and_then(Value::as_str);
                let username = get_str(0)
                    .ok_or(StratumError::BadParams(
                        "mining.submit",
                        "[username, job_id, extranonce2, ntime, nonce, version_bits?]",
                    ))?
                    .to_string();
                let job_id = get_str(1)
                    .ok_or(StratumError::BadParams("mining.submit", "job_id"))?
                    .to_string();
                let extranonce2 = get_str(2)
                    .ok_or(StratumError::BadParams("mining.submit", "extranonce2"))?
                    .to_string();
                let ntime = get_str(3)
                    .and_then(|s| u32::from_str_radix(s, 16).ok())
                    .ok_or(StratumError::BadParams("mining.submit", "ntime (hex)"))?;
                let nonce = get_str(4)
                    .and_then(|s| u32::from_str_radix(s, 16).ok())
                    .ok_or(StratumError::BadParams("mining.submit", "nonce (hex)"))?;
                let version_bits = get_str(5).and_then(|s| u32::from_str_radix(s, 16).ok());
                Ok(StratumRequest::Submit {
                    id,
                    username,
                    job_id,
                    extranonce2,
                    ntime,
                    nonce,
                    version_bits,
                })
            },
            other => Err(StratumError::UnknownMethod(other.to_string())),
        }
    }
}

/// An outbound line: either a response to a request (keyed by `id`) or a
/// fire-and-forget notification (`mining.notify`/`mining.set_difficulty`/
/// `mining.set_version_mask`).
#[derive(Debug, Clone, PartialEq)]
pub enum StratumNotify {
    SetDifficulty { difficulty: f64 },
    SetVersionMask { mask: u32 },
    Notify {
        job_id: String,
        prevhash: String,
        coinb1: String,
        coinb2: String,
        merkle_branch: Vec<String>,
        version: u32,
        nbits: u32,
        ntime: u32,
        clean_jobs: bool,
    },
}

impl StratumNotify {
    pub fn to_line(&self) -> String {
        let value = match self {
            StratumNotify::SetDifficulty { difficulty } => json!({
                "id": Value::Null,
                "method": "mining.set_difficulty",
                "params": [difficulty],
            }),
            StratumNotify::SetVersionMask { mask } => json!({
                "id": Value::Null,
                "method": "mining.set_version_mask",
                "params": [format!("{mask:08x}")],
            }),
            StratumNotify::Notify {
                job_id,
                prevhash,
                coinb1,
                coinb2,
                merkle_branch,
                version,
                nbits,
                ntime,
                clean_jobs,
            } => json!({
                "id": Value::Null,
                "method": "mining.notify",
                "params": [
                    job_id, prevhash, coinb1, coinb2, merkle_branch,
                    format!("{version:08x}"), format!("{nbits:08x}"), format!("{ntime:08x}"), clean_jobs,
                ],
            }),
        };
        value.to_string()
    }
}

/// A successful response line for request `id`.
pub fn response_line(id: &Value, result: Value) -> String {
    json!({ "id": id, "result": result, "error": Value::Null }).to_string()
}

/// An error response line for request `id`.
pub fn error_line(id: &Value, code: i64, message: &str) -> String {
    json!({ "id": id, "result": Value::Null, "error": [code, message, Value::Null] }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe() {
        let line = r#"{"id":1,"method":"mining.subscribe","params":["cgminer/4.10.0"]}"#;
        let req = StratumRequest::parse(line).unwrap();
        assert_eq!(
            req,
            StratumRequest::Subscribe {
                id: json!(1),
                user_agent: Some("cgminer/4.10.0".to_string()),
                session_id: None,
            }
        );
    }

    #[test]
    fn parses_submit_with_version_bits() {
        let line = r#"{"id":4,"method":"mining.submit","params":["user.worker","job1","00000000","5f5e1000","deadbeef","20000000"]}"#;
        let req = StratumRequest::parse(line).unwrap();
        assert_eq!(
            req,
            StratumRequest::Submit {
                id: json!(4),
                username: "user.worker".to_string(),
                job_id: "job1".to_string(),
                extranonce2: "00000000".to_string(),
                ntime: 0x5f5e1000,
                nonce: 0xdeadbeef,
                version_bits: Some(0x2000_0000),
            }
        );
    }

    #[test]
    fn unknown_method_is_reported() {
        let line = r#"{"id":1,"method":"mining.frobnicate","params":[]}"#;
        let err = StratumRequest::parse(line).unwrap_err();
        assert!(matches!(err, StratumError::UnknownMethod(m) if m == "mining.frobnicate"));
    }

    #[test]
    fn notify_line_hex_encodes_numeric_fields() {
        let notify = StratumNotify::Notify {
            job_id: "j1".to_string(),
            prevhash: "aa".repeat(32),
            coinb1: "01".to_string(),
            coinb2: "02".to_string(),
            merkle_branch: vec![],
            version: 1,
            nbits: 0x1d00ffff,
            ntime: 100,
            clean_jobs: true,
        };
        let line = notify.to_line();
        assert!(line.contains("\"00000001\""));
        assert!(line.contains("\"1d00ffff\""));
    }
}
