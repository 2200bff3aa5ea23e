//! Per-connection stratum session state (§4.11): subscribe/authorize/
//! configure/submit folded into one state machine so a transport only has
//! to hand lines in and get lines + structured events back out.

use crate::{
    difficulty::DifficultyTracker,
    error::StratumError,
    protocol::{error_line, response_line, StratumRequest},
    username::{self, ParsedUsername},
    version_rolling,
};

/// What happened as a result of feeding one [`StratumRequest`] to a
/// [`StratumSession`], beyond the response line(s) already queued.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Subscribed,
    Authorized { username: ParsedUsername },
    Configured { version_mask: u32 },
    Submitted {
        username: ParsedUsername,
        job_id: String,
        extranonce2: String,
        ntime: u32,
        nonce: u32,
        version_bits: Option<u32>,
    },
}

pub struct StratumSession {
    extranonce1: String,
    extranonce2_size: usize,
    version_mask: u32,
    difficulty: DifficultyTracker,
    sane_min: f64,
    sane_max: f64,
}

impl StratumSession {
    pub fn new(extranonce1: String, extranonce2_size: usize, initial_difficulty: f64, target_seconds: f64, sane_min: f64, sane_max: f64) -> Self {
        StratumSession {
            extranonce1,
            extranonce2_size,
            version_mask: 0,
            difficulty: DifficultyTracker::new(initial_difficulty, target_seconds),
            sane_min,
            sane_max,
        }
    }

    pub fn current_difficulty(&self) -> f64 {
        self.difficulty.difficulty()
    }

    pub fn version_mask(&self) -> u32 {
        self.version_mask
    }

    /// Process one request, returning the response line to write back plus
    /// any structured event the caller (the node-wiring layer) should act
    /// on, e.g. forwarding a submitted share into validation.
    pub fn handle(&mut self, request: &StratumRequest, now: u64) -> Result<(String, Option<SessionEvent>), StratumError> {
        match request {
            StratumRequest::Subscribe { id, .. } => {
                let result = serde_json::json!([
                    [["mining.set_difficulty", "1"], ["mining.notify", "1"]],
                    self.extranonce1,
                    self.extranonce2_size,
                ]);
                Ok((response_line(id, result), Some(SessionEvent::Subscribed)))
            },
            StratumRequest::Authorize { id, username: raw, .. } => match username::parse(raw) {
                Ok(parsed) => Ok((
                    response_line(id, serde_json::json!(true)),
                    Some(SessionEvent::Authorized { username: parsed }),
                )),
                Err(e) => Ok((error_line(id, 20, &e.to_string()), None)),
            },
            StratumRequest::Configure {
                id,
                extensions,
                version_rolling_mask,
            } => {
                let supports_version_rolling = extensions.iter().any(|e| e == "version-rolling");
                let mut result = serde_json::Map::new();
                if supports_version_rolling {
                    let requested = version_rolling_mask.unwrap_or(0xffff_ffff);
                    self.version_mask = version_rolling::negotiate(requested);
                    result.insert("version-rolling".to_string(), serde_json::json!(true));
                    result.insert("version-rolling.mask".to_string(), serde_json::json!(format!("{:08x}", self.version_mask)));
                } else {
                    result.insert("version-rolling".to_string(), serde_json::json!(false));
                }
                Ok((
                    response_line(id, serde_json::Value::Object(result)),
                    Some(SessionEvent::Configured {
                        version_mask: self.version_mask,
                    }),
                ))
            },
            StratumRequest::Submit {
                id,
                username: raw,
                job_id,
                extranonce2,
                ntime,
                nonce,
                version_bits,
            } => {
                let parsed = match username::parse(raw) {
                    Ok(p) => p,
                    Err(e) => return Ok((error_line(id, 24, &e.to_string()), None)),
                };
                if let Some(bits) = version_bits {
                    if bits & !self.version_mask != 0 {
                        return Ok((error_line(id, 23, "Invalid version mask"), None));
                    }
                }
                self.difficulty.record_submission(now, self.sane_min, self.sane_max);
                Ok((
                    response_line(id, serde_json::json!(true)),
                    Some(SessionEvent::Submitted {
                        username: parsed,
                        job_id: job_id.clone(),
                        extranonce2: extranonce2.clone(),
                        ntime: *ntime,
                        nonce: *nonce,
                        version_bits: *version_bits,
                    }),
                ))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::StratumRequest;

    #[test]
    fn subscribe_returns_extranonce_and_marks_subscribed() {
        let mut session = StratumSession::new("ab12".to_string(), 4, 1.0, 10.0, 0.0, f64::MAX);
        let req = StratumRequest::Subscribe {
            id: json!(1),
            user_agent: None,
            session_id: None,
        };
        let (line, event) = session.handle(&req, 0).unwrap();
        assert!(line.contains("ab12"));
        assert_eq!(event, Some(SessionEvent::Subscribed));
    }

    #[test]
    fn submit_with_out_of_mask_version_bits_is_rejected() {
        let mut session = StratumSession::new("ab12".to_string(), 4, 1.0, 10.0, 0.0, f64::MAX);
        session.handle(
            &StratumRequest::Configure {
                id: json!(0),
                extensions: vec!["version-rolling".to_string()],
                version_rolling_mask: Some(0x1fff_e000),
            },
            0,
        ).unwrap();

        let req = StratumRequest::Submit {
            id: json!(4),
            username: "addr.worker".to_string(),
            job_id: "j1".to_string(),
            extranonce2: "00000000".to_string(),
            ntime: 100,
            nonce: 1,
            version_bits: Some(0x8000_0000),
        };
        let (line, event) = session.handle(&req, 1).unwrap();
        assert!(line.contains("Invalid version mask"));
        assert_eq!(event, None);
    }

    #[test]
    fn submit_records_a_difficulty_sample() {
        let mut session = StratumSession::new("ab12".to_string(), 4, 1.0, 10.0, 0.0, f64::MAX);
        let req = StratumRequest::Submit {
            id: json!(4),
            username: "addr".to_string(),
            job_id: "j1".to_string(),
            extranonce2: "00000000".to_string(),
            ntime: 100,
            nonce: 1,
            version_bits: None,
        };
        let (_, event) = session.handle(&req, 5).unwrap();
        assert!(matches!(event, Some(SessionEvent::Submitted { .. })));
    }
}
