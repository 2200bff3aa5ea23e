//! Username parsing (§6): `user[_|.worker][+pseudodiff][/sharediff]`.

use crate::error::StratumError;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUsername {
    pub user: String,
    pub worker: Option<String>,
    /// A miner-requested starting difficulty (`+pseudodiff`), honored until
    /// the session's own retarget loop takes over.
    pub pseudodiff: Option<f64>,
    /// A miner-requested minimum share difficulty (`/sharediff`), floor-
    /// clamped into the retarget loop alongside `NetParams::sane_target_range`.
    pub sharediff: Option<f64>,
}

pub fn parse(raw: &str) -> Result<ParsedUsername, StratumError> {
    let mut rest = raw;

    let sharediff = if let Some(idx) = rest.rfind('/') {
        let (head, tail) = rest.split_at(idx);
        let value: f64 = tail[1..].parse().map_err(|_| StratumError::BadUsername(raw.to_string()))?;
        rest = head;
        Some(value)
    } else {
        None
    };

    let pseudodiff = if let Some(idx) = rest.rfind('+') {
        let (head, tail) = rest.split_at(idx);
        let value: f64 = tail[1..].parse().map_err(|_| StratumError::BadUsername(raw.to_string()))?;
        rest = head;
        Some(value)
    } else {
        None
    };

    let split_idx = rest.find(['_', '.']);
    let (user, worker) = match split_idx {
        Some(idx) => (rest[..idx].to_string(), Some(rest[idx + 1..].to_string())),
        None => (rest.to_string(), None),
    };

    if user.is_empty() {
        return Err(StratumError::BadUsername(raw.to_string()));
    }

    Ok(ParsedUsername {
        user,
        worker,
        pseudodiff,
        sharediff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_user() {
        assert_eq!(
            parse("1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB").unwrap(),
            ParsedUsername {
                user: "1Fb0h1QhPQqrLYPbZ1jJdkUxUTsnueFVdB".to_string(),
                worker: None,
                pseudodiff: None,
                sharediff: None,
            }
        );
    }

    #[test]
    fn parses_worker_and_both_diff_suffixes() {
        let parsed = parse("addr.rig3+8192/4096").unwrap();
        assert_eq!(parsed.user, "addr");
        assert_eq!(parsed.worker.as_deref(), Some("rig3"));
        assert_eq!(parsed.pseudodiff, Some(8192.0));
        assert_eq!(parsed.sharediff, Some(4096.0));
    }

    #[test]
    fn underscore_separator_also_splits_worker() {
        let parsed = parse("addr_worker1").unwrap();
        assert_eq!(parsed.user, "addr");
        assert_eq!(parsed.worker.as_deref(), Some("worker1"));
    }

    #[test]
    fn empty_user_is_rejected() {
        assert!(parse("+100").is_err());
    }
}
