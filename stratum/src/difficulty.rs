//! Per-connection pseudoshare difficulty auto-adjust (§4.11): keep ~10s
//! (configurably `share_rate`, §6) between a connected miner's shares by
//! multiplicatively retargeting off its last 12 submission timestamps.

use std::collections::VecDeque;

/// How many recent submissions the retarget decision is based on.
const WINDOW: usize = 12;

/// The bounds a single retarget step is allowed to move `difficulty` by.
const MIN_MULTIPLIER: f64 = 0.5;
const MAX_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct DifficultyTracker {
    submission_times: VecDeque<u64>,
    difficulty: f64,
    target_seconds: f64,
}

impl DifficultyTracker {
    pub fn new(initial_difficulty: f64, target_seconds: f64) -> Self {
        DifficultyTracker {
            submission_times: VecDeque::with_capacity(WINDOW),
            difficulty: initial_difficulty.max(f64::MIN_POSITIVE),
            target_seconds,
        }
    }

    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Record a submission at `now` (unix seconds) and, once there is
    /// enough history, retarget. Returns `Some(new_difficulty)` exactly when
    /// the difficulty changed, so the caller knows to send a fresh
    /// `mining.set_difficulty`.
    pub fn record_submission(&mut self, now: u64, sane_min: f64, sane_max: f64) -> Option<f64> {
        self.submission_times.push_back(now);
        while self.submission_times.len() > WINDOW {
            self.submission_times.pop_front();
        }
        if self.submission_times.len() < 2 {
            return None;
        }

        let span = (*self.submission_times.back().unwrap()).saturating_sub(*self.submission_times.front().unwrap());
        let intervals = (self.submission_times.len() - 1) as f64;
        let observed_seconds_per_share = if span == 0 { self.target_seconds } else { span as f64 / intervals };

        // A higher difficulty means a *longer* expected time per share, so
        // the correction is the ratio of observed-to-target, not its inverse.
        let raw_ratio = observed_seconds_per_share / self.target_seconds.max(f64::MIN_POSITIVE);
        let ratio = raw_ratio.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);

        let new_difficulty = (self.difficulty * ratio).clamp(sane_min, sane_max);
        if (new_difficulty - self.difficulty).abs() / self.difficulty.max(f64::MIN_POSITIVE) < 1e-9 {
            return None;
        }
        self.difficulty = new_difficulty;
        Some(new_difficulty)
    }
}
