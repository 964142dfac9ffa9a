// SPDX-License-Identifier: MIT

//! User model with embedded streak state.

use serde::{Deserialize, Serialize};

/// Consecutive-day activity counter for one streak type.
///
/// `last_active_bucket` is a WIB day bucket (`YYYY-MM-DD`); the
/// transition rule only ever fires on positive activity. The nightly
/// sweep that zeroes stale streaks lives in the streak service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakState {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub best: u32,
    #[serde(default)]
    pub last_active_bucket: Option<String>,
}

impl StreakState {
    /// Record qualifying activity for `today`.
    ///
    /// Returns `false` if today was already counted (no-op), `true` if
    /// the state changed. Consecutive-day continuation requires the
    /// previous bucket to be exactly `yesterday`; anything older resets
    /// the run to 1 (including first-ever activity).
    pub fn record_activity(&mut self, today: &str, yesterday: &str) -> bool {
        if self.last_active_bucket.as_deref() == Some(today) {
            return false;
        }

        self.current = if self.last_active_bucket.as_deref() == Some(yesterday) {
            self.current + 1
        } else {
            1
        };
        self.best = self.best.max(self.current);
        self.last_active_bucket = Some(today.to_string());
        true
    }

    /// Whether the streak has gone stale: last activity older than
    /// `yesterday` (two or more missed days). Buckets compare
    /// lexicographically because of the fixed `YYYY-MM-DD` format.
    pub fn is_stale(&self, yesterday: &str) -> bool {
        match self.last_active_bucket.as_deref() {
            Some(bucket) => bucket < yesterday,
            None => true,
        }
    }
}

/// User profile with the authoritative cached point balance.
///
/// `total_points` must stay in lockstep with the sum of the user's
/// ledger entries; only the transactional helpers in the db layer may
/// move it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub habit_streak: StreakState,
    #[serde(default)]
    pub sorting_streak: StreakState,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_activity_starts_at_one() {
        let mut streak = StreakState::default();
        assert!(streak.record_activity("2024-03-10", "2024-03-09"));
        assert_eq!(streak.current, 1);
        assert_eq!(streak.best, 1);
        assert_eq!(streak.last_active_bucket.as_deref(), Some("2024-03-10"));
    }

    #[test]
    fn test_consecutive_day_increments() {
        let mut streak = StreakState {
            current: 3,
            best: 5,
            last_active_bucket: Some("2024-03-09".to_string()),
        };
        assert!(streak.record_activity("2024-03-10", "2024-03-09"));
        assert_eq!(streak.current, 4);
        assert_eq!(streak.best, 5);
    }

    #[test]
    fn test_same_day_is_noop() {
        let mut streak = StreakState {
            current: 4,
            best: 4,
            last_active_bucket: Some("2024-03-10".to_string()),
        };
        assert!(!streak.record_activity("2024-03-10", "2024-03-09"));
        assert_eq!(streak.current, 4);
    }

    #[test]
    fn test_gap_resets_to_one() {
        let mut streak = StreakState {
            current: 7,
            best: 7,
            last_active_bucket: Some("2024-03-05".to_string()),
        };
        assert!(streak.record_activity("2024-03-10", "2024-03-09"));
        assert_eq!(streak.current, 1);
        assert_eq!(streak.best, 7); // record survives the reset
    }

    #[test]
    fn test_best_tracks_new_record() {
        let mut streak = StreakState {
            current: 7,
            best: 7,
            last_active_bucket: Some("2024-03-09".to_string()),
        };
        streak.record_activity("2024-03-10", "2024-03-09");
        assert_eq!(streak.best, 8);
    }

    #[test]
    fn test_staleness() {
        let fresh = StreakState {
            current: 2,
            best: 2,
            last_active_bucket: Some("2024-03-09".to_string()),
        };
        assert!(!fresh.is_stale("2024-03-09"));

        let stale = StreakState {
            current: 2,
            best: 2,
            last_active_bucket: Some("2024-03-07".to_string()),
        };
        assert!(stale.is_stale("2024-03-09"));
        assert!(StreakState::default().is_stale("2024-03-09"));
    }
}
