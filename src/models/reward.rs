// SPDX-License-Identifier: MIT

//! Streak milestone rewards and claim guard records.

use serde::{Deserialize, Serialize};

/// Milestone definition: reach `target_days` of habit streak to unlock
/// a one-time `points_reward`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub points_reward: i64,
    pub target_days: u32,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

/// One-per-(user, reward) claim record.
///
/// Document id is `{user_id}_{reward_id}`. `points_awarded` stays 0
/// while progress is below target and becomes positive exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneClaim {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub code: String,
    #[serde(default)]
    pub progress_days: u32,
    #[serde(default)]
    pub points_awarded: i64,
    pub status: ClaimStatus,
    #[serde(default)]
    pub claimed_at: Option<String>,
    #[serde(default)]
    pub updated_at: String,
}

impl MilestoneClaim {
    pub fn doc_id(user_id: &str, reward_id: &str) -> String {
        format!("{}_{}", user_id, reward_id)
    }

    pub fn is_awarded(&self) -> bool {
        self.points_awarded > 0
    }
}
