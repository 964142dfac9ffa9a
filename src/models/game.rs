// SPDX-License-Identifier: MIT

//! Sorting mini-game sessions and daily reward guard records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSortingSession {
    pub id: String,
    pub user_id: String,
    pub played_date: String,
    /// WIB day bucket stamped at creation.
    pub day_bucket: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// Exactly-once daily reward guard.
///
/// Document id is `{user_id}_{day_bucket}`; a second claim in the same
/// bucket finds the existing document and returns it instead of
/// crediting again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSortingReward {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub game_sorting_id: Option<String>,
    pub day_bucket: String,
    pub points_awarded: i64,
    pub claimed_at: String,
}

impl GameSortingReward {
    pub fn doc_id(user_id: &str, day_bucket: &str) -> String {
        format!("{}_{}", user_id, day_bucket)
    }
}
