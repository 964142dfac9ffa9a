// SPDX-License-Identifier: MIT

//! Virtual tree state: leaves, tracker counters, fruits.

use serde::{Deserialize, Serialize};

/// Leaf lifecycle state. Yellow leaves are wilting and wait for
/// renewed activity to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafStatus {
    Green,
    Yellow,
}

impl LeafStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeafStatus::Green => "green",
            LeafStatus::Yellow => "yellow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeLeaf {
    pub id: String,
    pub user_id: String,
    /// Sequential per user, assigned at creation.
    pub day_number: u32,
    pub status: LeafStatus,
    #[serde(default)]
    pub needs_recovery: bool,
    /// Checklist item whose completion produced (or revived) this leaf.
    #[serde(default)]
    pub checklist_item_id: Option<String>,
    pub created_date: String,
    #[serde(default)]
    pub status_changed_date: Option<String>,
}

/// Per-user running counters, upserted lazily on first activity.
/// Document id is the user id (1:1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeTracker {
    pub user_id: String,
    #[serde(default)]
    pub total_green_leaves: i64,
    #[serde(default)]
    pub total_yellow_leaves: i64,
    #[serde(default)]
    pub total_fruits_harvested: i64,
    #[serde(default)]
    pub last_activity_date: Option<String>,
}

/// Spawned automatically when the green-leaf count crosses a multiple
/// of 5. Claimed exactly once for a fixed point award.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFruit {
    pub id: String,
    pub user_id: String,
    pub harvest_ready_date: String,
    #[serde(default)]
    pub is_claimed: bool,
    #[serde(default)]
    pub claimed_at: Option<String>,
    #[serde(default)]
    pub points_awarded: i64,
}
