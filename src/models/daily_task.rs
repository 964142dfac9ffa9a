// SPDX-License-Identifier: MIT

//! Daily task pool and per-user checklist assignments.

use serde::{Deserialize, Serialize};

/// Admin-maintained task definition; read-only to the engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTask {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Per-user assignment of a daily task.
///
/// Document id is `{user_id}_{daily_task_id}`, which makes the
/// first-request materialization an idempotent get-or-create and
/// enforces uniqueness on (user, task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTaskChecklistItem {
    pub id: String,
    pub user_id: String,
    pub daily_task_id: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Leaf created or revived by this completion, for uncheck rollback.
    #[serde(default)]
    pub linked_leaf_id: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl DailyTaskChecklistItem {
    pub fn doc_id(user_id: &str, daily_task_id: &str) -> String {
        format!("{}_{}", user_id, daily_task_id)
    }
}
