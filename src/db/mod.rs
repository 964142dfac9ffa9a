// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const DAILY_TASKS: &str = "daily_tasks";
    pub const DAILY_CHECKLISTS: &str = "daily_checklists";
    pub const TREE_LEAVES: &str = "tree_leaves";
    pub const TREE_TRACKERS: &str = "tree_trackers";
    pub const TREE_FRUITS: &str = "tree_fruits";
    pub const ECOENZYM_PROJECTS: &str = "ecoenzym_projects";
    pub const ECOENZYM_UPLOADS: &str = "ecoenzym_uploads";
    pub const GAME_SESSIONS: &str = "game_sessions";
    /// Guard records, keyed `{user_id}_{day_bucket}`.
    pub const GAME_REWARDS: &str = "game_rewards";
    pub const REWARDS: &str = "rewards";
    /// Guard records, keyed `{user_id}_{reward_id}`.
    pub const MILESTONE_CLAIMS: &str = "milestone_claims";
    pub const VOUCHERS: &str = "vouchers";
    pub const VOUCHER_REDEMPTIONS: &str = "voucher_redemptions";
    /// Append-only points ledger (keyed by generated id).
    pub const POINTS_LEDGER: &str = "points_ledger";
}

/// Generate a random document id (128 bits, hex).
pub fn new_doc_id() -> Result<String, AppError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG unavailable")))?;
    Ok(hex::encode(bytes))
}
