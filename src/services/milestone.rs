// SPDX-License-Identifier: MIT

//! Habit-streak milestone rewards.
//!
//! Rewards unlock at a habit streak target. A claim below target just
//! records progress (repeatable); a claim at or above target awards the
//! points exactly once per (user, reward).

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::reward::ClaimStatus;
use crate::models::{MilestoneClaim, Reward, User};
use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MilestoneClaimOutcome {
    pub claim: MilestoneClaim,
    pub awarded: bool,
}

/// A reward with the calling user's progress toward it.
#[derive(Serialize)]
pub struct RewardProgress {
    #[serde(flatten)]
    pub reward: Reward,
    pub progress_days: u32,
    pub claimed: bool,
}

#[derive(Clone)]
pub struct MilestoneService {
    db: FirestoreDb,
}

impl MilestoneService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Active rewards annotated with the user's streak progress and
    /// claim state.
    pub async fn list_rewards(&self, user: &User) -> Result<Vec<RewardProgress>> {
        let rewards = self.db.list_rewards(true).await?;
        let claims = self.db.claims_for_user(&user.id).await?;
        let progress = user.habit_streak.current;

        Ok(rewards
            .into_iter()
            .map(|reward| {
                let claimed = claims
                    .iter()
                    .any(|c| c.reward_id == reward.id && c.is_awarded());
                RewardProgress {
                    progress_days: progress.min(reward.target_days),
                    claimed,
                    reward,
                }
            })
            .collect())
    }

    /// Claim a reward by code.
    ///
    /// Below target: the claim record is upserted with current progress
    /// and `awarded = false` (safe to repeat). At or above target: the
    /// award commits atomically with the ledger entry; a second award
    /// attempt conflicts.
    pub async fn claim(
        &self,
        user: &User,
        reward_code: &str,
        now: DateTime<Utc>,
    ) -> Result<MilestoneClaimOutcome> {
        let code = reward_code.trim();
        let reward = self
            .db
            .reward_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reward {} not found", code)))?;
        if !reward.is_active {
            return Err(AppError::InvalidTransition(
                "reward is not active".to_string(),
            ));
        }

        let existing = self.db.get_milestone_claim(&user.id, &reward.id).await?;
        if existing.as_ref().is_some_and(|c| c.is_awarded()) {
            return Err(AppError::Conflict("reward already claimed".to_string()));
        }

        let progress = user.habit_streak.current;
        let now_str = time_utils::format_utc_rfc3339(now);

        if progress < reward.target_days {
            let claim = MilestoneClaim {
                id: MilestoneClaim::doc_id(&user.id, &reward.id),
                user_id: user.id.clone(),
                reward_id: reward.id.clone(),
                code: reward.code.clone(),
                progress_days: progress,
                points_awarded: 0,
                status: ClaimStatus::InProgress,
                claimed_at: None,
                updated_at: now_str,
            };
            self.db.upsert_milestone_claim(&claim).await?;
            tracing::debug!(
                user_id = %user.id,
                reward_code = %claim.code,
                progress,
                target = reward.target_days,
                "Milestone progress recorded"
            );
            return Ok(MilestoneClaimOutcome {
                claim,
                awarded: false,
            });
        }

        let claim = self
            .db
            .claim_milestone_atomic(user, &reward, progress, &now_str)
            .await?;
        Ok(MilestoneClaimOutcome {
            claim,
            awarded: true,
        })
    }
}
