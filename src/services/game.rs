// SPDX-License-Identifier: MIT

//! Waste-sorting mini-game sessions and the once-per-day reward.

use crate::db::{new_doc_id, FirestoreDb};
use crate::error::{AppError, Result};
use crate::models::{GameSortingReward, GameSortingSession, User};
use crate::services::notify::{NotificationEvent, SharedNotifier};
use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Points for the first completed game of each WIB day.
pub const DAILY_REWARD_POINTS: i64 = 20;

/// Claim outcome. `already_claimed` means the day's reward existed
/// before this call and no points moved.
#[derive(Serialize)]
pub struct ClaimOutcome {
    pub reward: GameSortingReward,
    pub already_claimed: bool,
}

#[derive(Clone)]
pub struct GameService {
    db: FirestoreDb,
    notifier: SharedNotifier,
}

impl GameService {
    pub fn new(db: FirestoreDb, notifier: SharedNotifier) -> Self {
        Self { db, notifier }
    }

    /// Open a session stamped with today's day bucket. The bucket is
    /// fixed at start: a session begun before WIB midnight claims
    /// against the day it started.
    pub async fn start_session(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GameSortingSession> {
        let session = GameSortingSession {
            id: new_doc_id()?,
            user_id: user_id.to_string(),
            played_date: time_utils::format_utc_rfc3339(now),
            day_bucket: time_utils::today_bucket(now),
            is_completed: false,
        };
        self.db.upsert_session(&session).await?;
        tracing::info!(user_id, session_id = %session.id, "Game session started");
        Ok(session)
    }

    /// Mark a session completed and bump the sorting streak.
    /// Completing twice is a no-op.
    pub async fn complete_session(
        &self,
        user: &User,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GameSortingSession> {
        let mut session = self.owned_session(&user.id, session_id).await?;
        if session.is_completed {
            return Ok(session);
        }
        session.is_completed = true;
        self.db.upsert_session(&session).await?;

        let today = time_utils::today_bucket(now);
        let yesterday = time_utils::yesterday_bucket(now);
        let mut user = user.clone();
        if user.sorting_streak.record_activity(&today, &yesterday) {
            user.updated_at = time_utils::format_utc_rfc3339(now);
            self.db.upsert_user(&user).await?;
        }

        tracing::info!(
            user_id = %user.id,
            session_id,
            streak = user.sorting_streak.current,
            "Game session completed"
        );
        Ok(session)
    }

    /// Claim the day's reward for a completed session.
    ///
    /// At most one reward per (user, day bucket); a repeat claim
    /// returns the existing reward with `already_claimed` set instead
    /// of failing, and moves no points.
    pub async fn claim_reward(
        &self,
        user: &User,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome> {
        let session = self.owned_session(&user.id, session_id).await?;
        if !session.is_completed {
            return Err(AppError::InvalidTransition(
                "session is not completed".to_string(),
            ));
        }

        let now_str = time_utils::format_utc_rfc3339(now);
        let (reward, already_claimed) = self
            .db
            .claim_game_reward_atomic(&session, DAILY_REWARD_POINTS, &now_str)
            .await?;

        if !already_claimed {
            self.notifier.notify(NotificationEvent::GameRewardClaimed {
                user_id: user.id.clone(),
                points: reward.points_awarded,
            });
        }

        Ok(ClaimOutcome {
            reward,
            already_claimed,
        })
    }

    async fn owned_session(&self, user_id: &str, session_id: &str) -> Result<GameSortingSession> {
        self.db
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))
    }
}
