// SPDX-License-Identifier: MIT

//! Streak maintenance.
//!
//! The transition rule itself lives on [`StreakState`] in the models;
//! this service owns the nightly sweep that zeroes streaks whose last
//! activity is older than yesterday. Same-day and yesterday activity
//! are untouched: a user who acted yesterday still has until the end of
//! today to continue the run.

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::time_utils;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

/// Concurrent user updates per sweep batch.
const SWEEP_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct StreakService {
    db: FirestoreDb,
}

impl StreakService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Zero every stale streak (habit and sorting) across all users.
    ///
    /// Per-user failures are logged and skipped; the sweep always runs
    /// to completion. Returns the number of users updated.
    pub async fn reset_stale_streaks(&self, now: DateTime<Utc>) -> Result<usize> {
        let yesterday = time_utils::yesterday_bucket(now);
        let users = self.db.list_users().await?;
        let total = users.len();

        let reset_count = stream::iter(users)
            .map(|mut user| {
                let db = self.db.clone();
                let yesterday = yesterday.clone();
                let now_str = time_utils::format_utc_rfc3339(now);
                async move {
                    let mut changed = false;
                    if user.habit_streak.is_stale(&yesterday) && user.habit_streak.current > 0 {
                        user.habit_streak.current = 0;
                        changed = true;
                    }
                    if user.sorting_streak.is_stale(&yesterday) && user.sorting_streak.current > 0 {
                        user.sorting_streak.current = 0;
                        changed = true;
                    }
                    if !changed {
                        return false;
                    }
                    user.updated_at = now_str;
                    match db.upsert_user(&user).await {
                        Ok(()) => {
                            tracing::debug!(user_id = %user.id, "Streak reset");
                            true
                        }
                        Err(e) => {
                            tracing::error!(user_id = %user.id, error = %e, "Streak reset failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(SWEEP_CONCURRENCY)
            .filter(|reset| std::future::ready(*reset))
            .count()
            .await;

        tracing::info!(total, reset_count, "Streak sweep complete");
        Ok(reset_count)
    }
}
