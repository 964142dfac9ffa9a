// SPDX-License-Identifier: MIT

//! Daily task selection and checklist lifecycle.
//!
//! Every WIB calendar day, the same 5 tasks are drawn from the admin
//! pool for all users. The draw is a deterministic shuffle seeded by
//! the date, so it needs no stored state and survives restarts.
//! Checklist items materialize lazily on first request under the
//! deterministic document id `{user_id}_{daily_task_id}`.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{DailyTask, DailyTaskChecklistItem, User};
use crate::services::notify::{NotificationEvent, SharedNotifier};
use crate::services::tree::TreeService;
use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Tasks drawn per day.
pub const DAILY_SET_SIZE: usize = 5;

/// Deterministic pseudo-random in [0, 1) for a seed.
///
/// frac(sin(seed) * 10000): stable across platforms for the seed range
/// we use (dates as YYYYMMDD plus small offsets).
fn seeded_random(seed: i64) -> f64 {
    let x = (seed as f64).sin() * 10000.0;
    x - x.floor()
}

/// Seeded Fisher-Yates shuffle, walking from the end. Step `i` draws
/// its swap index from `seed + i` so each position gets a fresh value.
fn seeded_shuffle<T>(items: &mut [T], seed: i64) {
    for i in (1..items.len()).rev() {
        let r = seeded_random(seed + i as i64);
        let j = (r * (i as f64 + 1.0)).floor() as usize;
        items.swap(i, j);
    }
}

/// One task in today's set, with the user's completion state.
#[derive(Serialize)]
pub struct TodayTask {
    #[serde(flatten)]
    pub task: DailyTask,
    pub checklist_item_id: String,
    pub is_completed: bool,
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct TodayTasks {
    pub date: String,
    pub tasks: Vec<TodayTask>,
}

/// Result of completing one checklist item.
#[derive(Debug, Serialize)]
pub struct CompletionResult {
    pub item: DailyTaskChecklistItem,
    pub habit_streak_current: u32,
    pub fruit_spawned: bool,
}

#[derive(Clone)]
pub struct DailyTaskService {
    db: FirestoreDb,
    tree: TreeService,
    notifier: SharedNotifier,
}

impl DailyTaskService {
    pub fn new(db: FirestoreDb, tree: TreeService, notifier: SharedNotifier) -> Self {
        Self { db, tree, notifier }
    }

    /// Today's deterministic task set drawn from the full pool.
    ///
    /// Pool order is normalized by id before shuffling so the draw does
    /// not depend on query ordering.
    pub async fn select_today(&self, now: DateTime<Utc>) -> Result<Vec<DailyTask>> {
        let mut pool = self.db.list_daily_tasks().await?;
        pool.sort_by(|a, b| a.id.cmp(&b.id));
        seeded_shuffle(&mut pool, time_utils::date_seed(now));
        pool.truncate(DAILY_SET_SIZE);
        Ok(pool)
    }

    /// Today's tasks for a user, materializing missing checklist items.
    ///
    /// Creation is idempotent: the deterministic document id makes a
    /// concurrent first request overwrite an identical fresh item.
    pub async fn get_today_tasks(&self, user: &User, now: DateTime<Utc>) -> Result<TodayTasks> {
        let date = time_utils::today_bucket(now);
        let now_str = time_utils::format_utc_rfc3339(now);
        let selected = self.select_today(now).await?;

        let mut tasks = Vec::with_capacity(selected.len());
        let mut materialized = false;
        for task in selected {
            let item_id = DailyTaskChecklistItem::doc_id(&user.id, &task.id);
            let item = match self.db.get_checklist_item(&item_id).await? {
                Some(existing) => existing,
                None => {
                    let fresh = DailyTaskChecklistItem {
                        id: item_id.clone(),
                        user_id: user.id.clone(),
                        daily_task_id: task.id.clone(),
                        is_completed: false,
                        completed_at: None,
                        linked_leaf_id: None,
                        created_at: now_str.clone(),
                    };
                    self.db.upsert_checklist_item(&fresh).await?;
                    materialized = true;
                    fresh
                }
            };
            tasks.push(TodayTask {
                checklist_item_id: item.id.clone(),
                is_completed: item.is_completed,
                completed_at: item.completed_at.clone(),
                task,
            });
        }

        if materialized {
            self.notifier.notify(NotificationEvent::DailyTasksReady {
                user_id: user.id.clone(),
                date: date.clone(),
            });
        }

        Ok(TodayTasks { date, tasks })
    }

    /// Complete a checklist item: stamp it, bump the habit streak and
    /// grow the tree, all committed in one transaction.
    pub async fn complete(
        &self,
        user: &User,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionResult> {
        let mut item = self
            .db
            .get_checklist_item(item_id)
            .await?
            .filter(|i| i.user_id == user.id)
            .ok_or_else(|| AppError::NotFound(format!("Checklist item {} not found", item_id)))?;
        if item.is_completed {
            return Err(AppError::Conflict("task already completed".to_string()));
        }

        let now_str = time_utils::format_utc_rfc3339(now);
        let today = time_utils::today_bucket(now);
        let yesterday = time_utils::yesterday_bucket(now);

        let progression = self
            .tree
            .progression_for_completion(&user.id, &item.id, now)
            .await?;

        item.is_completed = true;
        item.completed_at = Some(now_str.clone());
        item.linked_leaf_id = Some(progression.leaf.id.clone());

        let mut user = user.clone();
        user.habit_streak.record_activity(&today, &yesterday);
        user.updated_at = now_str;

        self.db
            .apply_checklist_completion(
                &item,
                &user,
                &progression.leaf,
                &progression.tracker,
                progression.new_fruit.as_ref(),
            )
            .await?;

        if let Some(fruit) = &progression.new_fruit {
            self.tree.announce_fruit(fruit);
        }

        tracing::info!(
            user_id = %user.id,
            item_id = %item.id,
            streak = user.habit_streak.current,
            fruit_spawned = progression.new_fruit.is_some(),
            "Daily task completed"
        );

        Ok(CompletionResult {
            item,
            habit_streak_current: user.habit_streak.current,
            fruit_spawned: progression.new_fruit.is_some(),
        })
    }

    /// Roll back a completion: clear the stamp, delete the leaf it grew
    /// and fix the tracker counters. Spawned fruits stay. The streak is
    /// not rewound.
    pub async fn uncheck(
        &self,
        user: &User,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DailyTaskChecklistItem> {
        let mut item = self
            .db
            .get_checklist_item(item_id)
            .await?
            .filter(|i| i.user_id == user.id)
            .ok_or_else(|| AppError::NotFound(format!("Checklist item {} not found", item_id)))?;
        if !item.is_completed {
            return Err(AppError::Conflict("task is not completed".to_string()));
        }

        let now_str = time_utils::format_utc_rfc3339(now);
        let linked_leaf_id = item.linked_leaf_id.take();
        item.is_completed = false;
        item.completed_at = None;

        let mut deleted_leaf_id = None;
        let mut tracker = None;
        if let Some(leaf_id) = linked_leaf_id {
            if let Some(leaf) = self.db.get_leaf(&leaf_id).await? {
                let mut t = self.db.get_tracker(&user.id).await?.unwrap_or_default();
                t.user_id = user.id.clone();
                match leaf.status {
                    crate::models::LeafStatus::Green => {
                        t.total_green_leaves = (t.total_green_leaves - 1).max(0);
                    }
                    crate::models::LeafStatus::Yellow => {
                        t.total_yellow_leaves = (t.total_yellow_leaves - 1).max(0);
                    }
                }
                t.last_activity_date = Some(now_str.clone());
                deleted_leaf_id = Some(leaf.id);
                tracker = Some(t);
            }
        }

        self.db
            .apply_checklist_uncheck(&item, deleted_leaf_id.as_deref(), tracker.as_ref())
            .await?;

        tracing::info!(user_id = %user.id, item_id = %item.id, "Daily task unchecked");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("task-{:02}", i)).collect()
    }

    #[test]
    fn test_seeded_random_is_deterministic_and_bounded() {
        for seed in [0, 1, 20240305, 20991231] {
            let a = seeded_random(seed);
            let b = seeded_random(seed);
            assert_eq!(a, b);
            assert!((0.0..1.0).contains(&a), "seed {} gave {}", seed, a);
        }
    }

    #[test]
    fn test_shuffle_same_seed_same_order() {
        let mut a = pool(12);
        let mut b = pool(12);
        seeded_shuffle(&mut a, 20240305);
        seeded_shuffle(&mut b, 20240305);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_different_seed_different_order() {
        let mut a = pool(12);
        let mut b = pool(12);
        seeded_shuffle(&mut a, 20240305);
        seeded_shuffle(&mut b, 20240306);
        assert_ne!(a, b);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut shuffled = pool(12);
        seeded_shuffle(&mut shuffled, 20240305);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, pool(12));
    }

    #[test]
    fn test_shuffle_handles_small_pools() {
        let mut empty: Vec<String> = Vec::new();
        seeded_shuffle(&mut empty, 1);
        assert!(empty.is_empty());

        let mut one = pool(1);
        seeded_shuffle(&mut one, 1);
        assert_eq!(one, pool(1));
    }
}
