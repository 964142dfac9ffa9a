// SPDX-License-Identifier: MIT

//! Virtual tree progression.
//!
//! Each completed daily task grows the tree: it revives the oldest
//! wilted (yellow) leaf if one exists, otherwise adds a fresh green
//! leaf. Every fifth green leaf spawns a harvestable fruit. A nightly
//! sweep wilts one leaf for each user who completed nothing the
//! previous day.

use crate::db::{new_doc_id, FirestoreDb};
use crate::error::{AppError, Result};
use crate::models::{LeafStatus, TreeFruit, TreeLeaf, TreeTracker, User};
use crate::services::notify::{NotificationEvent, SharedNotifier};
use crate::time_utils;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;

/// Points credited per harvested fruit.
pub const FRUIT_CLAIM_POINTS: i64 = 10;
/// A fruit spawns whenever the green-leaf count reaches a multiple of this.
pub const FRUIT_SPAWN_EVERY: i64 = 5;

const SWEEP_CONCURRENCY: usize = 8;

/// Leaf/tracker/fruit documents produced by one task completion,
/// staged by the caller into the completion transaction.
pub struct TreeProgression {
    pub leaf: TreeLeaf,
    pub tracker: TreeTracker,
    pub new_fruit: Option<TreeFruit>,
}

/// Full tree view for a user.
#[derive(Serialize)]
pub struct TreeView {
    pub tracker: TreeTracker,
    pub leaves: Vec<TreeLeaf>,
    pub unclaimed_fruits: Vec<TreeFruit>,
}

#[derive(Clone)]
pub struct TreeService {
    db: FirestoreDb,
    notifier: SharedNotifier,
}

impl TreeService {
    pub fn new(db: FirestoreDb, notifier: SharedNotifier) -> Self {
        Self { db, notifier }
    }

    /// Compute the tree documents for a task completion.
    ///
    /// Reads only; the caller commits the returned documents together
    /// with the checklist item and user.
    pub async fn progression_for_completion(
        &self,
        user_id: &str,
        checklist_item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TreeProgression> {
        let now_str = time_utils::format_utc_rfc3339(now);
        let mut tracker = self.db.get_tracker(user_id).await?.unwrap_or(TreeTracker {
            user_id: user_id.to_string(),
            ..Default::default()
        });

        let leaf = match self
            .db
            .oldest_leaf_with_status(user_id, LeafStatus::Yellow)
            .await?
        {
            Some(mut wilted) => {
                wilted.status = LeafStatus::Green;
                wilted.needs_recovery = false;
                wilted.checklist_item_id = Some(checklist_item_id.to_string());
                wilted.status_changed_date = Some(now_str.clone());
                tracker.total_yellow_leaves = (tracker.total_yellow_leaves - 1).max(0);
                tracker.total_green_leaves += 1;
                wilted
            }
            None => {
                let day_number = self.db.count_leaves(user_id).await? + 1;
                tracker.total_green_leaves += 1;
                TreeLeaf {
                    id: new_doc_id()?,
                    user_id: user_id.to_string(),
                    day_number,
                    status: LeafStatus::Green,
                    needs_recovery: false,
                    checklist_item_id: Some(checklist_item_id.to_string()),
                    created_date: now_str.clone(),
                    status_changed_date: None,
                }
            }
        };

        tracker.last_activity_date = Some(now_str.clone());

        let new_fruit = if tracker.total_green_leaves > 0
            && tracker.total_green_leaves % FRUIT_SPAWN_EVERY == 0
        {
            Some(TreeFruit {
                id: new_doc_id()?,
                user_id: user_id.to_string(),
                harvest_ready_date: now_str,
                is_claimed: false,
                claimed_at: None,
                points_awarded: 0,
            })
        } else {
            None
        };

        Ok(TreeProgression {
            leaf,
            tracker,
            new_fruit,
        })
    }

    /// Announce a spawned fruit after its transaction committed.
    pub fn announce_fruit(&self, fruit: &TreeFruit) {
        self.notifier.notify(NotificationEvent::FruitReady {
            user_id: fruit.user_id.clone(),
            fruit_id: fruit.id.clone(),
        });
    }

    /// Tracker, leaves and unclaimed fruits for display.
    pub async fn get_tree(&self, user_id: &str) -> Result<TreeView> {
        let tracker = self.db.get_tracker(user_id).await?.unwrap_or(TreeTracker {
            user_id: user_id.to_string(),
            ..Default::default()
        });
        let leaves = self.db.leaves_for_user(user_id).await?;
        let unclaimed_fruits = self.db.unclaimed_fruits(user_id).await?;
        Ok(TreeView {
            tracker,
            leaves,
            unclaimed_fruits,
        })
    }

    pub async fn unclaimed_fruits(&self, user_id: &str) -> Result<Vec<TreeFruit>> {
        self.db.unclaimed_fruits(user_id).await
    }

    /// Harvest a fruit. Exactly-once; a second claim gets a conflict.
    pub async fn claim_fruit(
        &self,
        user_id: &str,
        fruit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(TreeFruit, User)> {
        let now_str = time_utils::format_utc_rfc3339(now);
        self.db
            .claim_fruit_atomic(user_id, fruit_id, FRUIT_CLAIM_POINTS, &now_str)
            .await
    }

    /// Nightly leaf maintenance.
    ///
    /// Users with zero completions yesterday have their oldest green
    /// leaf wilt to yellow; users with at least one completion get their
    /// oldest yellow leaf revived. Per-user errors are logged, the sweep
    /// continues. Returns the number of leaves touched.
    pub async fn leaf_inactivity_sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let yesterday = time_utils::yesterday_bucket(now);
        let Some((from, to)) = time_utils::bucket_utc_range(&yesterday) else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "unrepresentable day bucket {}",
                yesterday
            )));
        };
        let now_str = time_utils::format_utc_rfc3339(now);

        let users = self.db.list_users().await?;
        let touched = stream::iter(users)
            .map(|user| {
                let svc = self.clone();
                let from = from.clone();
                let to = to.clone();
                let now_str = now_str.clone();
                async move {
                    match svc.sweep_one_user(&user.id, &from, &to, &now_str).await {
                        Ok(touched) => touched,
                        Err(e) => {
                            tracing::error!(user_id = %user.id, error = %e, "Leaf sweep failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(SWEEP_CONCURRENCY)
            .filter(|touched| std::future::ready(*touched))
            .count()
            .await;

        tracing::info!(touched, "Leaf inactivity sweep complete");
        Ok(touched)
    }

    async fn sweep_one_user(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
        now_str: &str,
    ) -> Result<bool> {
        let was_active = self.db.has_completion_between(user_id, from, to).await?;

        let (target_status, new_status) = if was_active {
            (LeafStatus::Yellow, LeafStatus::Green)
        } else {
            (LeafStatus::Green, LeafStatus::Yellow)
        };

        let Some(mut leaf) = self.db.oldest_leaf_with_status(user_id, target_status).await? else {
            return Ok(false);
        };

        leaf.status = new_status;
        leaf.needs_recovery = new_status == LeafStatus::Yellow;
        leaf.status_changed_date = Some(now_str.to_string());

        let mut tracker = self.db.get_tracker(user_id).await?.unwrap_or(TreeTracker {
            user_id: user_id.to_string(),
            ..Default::default()
        });
        match new_status {
            LeafStatus::Yellow => {
                tracker.total_green_leaves = (tracker.total_green_leaves - 1).max(0);
                tracker.total_yellow_leaves += 1;
            }
            LeafStatus::Green => {
                tracker.total_yellow_leaves = (tracker.total_yellow_leaves - 1).max(0);
                tracker.total_green_leaves += 1;
            }
        }

        self.db.upsert_leaf(&leaf).await?;
        self.db.upsert_tracker(&tracker).await?;
        Ok(true)
    }
}
