// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for every collection plus the atomic
//! point-moving operations. The invariant enforced here: any write that
//! changes `User::total_points` goes through `stage_points_change`,
//! which stages the balance update and exactly one ledger append into
//! the same transaction. No caller may move points any other way.

use crate::db::{collections, new_doc_id};
use crate::error::AppError;
use crate::models::{
    DailyTask, DailyTaskChecklistItem, EcoenzymProject, EcoenzymUpload, GameSortingReward,
    GameSortingSession, LeafStatus, MilestoneClaim, PointsLedgerEntry, PointsSource, ProjectStatus,
    Reward, TreeFruit, TreeLeaf, TreeTracker, UploadStatus, User, Voucher, VoucherRedemption,
};
use crate::models::ledger::LedgerQuery;
use crate::models::reward::ClaimStatus;
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection, FirestoreTransaction};
use serde::{de::DeserializeOwned, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ────────────────────────────────

    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_doc<T>(&self, collection: &str, id: &str, obj: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Read a document through an open transaction.
    ///
    /// The read is performed under the transaction's consistency
    /// selector, which puts the document in the transaction's read set:
    /// a concurrent write to it fails this transaction's commit.
    async fn get_by_id_in_tx<T>(
        &self,
        transaction: &FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Stage an upsert into an open transaction.
    fn stage_upsert<T>(
        &self,
        transaction: &mut FirestoreTransaction,
        collection: &str,
        id: &str,
        obj: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        self.get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .add_to_transaction(transaction)
            .map_err(|e| AppError::Database(format!("Failed to stage write: {}", e)))?;
        Ok(())
    }

    /// Stage a delete into an open transaction.
    fn stage_delete(
        &self,
        transaction: &mut FirestoreTransaction,
        collection: &str,
        id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .add_to_transaction(transaction)
            .map_err(|e| AppError::Database(format!("Failed to stage delete: {}", e)))?;
        Ok(())
    }

    async fn begin(&self) -> Result<FirestoreTransaction, AppError> {
        self.get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    async fn commit(&self, transaction: FirestoreTransaction<'_>) -> Result<(), AppError> {
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Stage a balance mutation and its ledger append together.
    ///
    /// The caller has already applied `entry.amount` to
    /// `user.total_points`; this stages both documents so the pair
    /// commits or rolls back as a unit.
    fn stage_points_change(
        &self,
        transaction: &mut FirestoreTransaction,
        user: &User,
        entry: &PointsLedgerEntry,
    ) -> Result<(), AppError> {
        debug_assert!(user.total_points >= 0, "balance must never go negative");
        debug_assert_eq!(user.id, entry.user_id);
        self.stage_upsert(transaction, collections::USERS, &user.id, user)?;
        self.stage_upsert(transaction, collections::POINTS_LEDGER, &entry.id, entry)
    }

    fn new_ledger_entry(
        user_id: &str,
        amount: i64,
        source: PointsSource,
        reference_id: Option<String>,
        now: &str,
    ) -> Result<PointsLedgerEntry, AppError> {
        Ok(PointsLedgerEntry {
            id: new_doc_id()?,
            user_id: user_id.to_string(),
            amount,
            source,
            reference_id,
            created_at: now.to_string(),
        })
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_by_id(collections::USERS, user_id).await
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.upsert_doc(collections::USERS, &user.id, user).await
    }

    /// All users. Used by the nightly sweeps, which iterate the whole
    /// population anyway.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Daily Task Operations ───────────────────────────────────

    pub async fn list_daily_tasks(&self) -> Result<Vec<DailyTask>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_TASKS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_daily_task(&self, task: &DailyTask) -> Result<(), AppError> {
        self.upsert_doc(collections::DAILY_TASKS, &task.id, task)
            .await
    }

    pub async fn get_checklist_item(
        &self,
        item_id: &str,
    ) -> Result<Option<DailyTaskChecklistItem>, AppError> {
        self.get_by_id(collections::DAILY_CHECKLISTS, item_id).await
    }

    pub async fn upsert_checklist_item(
        &self,
        item: &DailyTaskChecklistItem,
    ) -> Result<(), AppError> {
        self.upsert_doc(collections::DAILY_CHECKLISTS, &item.id, item)
            .await
    }

    /// Whether the user completed at least one checklist item with
    /// `completed_at` in `[from, to)`.
    pub async fn has_completion_between(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
    ) -> Result<bool, AppError> {
        let user_id = user_id.to_string();
        let from = from.to_string();
        let to = to.to_string();
        let items: Vec<DailyTaskChecklistItem> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_CHECKLISTS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("is_completed").eq(true),
                    q.field("completed_at").greater_than_or_equal(from.clone()),
                    q.field("completed_at").less_than(to.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(!items.is_empty())
    }

    // ─── Tree Operations ─────────────────────────────────────────

    pub async fn get_tracker(&self, user_id: &str) -> Result<Option<TreeTracker>, AppError> {
        self.get_by_id(collections::TREE_TRACKERS, user_id).await
    }

    pub async fn get_leaf(&self, leaf_id: &str) -> Result<Option<TreeLeaf>, AppError> {
        self.get_by_id(collections::TREE_LEAVES, leaf_id).await
    }

    pub async fn leaves_for_user(&self, user_id: &str) -> Result<Vec<TreeLeaf>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TREE_LEAVES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("created_date", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Oldest leaf in the given status, by creation date.
    pub async fn oldest_leaf_with_status(
        &self,
        user_id: &str,
        status: LeafStatus,
    ) -> Result<Option<TreeLeaf>, AppError> {
        let user_id = user_id.to_string();
        let status = status.as_str();
        let mut leaves: Vec<TreeLeaf> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TREE_LEAVES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("status").eq(status),
                ])
            })
            .order_by([("created_date", FirestoreQueryDirection::Ascending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(leaves.pop())
    }

    pub async fn count_leaves(&self, user_id: &str) -> Result<u32, AppError> {
        Ok(self.leaves_for_user(user_id).await?.len() as u32)
    }

    pub async fn count_leaves_with_status(
        &self,
        user_id: &str,
        status: LeafStatus,
    ) -> Result<i64, AppError> {
        let user_id = user_id.to_string();
        let status = status.as_str();
        let leaves: Vec<TreeLeaf> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TREE_LEAVES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("status").eq(status),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(leaves.len() as i64)
    }

    pub async fn upsert_leaf(&self, leaf: &TreeLeaf) -> Result<(), AppError> {
        self.upsert_doc(collections::TREE_LEAVES, &leaf.id, leaf)
            .await
    }

    pub async fn upsert_fruit(&self, fruit: &TreeFruit) -> Result<(), AppError> {
        self.upsert_doc(collections::TREE_FRUITS, &fruit.id, fruit)
            .await
    }

    pub async fn get_fruit(&self, fruit_id: &str) -> Result<Option<TreeFruit>, AppError> {
        self.get_by_id(collections::TREE_FRUITS, fruit_id).await
    }

    pub async fn unclaimed_fruits(&self, user_id: &str) -> Result<Vec<TreeFruit>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TREE_FRUITS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("is_claimed").eq(false),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically apply a checklist completion: item, streak-bearing
    /// user, leaf, tracker, and an optional newly spawned fruit commit
    /// together. No points move here, so no ledger entry. The item is
    /// re-read inside the transaction, so a racing completion of the
    /// same item fails at commit instead of double-growing the tree.
    pub async fn apply_checklist_completion(
        &self,
        item: &DailyTaskChecklistItem,
        user: &User,
        leaf: &TreeLeaf,
        tracker: &TreeTracker,
        new_fruit: Option<&TreeFruit>,
    ) -> Result<(), AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_checklist_completion(&mut transaction, item, user, leaf, tracker, new_fruit)
            .await
        {
            Ok(()) => self.commit(transaction).await,
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_checklist_completion(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        item: &DailyTaskChecklistItem,
        user: &User,
        leaf: &TreeLeaf,
        tracker: &TreeTracker,
        new_fruit: Option<&TreeFruit>,
    ) -> Result<(), AppError> {
        let prior: Option<DailyTaskChecklistItem> = self
            .get_by_id_in_tx(transaction, collections::DAILY_CHECKLISTS, &item.id)
            .await?;
        if prior.is_some_and(|p| p.is_completed) {
            return Err(AppError::Conflict("task already completed".to_string()));
        }

        self.stage_upsert(transaction, collections::DAILY_CHECKLISTS, &item.id, item)?;
        self.stage_upsert(transaction, collections::USERS, &user.id, user)?;
        self.stage_upsert(transaction, collections::TREE_LEAVES, &leaf.id, leaf)?;
        self.stage_upsert(
            transaction,
            collections::TREE_TRACKERS,
            &tracker.user_id,
            tracker,
        )?;
        if let Some(fruit) = new_fruit {
            self.stage_upsert(transaction, collections::TREE_FRUITS, &fruit.id, fruit)?;
        }
        Ok(())
    }

    /// Atomically roll back a completion: reset the item, delete the
    /// linked leaf (if any) and update the tracker counters.
    pub async fn apply_checklist_uncheck(
        &self,
        item: &DailyTaskChecklistItem,
        deleted_leaf_id: Option<&str>,
        tracker: Option<&TreeTracker>,
    ) -> Result<(), AppError> {
        let mut transaction = self.begin().await?;
        let staged: Result<(), AppError> = (|| {
            self.stage_upsert(&mut transaction, collections::DAILY_CHECKLISTS, &item.id, item)?;
            if let Some(leaf_id) = deleted_leaf_id {
                self.stage_delete(&mut transaction, collections::TREE_LEAVES, leaf_id)?;
            }
            if let Some(tracker) = tracker {
                self.stage_upsert(
                    &mut transaction,
                    collections::TREE_TRACKERS,
                    &tracker.user_id,
                    tracker,
                )?;
            }
            Ok(())
        })();
        match staged {
            Ok(()) => self.commit(transaction).await,
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn upsert_tracker(&self, tracker: &TreeTracker) -> Result<(), AppError> {
        self.upsert_doc(collections::TREE_TRACKERS, &tracker.user_id, tracker)
            .await
    }

    /// Claim a fruit exactly once: mark it claimed, credit the user,
    /// append the ledger entry and bump the harvested counter in one
    /// transaction. Returns the claimed fruit and the updated user.
    pub async fn claim_fruit_atomic(
        &self,
        user_id: &str,
        fruit_id: &str,
        points: i64,
        now: &str,
    ) -> Result<(TreeFruit, User), AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_fruit_claim(&mut transaction, user_id, fruit_id, points, now)
            .await
        {
            Ok(out) => {
                self.commit(transaction).await?;
                tracing::info!(user_id, fruit_id, points, "Fruit harvested");
                Ok(out)
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_fruit_claim(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user_id: &str,
        fruit_id: &str,
        points: i64,
        now: &str,
    ) -> Result<(TreeFruit, User), AppError> {
        // In-transaction reads: the fruit guard and the balance land in
        // the read set, so a concurrent claim fails at commit.
        let fruit: Option<TreeFruit> = self
            .get_by_id_in_tx(transaction, collections::TREE_FRUITS, fruit_id)
            .await?;
        let mut fruit = match fruit {
            Some(f) if f.user_id == user_id => f,
            _ => return Err(AppError::NotFound(format!("Fruit {} not found", fruit_id))),
        };
        if fruit.is_claimed {
            return Err(AppError::Conflict("fruit already harvested".to_string()));
        }

        let mut user: User = self
            .get_by_id_in_tx(transaction, collections::USERS, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let mut tracker: TreeTracker = self
            .get_by_id_in_tx(transaction, collections::TREE_TRACKERS, user_id)
            .await?
            .unwrap_or(TreeTracker {
                user_id: user_id.to_string(),
                ..Default::default()
            });

        fruit.is_claimed = true;
        fruit.claimed_at = Some(now.to_string());
        fruit.points_awarded = points;

        user.total_points += points;
        user.updated_at = now.to_string();

        tracker.total_fruits_harvested += 1;
        tracker.last_activity_date = Some(now.to_string());

        let entry = Self::new_ledger_entry(
            user_id,
            points,
            PointsSource::Tree,
            Some(fruit.id.clone()),
            now,
        )?;

        self.stage_upsert(transaction, collections::TREE_FRUITS, &fruit.id, &fruit)?;
        self.stage_upsert(
            transaction,
            collections::TREE_TRACKERS,
            &tracker.user_id,
            &tracker,
        )?;
        self.stage_points_change(transaction, &user, &entry)?;
        Ok((fruit, user))
    }

    // ─── Ecoenzym Operations ─────────────────────────────────────

    pub async fn get_project(&self, project_id: &str) -> Result<Option<EcoenzymProject>, AppError> {
        self.get_by_id(collections::ECOENZYM_PROJECTS, project_id)
            .await
    }

    pub async fn upsert_project(&self, project: &EcoenzymProject) -> Result<(), AppError> {
        self.upsert_doc(collections::ECOENZYM_PROJECTS, &project.id, project)
            .await
    }

    pub async fn projects_for_user(&self, user_id: &str) -> Result<Vec<EcoenzymProject>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ECOENZYM_PROJECTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Ongoing projects whose end date has passed (expiry sweep input).
    pub async fn expired_ongoing_projects(
        &self,
        now: &str,
    ) -> Result<Vec<EcoenzymProject>, AppError> {
        let now = now.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ECOENZYM_PROJECTS)
            .filter(move |q| {
                q.for_all([
                    q.field("status").eq(ProjectStatus::Ongoing.as_str()),
                    q.field("end_date").less_than(now.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_upload(&self, upload_id: &str) -> Result<Option<EcoenzymUpload>, AppError> {
        self.get_by_id(collections::ECOENZYM_UPLOADS, upload_id)
            .await
    }

    pub async fn upsert_upload(&self, upload: &EcoenzymUpload) -> Result<(), AppError> {
        self.upsert_doc(collections::ECOENZYM_UPLOADS, &upload.id, upload)
            .await
    }

    pub async fn uploads_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<EcoenzymUpload>, AppError> {
        let project_id = project_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ECOENZYM_UPLOADS)
            .filter(move |q| q.for_all([q.field("project_id").eq(project_id.clone())]))
            .order_by([("uploaded_date", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The milestone photo upload for a given checkpoint, if any.
    /// At most one exists per (project, month_number).
    pub async fn upload_for_month(
        &self,
        project_id: &str,
        month_number: u8,
    ) -> Result<Option<EcoenzymUpload>, AppError> {
        let project_id = project_id.to_string();
        let mut uploads: Vec<EcoenzymUpload> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ECOENZYM_UPLOADS)
            .filter(move |q| {
                q.for_all([
                    q.field("project_id").eq(project_id.clone()),
                    q.field("month_number").eq(month_number as i64),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(uploads.pop())
    }

    pub async fn count_verified_uploads(&self, project_id: &str) -> Result<u32, AppError> {
        let project_id = project_id.to_string();
        let uploads: Vec<EcoenzymUpload> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ECOENZYM_UPLOADS)
            .filter(move |q| {
                q.for_all([
                    q.field("project_id").eq(project_id.clone()),
                    q.field("status").eq(UploadStatus::Verified.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        // Only the three milestone checkpoints count toward completion.
        Ok(uploads.iter().filter(|u| u.month_number.is_some()).count() as u32)
    }

    /// Claim a completed project's accrued points. The caller has
    /// already validated that the derived status allows claiming; the
    /// transaction re-checks the claimed flag for exactly-once.
    pub async fn claim_ecoenzym_atomic(
        &self,
        project_id: &str,
        now: &str,
    ) -> Result<(EcoenzymProject, i64), AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_ecoenzym_claim(&mut transaction, project_id, now)
            .await
        {
            Ok((project, amount)) => {
                self.commit(transaction).await?;
                tracing::info!(project_id, amount, "Ecoenzym points claimed");
                Ok((project, amount))
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_ecoenzym_claim(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        project_id: &str,
        now: &str,
    ) -> Result<(EcoenzymProject, i64), AppError> {
        let project: Option<EcoenzymProject> = self
            .get_by_id_in_tx(transaction, collections::ECOENZYM_PROJECTS, project_id)
            .await?;
        let mut project = project
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;
        if project.is_claimed {
            return Err(AppError::Conflict("project already claimed".to_string()));
        }

        let mut user: User = self
            .get_by_id_in_tx(transaction, collections::USERS, &project.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", project.user_id)))?;

        let amount = project.pre_points_earned;
        project.points = amount;
        project.pre_points_earned = 0;
        project.is_claimed = true;
        project.can_claim = false;
        project.claimed_at = Some(now.to_string());
        project.status = ProjectStatus::Completed;

        user.total_points += amount;
        user.updated_at = now.to_string();

        let entry = Self::new_ledger_entry(
            &user.id,
            amount,
            PointsSource::Ecoenzym,
            Some(project.id.clone()),
            now,
        )?;

        self.stage_upsert(
            transaction,
            collections::ECOENZYM_PROJECTS,
            &project.id,
            &project,
        )?;
        self.stage_points_change(transaction, &user, &entry)?;
        Ok((project, amount))
    }

    // ─── Game Operations ─────────────────────────────────────────

    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSortingSession>, AppError> {
        self.get_by_id(collections::GAME_SESSIONS, session_id).await
    }

    pub async fn upsert_session(&self, session: &GameSortingSession) -> Result<(), AppError> {
        self.upsert_doc(collections::GAME_SESSIONS, &session.id, session)
            .await
    }

    pub async fn get_game_reward(
        &self,
        user_id: &str,
        day_bucket: &str,
    ) -> Result<Option<GameSortingReward>, AppError> {
        self.get_by_id(
            collections::GAME_REWARDS,
            &GameSortingReward::doc_id(user_id, day_bucket),
        )
        .await
    }

    /// Claim the daily game reward exactly once per (user, day bucket).
    ///
    /// The guard document id is `{user_id}_{day_bucket}`; if it already
    /// exists the existing reward is returned with `already = true` and
    /// nothing is written. Two racing claims conflict at commit; the
    /// retried loser then observes the guard.
    pub async fn claim_game_reward_atomic(
        &self,
        session: &GameSortingSession,
        points: i64,
        now: &str,
    ) -> Result<(GameSortingReward, bool), AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_game_reward_claim(&mut transaction, session, points, now)
            .await
        {
            Ok((reward, true)) => {
                let _ = transaction.rollback().await;
                tracing::debug!(
                    user_id = %reward.user_id,
                    day_bucket = %reward.day_bucket,
                    "Game reward already claimed (idempotent)"
                );
                Ok((reward, true))
            }
            Ok((reward, false)) => {
                self.commit(transaction).await?;
                tracing::info!(
                    user_id = %reward.user_id,
                    day_bucket = %reward.day_bucket,
                    points,
                    "Game reward claimed"
                );
                Ok((reward, false))
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_game_reward_claim(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        session: &GameSortingSession,
        points: i64,
        now: &str,
    ) -> Result<(GameSortingReward, bool), AppError> {
        let guard_id = GameSortingReward::doc_id(&session.user_id, &session.day_bucket);

        // The guard read lands in the transaction's read set, so of two
        // racing claims only one commit can succeed; the loser retries
        // or surfaces the conflict and the guard blocks it either way.
        let existing: Option<GameSortingReward> = self
            .get_by_id_in_tx(transaction, collections::GAME_REWARDS, &guard_id)
            .await?;
        if let Some(reward) = existing {
            return Ok((reward, true));
        }

        let mut user: User = self
            .get_by_id_in_tx(transaction, collections::USERS, &session.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", session.user_id)))?;

        let mut session = session.clone();
        session.is_completed = true;

        user.total_points += points;
        user.updated_at = now.to_string();

        let reward = GameSortingReward {
            id: guard_id.clone(),
            user_id: session.user_id.clone(),
            game_sorting_id: Some(session.id.clone()),
            day_bucket: session.day_bucket.clone(),
            points_awarded: points,
            claimed_at: now.to_string(),
        };

        let entry = Self::new_ledger_entry(
            &user.id,
            points,
            PointsSource::Game,
            Some(session.id.clone()),
            now,
        )?;

        self.stage_upsert(transaction, collections::GAME_SESSIONS, &session.id, &session)?;
        self.stage_upsert(transaction, collections::GAME_REWARDS, &guard_id, &reward)?;
        self.stage_points_change(transaction, &user, &entry)?;
        Ok((reward, false))
    }

    // ─── Voucher Operations ──────────────────────────────────────

    /// Vouchers are keyed by slug.
    pub async fn get_voucher(&self, slug: &str) -> Result<Option<Voucher>, AppError> {
        self.get_by_id(collections::VOUCHERS, slug).await
    }

    pub async fn upsert_voucher(&self, voucher: &Voucher) -> Result<(), AppError> {
        self.upsert_doc(collections::VOUCHERS, &voucher.slug, voucher)
            .await
    }

    pub async fn list_vouchers(&self) -> Result<Vec<Voucher>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::VOUCHERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn redemptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<VoucherRedemption>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::VOUCHER_REDEMPTIONS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("redeemed_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Redeem a voucher: stock decrement, redeemed-count increment,
    /// balance debit, redemption record, ledger append — all five
    /// mutations commit or none do. Eligibility is re-checked inside
    /// the transaction window so a concurrent redemption of the last
    /// unit aborts cleanly.
    pub async fn redeem_voucher_atomic(
        &self,
        slug: &str,
        user_id: &str,
        code: String,
        now: &str,
    ) -> Result<VoucherRedemption, AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_voucher_redemption(&mut transaction, slug, user_id, code, now)
            .await
        {
            Ok(redemption) => {
                self.commit(transaction).await?;
                tracing::info!(
                    user_id,
                    voucher = slug,
                    points = redemption.points_deducted,
                    "Voucher redeemed"
                );
                Ok(redemption)
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_voucher_redemption(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        slug: &str,
        user_id: &str,
        code: String,
        now: &str,
    ) -> Result<VoucherRedemption, AppError> {
        // Stock and balance are re-read under the transaction so a
        // concurrent redemption of the last unit fails at commit.
        let voucher: Option<Voucher> = self
            .get_by_id_in_tx(transaction, collections::VOUCHERS, slug)
            .await?;
        let mut voucher =
            voucher.ok_or_else(|| AppError::NotFound(format!("Voucher {} not found", slug)))?;
        voucher.check_available(now)?;

        let mut user: User = self
            .get_by_id_in_tx(transaction, collections::USERS, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if user.total_points < voucher.points_required {
            return Err(AppError::InsufficientPoints(format!(
                "need {} points, have {}",
                voucher.points_required, user.total_points
            )));
        }

        if let Some(stock) = voucher.stock {
            voucher.stock = Some((stock - 1).max(0));
        }
        voucher.redeemed_count += 1;

        user.total_points -= voucher.points_required;
        user.updated_at = now.to_string();

        let redemption = VoucherRedemption {
            id: new_doc_id()?,
            voucher_id: voucher.id.clone(),
            user_id: user_id.to_string(),
            points_deducted: voucher.points_required,
            code,
            status: crate::models::RedemptionStatus::Unused,
            redeemed_at: now.to_string(),
            expires_at: voucher.valid_until.clone(),
        };

        let entry = Self::new_ledger_entry(
            user_id,
            -voucher.points_required,
            PointsSource::Voucher,
            Some(redemption.id.clone()),
            now,
        )?;

        self.stage_upsert(transaction, collections::VOUCHERS, &voucher.slug, &voucher)?;
        self.stage_upsert(
            transaction,
            collections::VOUCHER_REDEMPTIONS,
            &redemption.id,
            &redemption,
        )?;
        self.stage_points_change(transaction, &user, &entry)?;
        Ok(redemption)
    }

    // ─── Reward / Milestone Operations ───────────────────────────

    pub async fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, AppError> {
        let query = self.get_client()?.fluent().select().from(collections::REWARDS);
        let query = if active_only {
            query.filter(|q| q.for_all([q.field("is_active").eq(true)]))
        } else {
            query
        };
        query
            .order_by([("target_days", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_reward(&self, reward: &Reward) -> Result<(), AppError> {
        self.upsert_doc(collections::REWARDS, &reward.id, reward)
            .await
    }

    /// Look up a reward by code. Codes are stored trimmed; matching is
    /// case-insensitive.
    pub async fn reward_by_code(&self, code: &str) -> Result<Option<Reward>, AppError> {
        let rewards = self.list_rewards(false).await?;
        Ok(rewards
            .into_iter()
            .find(|r| r.code.eq_ignore_ascii_case(code)))
    }

    pub async fn get_milestone_claim(
        &self,
        user_id: &str,
        reward_id: &str,
    ) -> Result<Option<MilestoneClaim>, AppError> {
        self.get_by_id(
            collections::MILESTONE_CLAIMS,
            &MilestoneClaim::doc_id(user_id, reward_id),
        )
        .await
    }

    pub async fn upsert_milestone_claim(&self, claim: &MilestoneClaim) -> Result<(), AppError> {
        self.upsert_doc(collections::MILESTONE_CLAIMS, &claim.id, claim)
            .await
    }

    pub async fn claims_for_user(&self, user_id: &str) -> Result<Vec<MilestoneClaim>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MILESTONE_CLAIMS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Award a milestone exactly once per (user, reward). The guard is
    /// the claim document keyed `{user_id}_{reward_id}`; an existing
    /// claim with points already awarded aborts with a conflict.
    pub async fn claim_milestone_atomic(
        &self,
        user: &User,
        reward: &Reward,
        progress_days: u32,
        now: &str,
    ) -> Result<MilestoneClaim, AppError> {
        let mut transaction = self.begin().await?;
        match self
            .stage_milestone_award(&mut transaction, user, reward, progress_days, now)
            .await
        {
            Ok(claim) => {
                self.commit(transaction).await?;
                tracing::info!(
                    user_id = %claim.user_id,
                    reward_code = %claim.code,
                    points = claim.points_awarded,
                    "Milestone reward claimed"
                );
                Ok(claim)
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                Err(e)
            }
        }
    }

    async fn stage_milestone_award(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user: &User,
        reward: &Reward,
        progress_days: u32,
        now: &str,
    ) -> Result<MilestoneClaim, AppError> {
        let claim_id = MilestoneClaim::doc_id(&user.id, &reward.id);

        // Guard and balance are re-read under the transaction so a
        // concurrent claim of the same reward fails at commit.
        let existing: Option<MilestoneClaim> = self
            .get_by_id_in_tx(transaction, collections::MILESTONE_CLAIMS, &claim_id)
            .await?;
        if existing.as_ref().is_some_and(|c| c.is_awarded()) {
            return Err(AppError::Conflict("reward already claimed".to_string()));
        }

        let mut user: User = self
            .get_by_id_in_tx(transaction, collections::USERS, &user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;

        let claim = MilestoneClaim {
            id: claim_id.clone(),
            user_id: user.id.clone(),
            reward_id: reward.id.clone(),
            code: reward.code.clone(),
            progress_days,
            points_awarded: reward.points_reward,
            status: ClaimStatus::Completed,
            claimed_at: Some(now.to_string()),
            updated_at: now.to_string(),
        };

        user.total_points += reward.points_reward;
        user.updated_at = now.to_string();

        let entry = Self::new_ledger_entry(
            &user.id,
            reward.points_reward,
            PointsSource::Reward,
            Some(reward.code.clone()),
            now,
        )?;

        self.stage_upsert(
            transaction,
            collections::MILESTONE_CLAIMS,
            &claim_id,
            &claim,
        )?;
        self.stage_points_change(transaction, &user, &entry)?;
        Ok(claim)
    }

    // ─── Ledger Operations ───────────────────────────────────────

    /// Search a user's ledger with filters and pagination.
    ///
    /// Returns the matching page plus the total match count. Multi-
    /// source filtering happens in memory; everything else is pushed
    /// into the query.
    pub async fn search_ledger(
        &self,
        query: &LedgerQuery,
    ) -> Result<(Vec<PointsLedgerEntry>, usize), AppError> {
        let user_id = query.user_id.clone();
        let single_source = (query.sources.len() == 1).then(|| query.sources[0]);
        let from = query.from.clone();
        let to = query.to.clone();
        let (min_amount, max_amount) = query.effective_amount_bounds();

        let entries: Vec<PointsLedgerEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POINTS_LEDGER)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    single_source.and_then(|s| q.field("source").eq(s.as_str())),
                    from.clone()
                        .and_then(|f| q.field("created_at").greater_than_or_equal(f)),
                    to.clone()
                        .and_then(|t| q.field("created_at").less_than_or_equal(t)),
                    min_amount.and_then(|m| q.field("amount").greater_than_or_equal(m)),
                    max_amount.and_then(|m| q.field("amount").less_than_or_equal(m)),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let filtered: Vec<PointsLedgerEntry> = if query.sources.len() > 1 {
            entries
                .into_iter()
                .filter(|e| query.sources.contains(&e.source))
                .collect()
        } else {
            entries
        };

        let total = filtered.len();
        let limit = query.limit.clamp(1, 100) as usize;
        let offset = (query.page.max(1) as usize - 1) * limit;
        let page: Vec<PointsLedgerEntry> =
            filtered.into_iter().skip(offset).take(limit).collect();

        Ok((page, total))
    }

    /// Sum of all ledger amounts for a user (reconciliation).
    pub async fn ledger_sum(&self, user_id: &str) -> Result<i64, AppError> {
        let user_id_owned = user_id.to_string();
        let entries: Vec<PointsLedgerEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POINTS_LEDGER)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id_owned.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }

    // ─── Deletion Helpers ────────────────────────────────────────

    pub async fn delete_leaf(&self, leaf_id: &str) -> Result<(), AppError> {
        self.delete_by_id(collections::TREE_LEAVES, leaf_id).await
    }
}
