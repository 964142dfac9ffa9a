// SPDX-License-Identifier: MIT

//! Nightly leaf maintenance: inactivity wilts, renewed activity revives.

use ecogrow::db::FirestoreDb;
use ecogrow::models::{DailyTaskChecklistItem, LeafStatus, TreeLeaf, TreeTracker};
use ecogrow::services::tree::TreeService;
use ecogrow::time_utils;

mod common;
use common::{seed_user, test_db, test_notifier};

async fn seed_leaf(
    db: &FirestoreDb,
    user_id: &str,
    id: &str,
    day_number: u32,
    status: LeafStatus,
    created_date: &str,
) {
    db.upsert_leaf(&TreeLeaf {
        id: id.to_string(),
        user_id: user_id.to_string(),
        day_number,
        status,
        needs_recovery: status == LeafStatus::Yellow,
        checklist_item_id: None,
        created_date: created_date.to_string(),
        status_changed_date: None,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_sweep_wilts_inactive_and_revives_active() {
    require_emulator!();

    let db = test_db().await;
    let service = TreeService::new(db.clone(), test_notifier());
    let now = chrono::Utc::now();
    let yesterday = time_utils::yesterday_bucket(now);
    let (yesterday_start, _) = time_utils::bucket_utc_range(&yesterday).unwrap();

    // Idle user: three green leaves, nothing completed yesterday.
    let idle = seed_user(&db, "sweep-idle", 0).await;
    seed_leaf(&db, &idle.id, "idle-leaf-1", 1, LeafStatus::Green, "2024-03-01T10:00:00Z").await;
    seed_leaf(&db, &idle.id, "idle-leaf-2", 2, LeafStatus::Green, "2024-03-02T10:00:00Z").await;
    seed_leaf(&db, &idle.id, "idle-leaf-3", 3, LeafStatus::Green, "2024-03-03T10:00:00Z").await;
    db.upsert_tracker(&TreeTracker {
        user_id: idle.id.clone(),
        total_green_leaves: 3,
        total_yellow_leaves: 0,
        total_fruits_harvested: 0,
        last_activity_date: None,
    })
    .await
    .unwrap();

    // Recovering user: one wilted leaf, one green, and a completion
    // inside yesterday's bucket.
    let recovering = seed_user(&db, "sweep-recovering", 0).await;
    seed_leaf(
        &db,
        &recovering.id,
        "rec-leaf-1",
        1,
        LeafStatus::Yellow,
        "2024-03-01T10:00:00Z",
    )
    .await;
    seed_leaf(
        &db,
        &recovering.id,
        "rec-leaf-2",
        2,
        LeafStatus::Green,
        "2024-03-02T10:00:00Z",
    )
    .await;
    db.upsert_tracker(&TreeTracker {
        user_id: recovering.id.clone(),
        total_green_leaves: 1,
        total_yellow_leaves: 1,
        total_fruits_harvested: 0,
        last_activity_date: None,
    })
    .await
    .unwrap();
    db.upsert_checklist_item(&DailyTaskChecklistItem {
        id: DailyTaskChecklistItem::doc_id(&recovering.id, "sweep-task"),
        user_id: recovering.id.clone(),
        daily_task_id: "sweep-task".to_string(),
        is_completed: true,
        completed_at: Some(yesterday_start.clone()),
        linked_leaf_id: Some("rec-leaf-2".to_string()),
        created_at: yesterday_start.clone(),
    })
    .await
    .unwrap();

    let touched = service.leaf_inactivity_sweep(now).await.unwrap();
    assert!(touched >= 2, "both seeded users must be touched, got {}", touched);

    // Idle: the oldest green leaf wilted, the others survive.
    let wilted = db.get_leaf("idle-leaf-1").await.unwrap().unwrap();
    assert_eq!(wilted.status, LeafStatus::Yellow);
    assert!(wilted.needs_recovery);
    assert_eq!(
        db.get_leaf("idle-leaf-2").await.unwrap().unwrap().status,
        LeafStatus::Green
    );
    let tracker = db.get_tracker(&idle.id).await.unwrap().unwrap();
    assert_eq!(tracker.total_green_leaves, 2);
    assert_eq!(tracker.total_yellow_leaves, 1);

    // Recovering: the wilted leaf came back green.
    let revived = db.get_leaf("rec-leaf-1").await.unwrap().unwrap();
    assert_eq!(revived.status, LeafStatus::Green);
    assert!(!revived.needs_recovery);
    let tracker = db.get_tracker(&recovering.id).await.unwrap().unwrap();
    assert_eq!(tracker.total_green_leaves, 2);
    assert_eq!(tracker.total_yellow_leaves, 0);
}
