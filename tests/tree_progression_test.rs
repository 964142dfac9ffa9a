// SPDX-License-Identifier: MIT

//! Daily task completion growing the tree, fruit spawn and harvest.

use ecogrow::db::FirestoreDb;
use ecogrow::error::AppError;
use ecogrow::models::{DailyTask, LeafStatus};
use ecogrow::services::daily_tasks::{DailyTaskService, DAILY_SET_SIZE};
use ecogrow::services::tree::{TreeService, FRUIT_CLAIM_POINTS, FRUIT_SPAWN_EVERY};

mod common;
use common::{seed_user, test_db, test_notifier};

async fn seed_task_pool(db: &FirestoreDb, count: usize) {
    let now = chrono::Utc::now().to_rfc3339();
    for i in 0..count {
        let task = DailyTask {
            id: format!("task-{:02}", i),
            title: format!("Eco task {}", i),
            category: "habit".to_string(),
            symbol: None,
            created_at: now.clone(),
        };
        db.upsert_daily_task(&task).await.expect("Failed to seed task");
    }
}

fn services(db: &FirestoreDb) -> (DailyTaskService, TreeService) {
    let tree = TreeService::new(db.clone(), test_notifier());
    let daily = DailyTaskService::new(db.clone(), tree.clone(), test_notifier());
    (daily, tree)
}

#[tokio::test]
async fn test_today_set_is_stable_and_materializes_once() {
    require_emulator!();

    let db = test_db().await;
    seed_task_pool(&db, 12).await;
    let (daily, _) = services(&db);
    let user = seed_user(&db, "daily-user-1", 0).await;
    let now = chrono::Utc::now();

    let first = daily.get_today_tasks(&user, now).await.unwrap();
    assert_eq!(first.tasks.len(), DAILY_SET_SIZE);

    let second = daily.get_today_tasks(&user, now).await.unwrap();
    let ids_first: Vec<_> = first.tasks.iter().map(|t| &t.checklist_item_id).collect();
    let ids_second: Vec<_> = second.tasks.iter().map(|t| &t.checklist_item_id).collect();
    assert_eq!(ids_first, ids_second, "same day must give the same set");
}

#[tokio::test]
async fn test_completion_grows_leaf_and_streak() {
    require_emulator!();

    let db = test_db().await;
    seed_task_pool(&db, 12).await;
    let (daily, _) = services(&db);
    let user = seed_user(&db, "daily-user-2", 0).await;
    let now = chrono::Utc::now();

    let today = daily.get_today_tasks(&user, now).await.unwrap();
    let item_id = today.tasks[0].checklist_item_id.clone();

    let result = daily.complete(&user, &item_id, now).await.unwrap();
    assert!(result.item.is_completed);
    assert_eq!(result.habit_streak_current, 1);

    let tracker = db.get_tracker(&user.id).await.unwrap().unwrap();
    assert_eq!(tracker.total_green_leaves, 1);

    // A second completion of the same item conflicts.
    let user = db.get_user(&user.id).await.unwrap().unwrap();
    let err = daily.complete(&user, &item_id, now).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_fifth_green_leaf_spawns_fruit_and_claim_is_exactly_once() {
    require_emulator!();

    let db = test_db().await;
    seed_task_pool(&db, 12).await;
    let (daily, tree) = services(&db);
    let user = seed_user(&db, "daily-user-3", 0).await;
    let now = chrono::Utc::now();

    let today = daily.get_today_tasks(&user, now).await.unwrap();
    let mut fruit_spawned = 0;
    for task in &today.tasks {
        let user = db.get_user(&user.id).await.unwrap().unwrap();
        let result = daily
            .complete(&user, &task.checklist_item_id, now)
            .await
            .unwrap();
        if result.fruit_spawned {
            fruit_spawned += 1;
        }
    }
    assert_eq!(
        fruit_spawned, 1,
        "exactly one fruit after {} green leaves",
        FRUIT_SPAWN_EVERY
    );

    let fruits = tree.unclaimed_fruits(&user.id).await.unwrap();
    assert_eq!(fruits.len(), 1);

    let (fruit, updated_user) = tree.claim_fruit(&user.id, &fruits[0].id, now).await.unwrap();
    assert!(fruit.is_claimed);
    assert_eq!(fruit.points_awarded, FRUIT_CLAIM_POINTS);
    assert_eq!(updated_user.total_points, FRUIT_CLAIM_POINTS);

    let err = tree.claim_fruit(&user.id, &fruits[0].id, now).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Balance unchanged by the failed second claim, ledger agrees.
    let balance = db.get_user(&user.id).await.unwrap().unwrap().total_points;
    assert_eq!(balance, FRUIT_CLAIM_POINTS);
    assert_eq!(db.ledger_sum(&user.id).await.unwrap(), balance);

    let tracker = db.get_tracker(&user.id).await.unwrap().unwrap();
    assert_eq!(tracker.total_fruits_harvested, 1);
}

#[tokio::test]
async fn test_claim_unknown_fruit_is_not_found_without_side_effects() {
    require_emulator!();

    let db = test_db().await;
    let (_, tree) = services(&db);
    let user = seed_user(&db, "daily-user-5", 0).await;

    let err = tree
        .claim_fruit(&user.id, "no-such-fruit", chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let balance = db.get_user(&user.id).await.unwrap().unwrap().total_points;
    assert_eq!(balance, 0);
    assert_eq!(db.ledger_sum(&user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_uncheck_removes_leaf_but_keeps_fruit() {
    require_emulator!();

    let db = test_db().await;
    seed_task_pool(&db, 12).await;
    let (daily, tree) = services(&db);
    let user = seed_user(&db, "daily-user-4", 0).await;
    let now = chrono::Utc::now();

    let today = daily.get_today_tasks(&user, now).await.unwrap();
    for task in &today.tasks {
        let user = db.get_user(&user.id).await.unwrap().unwrap();
        daily
            .complete(&user, &task.checklist_item_id, now)
            .await
            .unwrap();
    }

    // Five greens spawned a fruit; unchecking one task deletes its
    // leaf but the fruit stays.
    let user = db.get_user(&user.id).await.unwrap().unwrap();
    let item_id = &today.tasks[0].checklist_item_id;
    let item = daily.uncheck(&user, item_id, now).await.unwrap();
    assert!(!item.is_completed);
    assert!(item.linked_leaf_id.is_none());

    let tracker = db.get_tracker(&user.id).await.unwrap().unwrap();
    assert_eq!(tracker.total_green_leaves, 4);
    assert_eq!(tree.unclaimed_fruits(&user.id).await.unwrap().len(), 1);

    let view = tree.get_tree(&user.id).await.unwrap();
    assert_eq!(view.leaves.len(), 4);
    assert!(view
        .leaves
        .iter()
        .all(|l| l.status == LeafStatus::Green));
}
