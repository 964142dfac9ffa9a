// SPDX-License-Identifier: MIT

//! Nightly streak reset sweep.

use ecogrow::models::StreakState;
use ecogrow::services::streak::StreakService;
use ecogrow::time_utils;

mod common;
use common::{seed_user, test_db};

#[tokio::test]
async fn test_stale_streaks_reset_fresh_ones_survive() {
    require_emulator!();

    let db = test_db().await;
    let service = StreakService::new(db.clone());
    let now = chrono::Utc::now();
    let today = time_utils::today_bucket(now);
    let yesterday = time_utils::yesterday_bucket(now);
    let long_ago = time_utils::add_days(&yesterday, -3).unwrap();

    // Active yesterday: still within grace, must survive.
    let mut fresh = seed_user(&db, "streak-fresh", 0).await;
    fresh.habit_streak = StreakState {
        current: 4,
        best: 6,
        last_active_bucket: Some(yesterday.clone()),
    };
    db.upsert_user(&fresh).await.unwrap();

    // Active today: survives.
    let mut active = seed_user(&db, "streak-active", 0).await;
    active.sorting_streak = StreakState {
        current: 2,
        best: 2,
        last_active_bucket: Some(today.clone()),
    };
    db.upsert_user(&active).await.unwrap();

    // Last active days ago: both streaks reset, best preserved.
    let mut stale = seed_user(&db, "streak-stale", 0).await;
    stale.habit_streak = StreakState {
        current: 9,
        best: 9,
        last_active_bucket: Some(long_ago.clone()),
    };
    stale.sorting_streak = StreakState {
        current: 3,
        best: 5,
        last_active_bucket: Some(long_ago),
    };
    db.upsert_user(&stale).await.unwrap();

    service.reset_stale_streaks(now).await.unwrap();

    let fresh = db.get_user("streak-fresh").await.unwrap().unwrap();
    assert_eq!(fresh.habit_streak.current, 4);

    let active = db.get_user("streak-active").await.unwrap().unwrap();
    assert_eq!(active.sorting_streak.current, 2);

    let stale = db.get_user("streak-stale").await.unwrap().unwrap();
    assert_eq!(stale.habit_streak.current, 0);
    assert_eq!(stale.sorting_streak.current, 0);
    assert_eq!(stale.habit_streak.best, 9, "best streak is a record, not reset");
    assert_eq!(stale.sorting_streak.best, 5);

    // Sweeping twice is idempotent.
    service.reset_stale_streaks(now).await.unwrap();
    let stale = db.get_user("streak-stale").await.unwrap().unwrap();
    assert_eq!(stale.habit_streak.current, 0);
}
