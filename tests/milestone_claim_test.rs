// SPDX-License-Identifier: MIT

//! Streak milestone rewards: progress tracking and one-time award.

use ecogrow::db::FirestoreDb;
use ecogrow::error::AppError;
use ecogrow::models::{Reward, StreakState};
use ecogrow::services::milestone::MilestoneService;

mod common;
use common::{seed_user, test_db};

async fn seed_reward(db: &FirestoreDb, code: &str, target_days: u32, points: i64) -> Reward {
    let reward = Reward {
        id: format!("reward-{}", code),
        code: code.to_string(),
        name: format!("{}-day streak", target_days),
        description: None,
        points_reward: points,
        target_days,
        is_active: true,
    };
    db.upsert_reward(&reward).await.unwrap();
    reward
}

#[tokio::test]
async fn test_claim_below_target_records_progress() {
    require_emulator!();

    let db = test_db().await;
    let service = MilestoneService::new(db.clone());
    seed_reward(&db, "STREAK7", 7, 70).await;

    let mut user = seed_user(&db, "milestone-user-progress", 0).await;
    user.habit_streak = StreakState {
        current: 3,
        best: 3,
        last_active_bucket: Some("2024-03-10".to_string()),
    };
    db.upsert_user(&user).await.unwrap();

    let outcome = service
        .claim(&user, "STREAK7", chrono::Utc::now())
        .await
        .unwrap();
    assert!(!outcome.awarded);
    assert_eq!(outcome.claim.progress_days, 3);
    assert_eq!(outcome.claim.points_awarded, 0);

    // Repeating below target just refreshes progress.
    user.habit_streak.current = 5;
    db.upsert_user(&user).await.unwrap();
    let outcome = service
        .claim(&user, "STREAK7", chrono::Utc::now())
        .await
        .unwrap();
    assert!(!outcome.awarded);
    assert_eq!(outcome.claim.progress_days, 5);

    // No points moved.
    let balance = db.get_user(&user.id).await.unwrap().unwrap().total_points;
    assert_eq!(balance, 0);
}

#[tokio::test]
async fn test_claim_at_target_awards_exactly_once() {
    require_emulator!();

    let db = test_db().await;
    let service = MilestoneService::new(db.clone());
    seed_reward(&db, "STREAK30", 30, 300).await;

    let mut user = seed_user(&db, "milestone-user-award", 0).await;
    user.habit_streak = StreakState {
        current: 30,
        best: 30,
        last_active_bucket: Some("2024-03-10".to_string()),
    };
    db.upsert_user(&user).await.unwrap();

    // Codes are matched case-insensitively.
    let outcome = service
        .claim(&user, "streak30", chrono::Utc::now())
        .await
        .unwrap();
    assert!(outcome.awarded);
    assert_eq!(outcome.claim.points_awarded, 300);

    let fresh = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(fresh.total_points, 300);
    assert_eq!(db.ledger_sum(&user.id).await.unwrap(), 300);

    let err = service
        .claim(&fresh, "STREAK30", chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Failed repeat left the balance alone.
    let balance = db.get_user(&user.id).await.unwrap().unwrap().total_points;
    assert_eq!(balance, 300);
}

#[tokio::test]
async fn test_unknown_and_inactive_rewards_rejected() {
    require_emulator!();

    let db = test_db().await;
    let service = MilestoneService::new(db.clone());
    let user = seed_user(&db, "milestone-user-bad", 0).await;

    let err = service
        .claim(&user, "NO-SUCH-CODE", chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut inactive = seed_reward(&db, "RETIRED", 7, 70).await;
    inactive.is_active = false;
    db.upsert_reward(&inactive).await.unwrap();
    let err = service
        .claim(&user, "RETIRED", chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}
