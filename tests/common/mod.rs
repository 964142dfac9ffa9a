// SPDX-License-Identifier: MIT

use ecogrow::config::Config;
use ecogrow::db::FirestoreDb;
use ecogrow::models::{StreakState, User};
use ecogrow::routes::create_router;
use ecogrow::services::{LogNotifier, SharedNotifier};
use ecogrow::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Default notifier for tests.
#[allow(dead_code)]
pub fn test_notifier() -> SharedNotifier {
    Arc::new(LogNotifier)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let state = Arc::new(AppState::new(config, db, test_notifier()));
    (create_router(state.clone()), state)
}

/// Insert a fresh user with the given balance and return it.
#[allow(dead_code)]
pub async fn seed_user(db: &FirestoreDb, id: &str, total_points: i64) -> User {
    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        username: id.to_string(),
        total_points,
        habit_streak: StreakState::default(),
        sorting_streak: StreakState::default(),
        created_at: now.clone(),
        updated_at: now,
    };
    db.upsert_user(&user).await.expect("Failed to seed user");
    user
}
