// SPDX-License-Identifier: MIT

//! User profile routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::StreakState;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me))
}

/// Current user response.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub total_points: i64,
    pub habit_streak: StreakState,
    pub sorting_streak: StreakState,
}

/// Get current user profile with balance and streaks.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = super::current_user(&state, &auth).await?;
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        total_points: user.total_points,
        habit_streak: user.habit_streak,
        sorting_streak: user.sorting_streak,
    }))
}
