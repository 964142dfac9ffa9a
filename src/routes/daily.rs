// SPDX-License-Identifier: MIT

//! Daily task routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::daily_tasks::{CompletionResult, TodayTasks};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/daily/today", get(get_today))
        .route("/api/daily/checklist/{id}/complete", post(complete_item))
        .route("/api/daily/checklist/{id}/uncheck", post(uncheck_item))
}

/// Today's 5 tasks with the user's completion state.
async fn get_today(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TodayTasks>> {
    let user = super::current_user(&state, &auth).await?;
    let today = state
        .daily_tasks
        .get_today_tasks(&user, chrono::Utc::now())
        .await?;
    Ok(Json(today))
}

async fn complete_item(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(item_id): Path<String>,
) -> Result<Json<CompletionResult>> {
    let user = super::current_user(&state, &auth).await?;
    let result = state
        .daily_tasks
        .complete(&user, &item_id, chrono::Utc::now())
        .await?;
    Ok(Json(result))
}

async fn uncheck_item(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(item_id): Path<String>,
) -> Result<Json<crate::models::DailyTaskChecklistItem>> {
    let user = super::current_user(&state, &auth).await?;
    let item = state
        .daily_tasks
        .uncheck(&user, &item_id, chrono::Utc::now())
        .await?;
    Ok(Json(item))
}
