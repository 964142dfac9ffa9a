// SPDX-License-Identifier: MIT

//! Milestone reward routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::milestone::{MilestoneClaimOutcome, RewardProgress};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rewards", get(list_rewards))
        .route("/api/rewards/{code}/claim", post(claim_reward))
}

async fn list_rewards(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<RewardProgress>>> {
    let user = super::current_user(&state, &auth).await?;
    Ok(Json(state.milestones.list_rewards(&user).await?))
}

async fn claim_reward(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<MilestoneClaimOutcome>> {
    let user = super::current_user(&state, &auth).await?;
    let outcome = state
        .milestones
        .claim(&user, &code, chrono::Utc::now())
        .await?;
    Ok(Json(outcome))
}
