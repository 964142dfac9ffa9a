// SPDX-License-Identifier: MIT

//! Sorting mini-game routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::GameSortingSession;
use crate::services::game::ClaimOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/game/start", post(start_session))
        .route("/api/game/complete/{id}", post(complete_session))
        .route("/api/game/claim/{id}", post(claim_reward))
}

async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<GameSortingSession>> {
    let session = state
        .game
        .start_session(&auth.user_id, chrono::Utc::now())
        .await?;
    Ok(Json(session))
}

async fn complete_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<GameSortingSession>> {
    let user = super::current_user(&state, &auth).await?;
    let session = state
        .game
        .complete_session(&user, &session_id, chrono::Utc::now())
        .await?;
    Ok(Json(session))
}

async fn claim_reward(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<ClaimOutcome>> {
    let user = super::current_user(&state, &auth).await?;
    let outcome = state
        .game
        .claim_reward(&user, &session_id, chrono::Utc::now())
        .await?;
    Ok(Json(outcome))
}
