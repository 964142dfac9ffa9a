// SPDX-License-Identifier: MIT

//! Virtual tree routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::TreeFruit;
use crate::services::tree::TreeView;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tree", get(get_tree))
        .route("/api/tree/fruits", get(get_fruits))
        .route("/api/tree/fruits/{id}/claim", post(claim_fruit))
}

async fn get_tree(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TreeView>> {
    Ok(Json(state.tree.get_tree(&auth.user_id).await?))
}

async fn get_fruits(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TreeFruit>>> {
    Ok(Json(state.tree.unclaimed_fruits(&auth.user_id).await?))
}

#[derive(Serialize)]
struct ClaimFruitResponse {
    fruit: TreeFruit,
    points_awarded: i64,
    total_points: i64,
}

async fn claim_fruit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(fruit_id): Path<String>,
) -> Result<Json<ClaimFruitResponse>> {
    let (fruit, user) = state
        .tree
        .claim_fruit(&auth.user_id, &fruit_id, chrono::Utc::now())
        .await?;
    Ok(Json(ClaimFruitResponse {
        points_awarded: fruit.points_awarded,
        total_points: user.total_points,
        fruit,
    }))
}
