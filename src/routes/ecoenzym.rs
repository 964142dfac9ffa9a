// SPDX-License-Identifier: MIT

//! Ecoenzym project routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{EcoenzymProject, EcoenzymUpload};
use crate::services::ecoenzym::ProjectView;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/ecoenzym/projects",
            post(create_project).get(list_projects),
        )
        .route("/api/ecoenzym/projects/{id}", get(get_project))
        .route(
            "/api/ecoenzym/projects/{id}/uploads",
            post(add_upload).get(list_uploads),
        )
        .route("/api/ecoenzym/uploads/{id}/verify", post(verify_upload))
        .route("/api/ecoenzym/projects/{id}/claim", post(claim_points))
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    organic_waste_weight: f64,
    start_date: Option<String>,
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<EcoenzymProject>> {
    let project = state
        .ecoenzym
        .create_project(
            &auth.user_id,
            body.organic_waste_weight,
            body.start_date,
            chrono::Utc::now(),
        )
        .await?;
    Ok(Json(project))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ProjectView>>> {
    let projects = state
        .ecoenzym
        .list_projects(&auth.user_id, chrono::Utc::now())
        .await?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectView>> {
    let project = state
        .ecoenzym
        .get_project(&auth.user_id, &project_id, chrono::Utc::now())
        .await?;
    Ok(Json(project))
}

#[derive(Deserialize)]
struct AddUploadRequest {
    /// 1, 2 or 3 for a milestone photo; omit for a daily check-in.
    month_number: Option<u8>,
    photo_url: Option<String>,
}

async fn add_upload(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(body): Json<AddUploadRequest>,
) -> Result<Json<EcoenzymUpload>> {
    let upload = state
        .ecoenzym
        .add_upload(
            &auth.user_id,
            &project_id,
            body.month_number,
            body.photo_url,
            chrono::Utc::now(),
        )
        .await?;
    Ok(Json(upload))
}

async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<EcoenzymUpload>>> {
    let uploads = state
        .ecoenzym
        .list_uploads(&auth.user_id, &project_id)
        .await?;
    Ok(Json(uploads))
}

async fn verify_upload(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<String>,
) -> Result<Json<EcoenzymUpload>> {
    let upload = state
        .ecoenzym
        .verify_upload(&upload_id, chrono::Utc::now())
        .await?;
    Ok(Json(upload))
}

#[derive(Serialize)]
struct ClaimResponse {
    project: EcoenzymProject,
    points_awarded: i64,
}

async fn claim_points(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ClaimResponse>> {
    let (project, points_awarded) = state
        .ecoenzym
        .claim_points(&auth.user_id, &project_id, chrono::Utc::now())
        .await?;
    Ok(Json(ClaimResponse {
        project,
        points_awarded,
    }))
}
