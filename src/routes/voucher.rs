// SPDX-License-Identifier: MIT

//! Voucher catalogue and redemption routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Voucher, VoucherRedemption};
use crate::services::voucher::{RedemptionPreview, VoucherFilter, VoucherPage};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/vouchers", get(list_vouchers))
        .route("/api/vouchers/{slug}", get(get_voucher))
        .route("/api/vouchers/{slug}/preview", get(preview_redemption))
        .route("/api/vouchers/{slug}/redeem", post(redeem_voucher))
        .route("/api/redemptions", get(redemption_history))
}

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
    search: Option<String>,
    #[serde(default)]
    include_inactive: bool,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    20
}

async fn list_vouchers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<VoucherPage>> {
    let filter = VoucherFilter {
        category: query.category,
        search: query.search,
        active_only: !query.include_inactive,
        page: query.page,
        limit: query.limit,
    };
    Ok(Json(state.vouchers.list(&filter).await?))
}

async fn get_voucher(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Voucher>> {
    Ok(Json(state.vouchers.get(&slug).await?))
}

async fn preview_redemption(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> Result<Json<RedemptionPreview>> {
    let preview = state
        .vouchers
        .preview(&auth.user_id, &slug, chrono::Utc::now())
        .await?;
    Ok(Json(preview))
}

async fn redeem_voucher(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> Result<Json<VoucherRedemption>> {
    let redemption = state
        .vouchers
        .redeem(&auth.user_id, &slug, chrono::Utc::now())
        .await?;
    Ok(Json(redemption))
}

async fn redemption_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<VoucherRedemption>>> {
    Ok(Json(state.vouchers.redemption_history(&auth.user_id).await?))
}
