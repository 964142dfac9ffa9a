// SPDX-License-Identifier: MIT

//! Points history routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::ledger::{LedgerDirection, LedgerQuery, PointsSource};
use crate::services::ledger::HistoryPage;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/points/history", get(get_history))
}

#[derive(Deserialize)]
struct HistoryQuery {
    /// Comma-separated source names, e.g. `game,tree`.
    sources: Option<String>,
    from: Option<String>,
    to: Option<String>,
    min_amount: Option<i64>,
    max_amount: Option<i64>,
    /// `credit` or `debit`.
    direction: Option<String>,
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

async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>> {
    let mut ledger_query = LedgerQuery::for_user(&auth.user_id);

    if let Some(sources) = &query.sources {
        for name in sources.split(',').filter(|s| !s.is_empty()) {
            let source = PointsSource::parse(name.trim())
                .ok_or_else(|| AppError::BadRequest(format!("unknown source {}", name)))?;
            ledger_query.sources.push(source);
        }
    }
    ledger_query.direction = match query.direction.as_deref() {
        None => None,
        Some("credit") => Some(LedgerDirection::Credit),
        Some("debit") => Some(LedgerDirection::Debit),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "direction must be credit or debit, got {}",
                other
            )))
        }
    };
    ledger_query.from = query.from;
    ledger_query.to = query.to;
    ledger_query.min_amount = query.min_amount;
    ledger_query.max_amount = query.max_amount;
    ledger_query.page = query.page;
    ledger_query.limit = query.limit;

    Ok(Json(state.ledger.history(&ledger_query).await?))
}
