// SPDX-License-Identifier: MIT

//! Points history queries and ledger reconciliation.

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::ledger::LedgerQuery;
use crate::models::PointsLedgerEntry;
use serde::Serialize;

#[derive(Serialize)]
pub struct HistoryPage {
    pub entries: Vec<PointsLedgerEntry>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    /// Net of the returned page only.
    pub page_net: i64,
}

/// Balance vs ledger comparison. `consistent` must always hold; a
/// mismatch means some write bypassed the transactional helpers.
#[derive(Serialize)]
pub struct Reconciliation {
    pub user_id: String,
    pub balance: i64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct LedgerService {
    db: FirestoreDb,
}

impl LedgerService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    pub async fn history(&self, query: &LedgerQuery) -> Result<HistoryPage> {
        let (entries, total) = self.db.search_ledger(query).await?;
        let page_net = entries.iter().map(|e| e.amount).sum();
        Ok(HistoryPage {
            page_net,
            entries,
            page: query.page.max(1),
            limit: query.limit.clamp(1, 100),
            total,
        })
    }

    pub async fn reconcile(&self, user_id: &str) -> Result<Reconciliation> {
        let balance = self
            .db
            .get_user(user_id)
            .await?
            .map(|u| u.total_points)
            .unwrap_or(0);
        let ledger_sum = self.db.ledger_sum(user_id).await?;
        let consistent = balance == ledger_sum;
        if !consistent {
            tracing::error!(user_id, balance, ledger_sum, "Ledger inconsistency detected");
        }
        Ok(Reconciliation {
            user_id: user_id.to_string(),
            balance,
            ledger_sum,
            consistent,
        })
    }
}
