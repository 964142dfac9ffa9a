// SPDX-License-Identifier: MIT

//! Append-only points ledger.
//!
//! Every operation that moves a user's balance appends exactly one
//! entry here, inside the same Firestore transaction as the balance
//! write. Entries are never mutated or deleted; summing a user's
//! entries must always reproduce `User::total_points`.

use serde::{Deserialize, Serialize};

/// Originating engine for a point delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsSource {
    Reward,
    Voucher,
    Ecoenzym,
    Game,
    Tree,
}

impl PointsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsSource::Reward => "reward",
            PointsSource::Voucher => "voucher",
            PointsSource::Ecoenzym => "ecoenzym",
            PointsSource::Game => "game",
            PointsSource::Tree => "tree",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reward" => Some(PointsSource::Reward),
            "voucher" => Some(PointsSource::Voucher),
            "ecoenzym" => Some(PointsSource::Ecoenzym),
            "game" => Some(PointsSource::Game),
            "tree" => Some(PointsSource::Tree),
            _ => None,
        }
    }
}

/// One immutable point delta. Positive = credit, negative = debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub source: PointsSource,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub created_at: String,
}

/// Filter restricting a ledger history query to credits or debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerDirection {
    Credit,
    Debit,
}

/// Filtered, paginated ledger history query.
#[derive(Debug, Clone)]
pub struct LedgerQuery {
    pub user_id: String,
    pub sources: Vec<PointsSource>,
    /// RFC3339 lower bound on created_at (inclusive).
    pub from: Option<String>,
    /// RFC3339 upper bound on created_at (inclusive).
    pub to: Option<String>,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub direction: Option<LedgerDirection>,
    /// 1-indexed page.
    pub page: u32,
    pub limit: u32,
}

impl LedgerQuery {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            sources: Vec::new(),
            from: None,
            to: None,
            min_amount: None,
            max_amount: None,
            direction: None,
            page: 1,
            limit: 20,
        }
    }

    /// Merge the direction filter into the amount bounds:
    /// credit means amount >= 0, debit means amount <= 0.
    pub fn effective_amount_bounds(&self) -> (Option<i64>, Option<i64>) {
        let mut min = self.min_amount;
        let mut max = self.max_amount;
        match self.direction {
            Some(LedgerDirection::Credit) => min = Some(min.unwrap_or(0).max(0)),
            Some(LedgerDirection::Debit) => max = Some(max.unwrap_or(0).min(0)),
            None => {}
        }
        (min, max)
    }
}
