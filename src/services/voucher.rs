// SPDX-License-Identifier: MIT

//! Voucher catalogue, redemption preview and redemption.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Voucher, VoucherRedemption};
use crate::time_utils;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;

/// Catalogue listing filters. All optional; matching is in memory
/// because the catalogue is small.
#[derive(Debug, Default, Clone)]
pub struct VoucherFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub active_only: bool,
    pub page: u32,
    pub limit: u32,
}

#[derive(Serialize)]
pub struct VoucherPage {
    pub vouchers: Vec<Voucher>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

/// What a redemption would look like, without committing anything.
#[derive(Serialize)]
pub struct RedemptionPreview {
    pub voucher: Voucher,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub user_points: i64,
    pub points_required: i64,
    /// min(100, floor(balance * 100 / required)).
    pub progress_percent: u8,
}

#[derive(Clone)]
pub struct VoucherService {
    db: FirestoreDb,
}

impl VoucherService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &VoucherFilter) -> Result<VoucherPage> {
        let mut vouchers = self.db.list_vouchers().await?;
        if filter.active_only {
            vouchers.retain(|v| v.is_active);
        }
        if let Some(category) = &filter.category {
            vouchers.retain(|v| v.category.as_deref() == Some(category.as_str()));
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            vouchers.retain(|v| v.name.to_lowercase().contains(&needle));
        }
        vouchers.sort_by(|a, b| a.points_required.cmp(&b.points_required));

        let total = vouchers.len();
        let limit = filter.limit.clamp(1, 100) as usize;
        let offset = (filter.page.max(1) as usize - 1) * limit;
        let page: Vec<Voucher> = vouchers.into_iter().skip(offset).take(limit).collect();

        Ok(VoucherPage {
            vouchers: page,
            page: filter.page.max(1),
            limit: limit as u32,
            total,
        })
    }

    pub async fn get(&self, slug: &str) -> Result<Voucher> {
        self.db
            .get_voucher(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Voucher {} not found", slug)))
    }

    /// Check what a redemption would do: availability plus balance.
    pub async fn preview(
        &self,
        user_id: &str,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<RedemptionPreview> {
        let voucher = self.get(slug).await?;
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let now_str = time_utils::format_utc_rfc3339(now);
        let reason = match voucher.check_available(&now_str) {
            Ok(()) if user.total_points < voucher.points_required => {
                Some("insufficient points".to_string())
            }
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        };

        let progress_percent = if voucher.points_required <= 0 {
            100
        } else {
            ((user.total_points.max(0) * 100 / voucher.points_required).min(100)) as u8
        };

        Ok(RedemptionPreview {
            eligible: reason.is_none(),
            reason,
            user_points: user.total_points,
            points_required: voucher.points_required,
            progress_percent,
            voucher,
        })
    }

    /// Redeem a voucher for points.
    ///
    /// Eligibility and balance are (re)checked inside the transaction;
    /// nothing here is authoritative beyond generating the code.
    pub async fn redeem(
        &self,
        user_id: &str,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<VoucherRedemption> {
        let voucher = self.get(slug).await?;
        let code = generate_redemption_code(&voucher.slug)?;
        let now_str = time_utils::format_utc_rfc3339(now);
        self.db
            .redeem_voucher_atomic(slug, user_id, code, &now_str)
            .await
    }

    pub async fn redemption_history(&self, user_id: &str) -> Result<Vec<VoucherRedemption>> {
        self.db.redemptions_for_user(user_id).await
    }
}

/// Human-readable redemption code: 3-char slug prefix, dash, 6 hex
/// digits from the system CSPRNG. Example: `KOP-3FA91C`.
fn generate_redemption_code(slug: &str) -> Result<String> {
    let prefix: String = slug
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let prefix = if prefix.is_empty() {
        "VCH".to_string()
    } else {
        prefix
    };

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 3];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;

    Ok(format!("{}-{}", prefix, hex::encode(bytes).to_uppercase()))
}
