// SPDX-License-Identifier: MIT

//! Vouchers and redemption records.

use serde::{Deserialize, Serialize};

/// Redeemable voucher. Document id is the unique slug.
/// `stock == None` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub points_required: i64,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub redeemed_count: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
}

impl Voucher {
    /// Availability check shared by preview and redemption: active,
    /// inside the validity window, and stock remaining (or unlimited).
    /// `now` is an RFC3339 timestamp; the window bounds use the same
    /// format so string comparison is chronological.
    pub fn check_available(&self, now: &str) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if !self.is_active {
            return Err(AppError::InvalidTransition(
                "voucher is not active".to_string(),
            ));
        }
        if let Some(from) = &self.valid_from {
            if from.as_str() > now {
                return Err(AppError::InvalidTransition(
                    "voucher is not yet available".to_string(),
                ));
            }
        }
        if let Some(until) = &self.valid_until {
            if until.as_str() < now {
                return Err(AppError::InvalidTransition("voucher has expired".to_string()));
            }
        }
        if let Some(stock) = self.stock {
            if stock <= 0 {
                return Err(AppError::Conflict("voucher is out of stock".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Unused,
    Used,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRedemption {
    pub id: String,
    pub voucher_id: String,
    pub user_id: String,
    pub points_deducted: i64,
    /// Unique human-readable redemption code.
    pub code: String,
    pub status: RedemptionStatus,
    pub redeemed_at: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}
