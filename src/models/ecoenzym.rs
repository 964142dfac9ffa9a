// SPDX-License-Identifier: MIT

//! Ecoenzym fermentation projects and progress uploads.

use serde::{Deserialize, Serialize};

/// Project lifecycle. `Completed` and `Cancelled` are terminal.
///
/// The status is derived, never freely settable; the persisted field is
/// an opportunistic cache of `ecoenzym::derive_status`, which is the
/// ground truth everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    Ongoing,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "not_started",
            ProjectStatus::Ongoing => "ongoing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

/// A ~90-day fermentation project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoenzymProject {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub organic_waste_weight: f64,
    pub start_date: String,
    pub end_date: String,
    pub status: ProjectStatus,
    /// Pre-claim accrual: daily check-in credits plus 50 per verified
    /// milestone photo. Moved into `points` on claim.
    #[serde(default)]
    pub pre_points_earned: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub can_claim: bool,
    #[serde(default)]
    pub is_claimed: bool,
    #[serde(default)]
    pub claimed_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Verified,
    Rejected,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Verified => "verified",
            UploadStatus::Rejected => "rejected",
        }
    }
}

/// A progress upload. `month_number` 1/2/3 marks the day-30/60/90 photo
/// checkpoints (photo required, admin-verified); `None` is a daily
/// check-in, auto-verified with a small pre-point credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoenzymUpload {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    #[serde(default)]
    pub month_number: Option<u8>,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub uploaded_date: String,
    #[serde(default)]
    pub pre_points_earned: i64,
    pub status: UploadStatus,
}
