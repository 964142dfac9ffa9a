// SPDX-License-Identifier: MIT

//! Ecoenzym fermentation projects.
//!
//! A project ferments organic waste for ~90 days. The user checks in
//! daily (1 pre-point each) and uploads a photo on days 30, 60 and 90
//! (50 pre-points each once an admin verifies). Three verified photos
//! make the project claimable; fewer by the end date cancels it and
//! forfeits the accrual.

use crate::db::{new_doc_id, FirestoreDb};
use crate::error::{AppError, Result};
use crate::models::{EcoenzymProject, EcoenzymUpload, ProjectStatus, UploadStatus};
use crate::services::notify::{NotificationEvent, SharedNotifier};
use crate::time_utils;
use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;

/// Project length in days; the end date is start + this.
pub const PROJECT_LENGTH_DAYS: i64 = 90;
/// Elapsed-day checkpoints that accept a milestone photo.
pub const MILESTONE_DAYS: [i64; 3] = [30, 60, 90];
/// Pre-points per verified milestone photo.
pub const MILESTONE_PRE_POINTS: i64 = 50;
/// Pre-points per daily check-in.
pub const CHECKIN_PRE_POINTS: i64 = 1;
/// Verified milestone photos required to complete a project.
pub const REQUIRED_VERIFIED_UPLOADS: u32 = 3;

const SWEEP_CONCURRENCY: usize = 8;

/// Derive the project status from its stored fields.
///
/// This is the ground truth everywhere; the persisted `status` field is
/// only a cache refreshed on read. Terminal states never move.
///
/// Start and end are compared by WIB day bucket, not by instant: the
/// project stays open through the whole of its final day (day 90), so
/// the day-90 milestone window does not depend on the time of day the
/// project was created.
pub fn derive_status(
    project: &EcoenzymProject,
    verified_count: u32,
    now: &str,
) -> (ProjectStatus, bool) {
    if project.is_claimed {
        return (ProjectStatus::Completed, false);
    }
    if project.status == ProjectStatus::Cancelled {
        return (ProjectStatus::Cancelled, false);
    }
    let ended = match (time_utils::bucket_of(now), time_utils::bucket_of(&project.end_date)) {
        (Some(now_day), Some(end_day)) => now_day > end_day,
        _ => now > project.end_date.as_str(),
    };
    if ended {
        if verified_count >= REQUIRED_VERIFIED_UPLOADS {
            return (ProjectStatus::Completed, true);
        }
        return (ProjectStatus::Cancelled, false);
    }
    let not_started = match (time_utils::bucket_of(now), time_utils::bucket_of(&project.start_date))
    {
        (Some(now_day), Some(start_day)) => now_day < start_day,
        _ => now < project.start_date.as_str(),
    };
    if not_started {
        return (ProjectStatus::NotStarted, false);
    }
    (ProjectStatus::Ongoing, false)
}

/// Project plus the state a client needs to render it.
#[derive(Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: EcoenzymProject,
    pub verified_uploads: u32,
    pub elapsed_days: i64,
}

#[derive(Clone)]
pub struct EcoenzymService {
    db: FirestoreDb,
    notifier: SharedNotifier,
}

impl EcoenzymService {
    pub fn new(db: FirestoreDb, notifier: SharedNotifier) -> Self {
        Self { db, notifier }
    }

    /// Start a new project. `start_date` defaults to now; a future
    /// start leaves the project not-started until the date arrives.
    pub async fn create_project(
        &self,
        user_id: &str,
        organic_waste_weight: f64,
        start_date: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EcoenzymProject> {
        if organic_waste_weight <= 0.0 {
            return Err(AppError::BadRequest(
                "organic_waste_weight must be positive".to_string(),
            ));
        }

        let now_str = time_utils::format_utc_rfc3339(now);
        let start = match start_date {
            Some(s) => {
                let parsed = DateTime::parse_from_rfc3339(&s)
                    .map_err(|_| AppError::BadRequest("invalid start_date".to_string()))?;
                time_utils::format_utc_rfc3339(parsed.with_timezone(&Utc))
            }
            None => now_str.clone(),
        };
        let end = {
            // Start is normalized to Z-format above, reparse cannot fail.
            let parsed = DateTime::parse_from_rfc3339(&start)
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
                .with_timezone(&Utc);
            time_utils::format_utc_rfc3339(parsed + Duration::days(PROJECT_LENGTH_DAYS))
        };

        let starts_later = time_utils::bucket_of(&start)
            .zip(time_utils::bucket_of(&now_str))
            .is_some_and(|(s, n)| s > n);
        let status = if starts_later {
            ProjectStatus::NotStarted
        } else {
            ProjectStatus::Ongoing
        };

        let project = EcoenzymProject {
            id: new_doc_id()?,
            user_id: user_id.to_string(),
            organic_waste_weight,
            start_date: start,
            end_date: end,
            status,
            pre_points_earned: 0,
            points: 0,
            can_claim: false,
            is_claimed: false,
            claimed_at: None,
            created_at: now_str,
        };
        self.db.upsert_project(&project).await?;

        tracing::info!(user_id, project_id = %project.id, "Ecoenzym project created");
        Ok(project)
    }

    pub async fn list_projects(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProjectView>> {
        let projects = self.db.projects_for_user(user_id).await?;
        let mut views = Vec::with_capacity(projects.len());
        for project in projects {
            views.push(self.refresh_view(project, now).await?);
        }
        Ok(views)
    }

    /// Load a project with its status re-derived. Persists the derived
    /// status when it differs from the stored cache.
    pub async fn get_project(
        &self,
        user_id: &str,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProjectView> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;
        self.refresh_view(project, now).await
    }

    async fn refresh_view(
        &self,
        mut project: EcoenzymProject,
        now: DateTime<Utc>,
    ) -> Result<ProjectView> {
        let now_str = time_utils::format_utc_rfc3339(now);
        let verified = self.db.count_verified_uploads(&project.id).await?;
        let (status, can_claim) = derive_status(&project, verified, &now_str);
        if status != project.status || can_claim != project.can_claim {
            project.status = status;
            project.can_claim = can_claim;
            self.db.upsert_project(&project).await?;
        }
        let elapsed_days = time_utils::wib_days_since(&project.start_date, now).unwrap_or(0);
        Ok(ProjectView {
            project,
            verified_uploads: verified,
            elapsed_days,
        })
    }

    pub async fn list_uploads(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Vec<EcoenzymUpload>> {
        self.db
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;
        self.db.uploads_for_project(project_id).await
    }

    /// Record an upload against a project.
    ///
    /// `month_number` 1..=3 is a milestone photo: it needs a photo URL,
    /// is valid only on the exact checkpoint day, is unique per slot
    /// and waits for admin verification. `None` is a daily check-in,
    /// auto-verified with an immediate 1 pre-point credit, at most one
    /// per day bucket.
    pub async fn add_upload(
        &self,
        user_id: &str,
        project_id: &str,
        month_number: Option<u8>,
        photo_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EcoenzymUpload> {
        let now_str = time_utils::format_utc_rfc3339(now);
        let mut project = self
            .db
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;

        let verified = self.db.count_verified_uploads(project_id).await?;
        let (status, _) = derive_status(&project, verified, &now_str);
        if status != ProjectStatus::Ongoing {
            return Err(AppError::InvalidTransition(format!(
                "project is {}, uploads are closed",
                status.as_str()
            )));
        }

        let upload = match month_number {
            Some(month) => {
                if !(1..=3).contains(&month) {
                    return Err(AppError::BadRequest(
                        "month_number must be 1, 2 or 3".to_string(),
                    ));
                }
                let photo_url = photo_url.ok_or_else(|| {
                    AppError::BadRequest("milestone upload requires a photo".to_string())
                })?;
                let elapsed = time_utils::wib_days_since(&project.start_date, now)
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("bad project start date")))?;
                let expected = MILESTONE_DAYS[month as usize - 1];
                if elapsed != expected {
                    return Err(AppError::InvalidTransition(format!(
                        "milestone {} photo is only accepted on day {} (today is day {})",
                        month, expected, elapsed
                    )));
                }
                if self.db.upload_for_month(project_id, month).await?.is_some() {
                    return Err(AppError::Conflict(format!(
                        "milestone {} already uploaded",
                        month
                    )));
                }
                EcoenzymUpload {
                    id: new_doc_id()?,
                    project_id: project_id.to_string(),
                    user_id: user_id.to_string(),
                    month_number: Some(month),
                    photo_url: Some(photo_url),
                    uploaded_date: now_str.clone(),
                    pre_points_earned: 0,
                    status: UploadStatus::Pending,
                }
            }
            None => {
                let today = time_utils::today_bucket(now);
                let existing = self.db.uploads_for_project(project_id).await?;
                let checked_in_today = existing.iter().any(|u| {
                    u.month_number.is_none()
                        && DateTime::parse_from_rfc3339(&u.uploaded_date)
                            .map(|d| time_utils::today_bucket(d.with_timezone(&Utc)) == today)
                            .unwrap_or(false)
                });
                if checked_in_today {
                    return Err(AppError::Conflict("already checked in today".to_string()));
                }
                let upload = EcoenzymUpload {
                    id: new_doc_id()?,
                    project_id: project_id.to_string(),
                    user_id: user_id.to_string(),
                    month_number: None,
                    photo_url,
                    uploaded_date: now_str.clone(),
                    pre_points_earned: CHECKIN_PRE_POINTS,
                    status: UploadStatus::Verified,
                };
                project.pre_points_earned += CHECKIN_PRE_POINTS;
                self.db.upsert_project(&project).await?;
                upload
            }
        };

        self.db.upsert_upload(&upload).await?;
        tracing::info!(
            user_id,
            project_id,
            month_number = ?upload.month_number,
            "Ecoenzym upload recorded"
        );
        Ok(upload)
    }

    /// Admin verification of a pending milestone photo. Credits the
    /// photo's pre-points and recomputes the project accrual from all
    /// verified uploads, so repeated recomputation stays idempotent.
    pub async fn verify_upload(&self, upload_id: &str, now: DateTime<Utc>) -> Result<EcoenzymUpload> {
        let mut upload = self
            .db
            .get_upload(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", upload_id)))?;
        if upload.status != UploadStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "upload is {}, not pending",
                upload.status.as_str()
            )));
        }

        upload.status = UploadStatus::Verified;
        if upload.month_number.is_some() {
            upload.pre_points_earned = MILESTONE_PRE_POINTS;
        }
        self.db.upsert_upload(&upload).await?;

        let mut project = self
            .db
            .get_project(&upload.project_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Project {} not found", upload.project_id))
            })?;
        let all = self.db.uploads_for_project(&upload.project_id).await?;
        project.pre_points_earned = all
            .iter()
            .filter(|u| u.status == UploadStatus::Verified)
            .map(|u| u.pre_points_earned)
            .sum();
        let now_str = time_utils::format_utc_rfc3339(now);
        let verified = self.db.count_verified_uploads(&upload.project_id).await?;
        let (status, can_claim) = derive_status(&project, verified, &now_str);
        project.status = status;
        project.can_claim = can_claim;
        self.db.upsert_project(&project).await?;

        if let Some(month) = upload.month_number {
            self.notifier
                .notify(NotificationEvent::EcoenzymMilestoneVerified {
                    user_id: upload.user_id.clone(),
                    project_id: upload.project_id.clone(),
                    month_number: month,
                });
        }

        tracing::info!(
            upload_id,
            project_id = %upload.project_id,
            accrued = project.pre_points_earned,
            "Ecoenzym upload verified"
        );
        Ok(upload)
    }

    /// Claim a completed project's accrued pre-points into the balance.
    pub async fn claim_points(
        &self,
        user_id: &str,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(EcoenzymProject, i64)> {
        let now_str = time_utils::format_utc_rfc3339(now);
        let project = self
            .db
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;

        if project.is_claimed {
            return Err(AppError::Conflict("project already claimed".to_string()));
        }
        let verified = self.db.count_verified_uploads(project_id).await?;
        let (status, can_claim) = derive_status(&project, verified, &now_str);
        if !can_claim {
            return Err(AppError::InvalidTransition(format!(
                "project is {} and cannot be claimed",
                status.as_str()
            )));
        }

        self.db.claim_ecoenzym_atomic(project_id, &now_str).await
    }

    /// Cancel or complete every ongoing project past its end date.
    /// Idempotent; per-project errors are logged and skipped.
    pub async fn expiry_sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let now_str = time_utils::format_utc_rfc3339(now);
        let expired = self.db.expired_ongoing_projects(&now_str).await?;

        let settled = stream::iter(expired)
            .map(|project| {
                let svc = self.clone();
                let now_str = now_str.clone();
                async move {
                    match svc.settle_expired(project, &now_str).await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::error!(error = %e, "Ecoenzym expiry settle failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(SWEEP_CONCURRENCY)
            .filter(|ok| std::future::ready(*ok))
            .count()
            .await;

        tracing::info!(settled, "Ecoenzym expiry sweep complete");
        Ok(settled)
    }

    async fn settle_expired(&self, mut project: EcoenzymProject, now_str: &str) -> Result<()> {
        let verified = self.db.count_verified_uploads(&project.id).await?;
        let (status, can_claim) = derive_status(&project, verified, now_str);
        if status == project.status && can_claim == project.can_claim {
            return Ok(());
        }
        project.status = status;
        project.can_claim = can_claim;
        self.db.upsert_project(&project).await?;
        tracing::info!(
            project_id = %project.id,
            status = status.as_str(),
            "Expired project settled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(start: &str, end: &str, status: ProjectStatus) -> EcoenzymProject {
        EcoenzymProject {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            organic_waste_weight: 2.5,
            start_date: start.to_string(),
            end_date: end.to_string(),
            status,
            pre_points_earned: 120,
            points: 0,
            can_claim: false,
            is_claimed: false,
            claimed_at: None,
            created_at: start.to_string(),
        }
    }

    const START: &str = "2024-01-01T00:00:00Z";
    const END: &str = "2024-03-31T00:00:00Z";

    #[test]
    fn test_ongoing_before_end_date() {
        let p = project(START, END, ProjectStatus::Ongoing);
        let (status, can_claim) = derive_status(&p, 1, "2024-02-15T00:00:00Z");
        assert_eq!(status, ProjectStatus::Ongoing);
        assert!(!can_claim);
    }

    #[test]
    fn test_not_started_before_start_date() {
        let p = project(START, END, ProjectStatus::NotStarted);
        let (status, _) = derive_status(&p, 0, "2023-12-25T00:00:00Z");
        assert_eq!(status, ProjectStatus::NotStarted);
    }

    #[test]
    fn test_expired_with_enough_uploads_is_claimable() {
        let p = project(START, END, ProjectStatus::Ongoing);
        let (status, can_claim) = derive_status(&p, 3, "2024-04-01T00:00:00Z");
        assert_eq!(status, ProjectStatus::Completed);
        assert!(can_claim);
    }

    #[test]
    fn test_expired_without_uploads_is_cancelled() {
        let p = project(START, END, ProjectStatus::Ongoing);
        let (status, can_claim) = derive_status(&p, 2, "2024-04-01T00:00:00Z");
        assert_eq!(status, ProjectStatus::Cancelled);
        assert!(!can_claim);
    }

    #[test]
    fn test_claimed_project_stays_completed_and_unclaimable() {
        let mut p = project(START, END, ProjectStatus::Completed);
        p.is_claimed = true;
        let (status, can_claim) = derive_status(&p, 3, "2024-05-01T00:00:00Z");
        assert_eq!(status, ProjectStatus::Completed);
        assert!(!can_claim);
    }

    #[test]
    fn test_final_day_stays_open_until_wib_midnight() {
        // Started at exactly 00:00 WIB, so the end instant passes at
        // the very start of day 90. The whole day must stay open.
        let p = project(
            "2023-12-31T17:00:00Z",
            "2024-03-30T17:00:00Z",
            ProjectStatus::Ongoing,
        );
        let (status, _) = derive_status(&p, 2, "2024-03-30T20:00:00Z");
        assert_eq!(status, ProjectStatus::Ongoing);

        // The first instant of day 91 closes it.
        let (status, can_claim) = derive_status(&p, 2, "2024-03-31T17:00:00Z");
        assert_eq!(status, ProjectStatus::Cancelled);
        assert!(!can_claim);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let p = project(START, END, ProjectStatus::Cancelled);
        // Even with enough uploads, cancellation does not reopen.
        let (status, can_claim) = derive_status(&p, 3, "2024-02-01T00:00:00Z");
        assert_eq!(status, ProjectStatus::Cancelled);
        assert!(!can_claim);
    }
}
