// SPDX-License-Identifier: MIT

//! Notification hooks.
//!
//! Engines publish events through a [`NotificationHook`]; delivery is
//! fire-and-forget and must never block or fail a core operation. The
//! default implementation just traces.

use std::sync::Arc;

/// Events published by the engines.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A user's daily task set was materialized for a new day bucket.
    DailyTasksReady { user_id: String, date: String },
    /// An ecoenzym milestone photo passed verification.
    EcoenzymMilestoneVerified {
        user_id: String,
        project_id: String,
        month_number: u8,
    },
    /// The daily sorting-game reward was credited.
    GameRewardClaimed { user_id: String, points: i64 },
    /// A new fruit spawned and is waiting to be harvested.
    FruitReady { user_id: String, fruit_id: String },
}

/// Outbound notification sink.
///
/// Implementations must return quickly; anything slow (push delivery,
/// email) belongs behind an internal channel or spawned task.
pub trait NotificationHook: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

pub type SharedNotifier = Arc<dyn NotificationHook>;

/// Default hook: structured log lines only.
#[derive(Default)]
pub struct LogNotifier;

impl NotificationHook for LogNotifier {
    fn notify(&self, event: NotificationEvent) {
        match event {
            NotificationEvent::DailyTasksReady { user_id, date } => {
                tracing::info!(user_id, date, "notify: daily tasks ready");
            }
            NotificationEvent::EcoenzymMilestoneVerified {
                user_id,
                project_id,
                month_number,
            } => {
                tracing::info!(
                    user_id,
                    project_id,
                    month_number,
                    "notify: ecoenzym milestone verified"
                );
            }
            NotificationEvent::GameRewardClaimed { user_id, points } => {
                tracing::info!(user_id, points, "notify: game reward claimed");
            }
            NotificationEvent::FruitReady { user_id, fruit_id } => {
                tracing::info!(user_id, fruit_id, "notify: fruit ready");
            }
        }
    }
}
