// SPDX-License-Identifier: MIT

//! In-process job scheduler.
//!
//! Maintenance sweeps run as named jobs, each on its own
//! `tokio::time::interval`. A failing run is logged and the interval
//! keeps ticking; one job can never take down its siblings.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::services::ecoenzym::EcoenzymService;
use crate::services::notify::SharedNotifier;
use crate::services::streak::StreakService;
use crate::services::tree::TreeService;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

const DAILY: Duration = Duration::from_secs(24 * 60 * 60);
const HOURLY: Duration = Duration::from_secs(60 * 60);

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, Result<usize, AppError>> + Send + Sync>;

struct Job {
    name: &'static str,
    period: Duration,
    run: JobFn,
}

/// Spawn all maintenance jobs. Returns immediately; the jobs run for
/// the lifetime of the process.
pub fn start(db: FirestoreDb, notifier: SharedNotifier) {
    for job in jobs(db, notifier) {
        tokio::spawn(run_job(job));
    }
}

fn jobs(db: FirestoreDb, notifier: SharedNotifier) -> Vec<Job> {
    let streak = StreakService::new(db.clone());
    let tree = TreeService::new(db.clone(), notifier.clone());
    let ecoenzym = EcoenzymService::new(db, notifier);

    vec![
        Job {
            name: "sorting-streak-reset",
            period: DAILY,
            run: Arc::new(move || {
                let svc = streak.clone();
                Box::pin(async move { svc.reset_stale_streaks(chrono::Utc::now()).await })
            }),
        },
        Job {
            name: "leaf-inactivity-sweep",
            period: DAILY,
            run: Arc::new(move || {
                let svc = tree.clone();
                Box::pin(async move { svc.leaf_inactivity_sweep(chrono::Utc::now()).await })
            }),
        },
        Job {
            name: "ecoenzym-expiry-sweep",
            period: HOURLY,
            run: Arc::new(move || {
                let svc = ecoenzym.clone();
                Box::pin(async move { svc.expiry_sweep(chrono::Utc::now()).await })
            }),
        },
    ]
}

async fn run_job(job: Job) {
    let mut interval = tokio::time::interval(job.period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        tracing::info!(job = job.name, "Job starting");
        match (job.run)().await {
            Ok(affected) => {
                tracing::info!(job = job.name, affected, "Job finished");
            }
            Err(e) => {
                tracing::error!(job = job.name, error = %e, "Job failed");
            }
        }
    }
}
