// SPDX-License-Identifier: MIT

//! Ecogrow API Server
//!
//! Gamified waste-habit backend: daily eco-tasks, streaks, the virtual
//! tree, ecoenzym fermentation projects, the sorting mini-game and
//! voucher redemption, settled through an append-only points ledger.

use ecogrow::{
    config::Config,
    db::FirestoreDb,
    services::{scheduler, LogNotifier, SharedNotifier},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Ecogrow API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let notifier: SharedNotifier = Arc::new(LogNotifier);

    // Background maintenance jobs (streak reset, leaf sweep, ecoenzym expiry)
    if config.run_scheduler {
        scheduler::start(db.clone(), notifier.clone());
        tracing::info!("Scheduler started");
    }

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, notifier));

    // Build router
    let app = ecogrow::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ecogrow=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
