// SPDX-License-Identifier: MIT

//! Ecogrow: gamified waste-habit backend.
//!
//! This crate provides the backend API for the points-and-progression
//! engine: daily eco-tasks, streaks, the virtual tree, ecoenzym
//! fermentation projects, the sorting mini-game, milestone rewards and
//! voucher redemption, all settled through an append-only points ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{
    DailyTaskService, EcoenzymService, GameService, LedgerService, MilestoneService,
    SharedNotifier, TreeService, VoucherService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub notifier: SharedNotifier,
    pub daily_tasks: DailyTaskService,
    pub tree: TreeService,
    pub ecoenzym: EcoenzymService,
    pub game: GameService,
    pub vouchers: VoucherService,
    pub milestones: MilestoneService,
    pub ledger: LedgerService,
}

impl AppState {
    pub fn new(config: Config, db: FirestoreDb, notifier: SharedNotifier) -> Self {
        let tree = TreeService::new(db.clone(), notifier.clone());
        Self {
            daily_tasks: DailyTaskService::new(db.clone(), tree.clone(), notifier.clone()),
            ecoenzym: EcoenzymService::new(db.clone(), notifier.clone()),
            game: GameService::new(db.clone(), notifier.clone()),
            vouchers: VoucherService::new(db.clone()),
            milestones: MilestoneService::new(db.clone()),
            ledger: LedgerService::new(db.clone()),
            tree,
            config,
            db,
            notifier,
        }
    }
}
