// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod daily_tasks;
pub mod ecoenzym;
pub mod game;
pub mod ledger;
pub mod milestone;
pub mod notify;
pub mod scheduler;
pub mod streak;
pub mod tree;
pub mod voucher;

pub use daily_tasks::DailyTaskService;
pub use ecoenzym::EcoenzymService;
pub use game::GameService;
pub use ledger::LedgerService;
pub use milestone::MilestoneService;
pub use notify::{LogNotifier, NotificationEvent, NotificationHook, SharedNotifier};
pub use streak::StreakService;
pub use tree::TreeService;
pub use voucher::VoucherService;
