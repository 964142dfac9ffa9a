// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod daily_task;
pub mod ecoenzym;
pub mod game;
pub mod ledger;
pub mod reward;
pub mod tree;
pub mod user;
pub mod voucher;

pub use daily_task::{DailyTask, DailyTaskChecklistItem};
pub use ecoenzym::{EcoenzymProject, EcoenzymUpload, ProjectStatus, UploadStatus};
pub use game::{GameSortingReward, GameSortingSession};
pub use ledger::{PointsLedgerEntry, PointsSource};
pub use reward::{ClaimStatus, MilestoneClaim, Reward};
pub use tree::{LeafStatus, TreeFruit, TreeLeaf, TreeTracker};
pub use user::{StreakState, User};
pub use voucher::{RedemptionStatus, Voucher, VoucherRedemption};
