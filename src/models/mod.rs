// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod reminder;
pub mod settings;
pub mod stats;
pub mod user;
pub mod weight;

pub use activity::{
    ActivityPatch, ActivitySnapshot, DailyActivity, RecoverySummary, SleepSummary, WorkoutSummary,
};
pub use reminder::{Channel, ReminderEvent, ReminderKind, Tier};
pub use settings::ReminderSettings;
pub use stats::Stats;
pub use user::{ProviderCredential, User};
pub use weight::WeightLog;
