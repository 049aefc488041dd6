//! Database layer (Firestore, with an in-memory store for local runs and tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{
    ActivityPatch, DailyActivity, ProviderCredential, ReminderEvent, ReminderSettings, Stats, User,
    WeightLog,
};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const REMINDER_SETTINGS: &str = "reminder_settings";
    pub const REMINDER_LOGS: &str = "reminder_logs";
    pub const DAILY_ACTIVITY: &str = "daily_activity";
    /// Streak stats (keyed by user_id)
    pub const STATS: &str = "stats";
    pub const WEIGHT_LOGS: &str = "weight_logs";
}

/// Document ID for per-user-per-day records.
pub fn day_document_id(user_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", user_id, date)
}

/// Keyed reads and writes used by the nag service and the API.
#[async_trait]
pub trait NagStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    /// Replace the stored provider credential, keeping the rest of the profile.
    async fn set_credential(
        &self,
        user_id: &str,
        credential: &ProviderCredential,
        whoop_user_id: Option<u64>,
    ) -> Result<(), AppError> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        user.credential = Some(credential.clone());
        if whoop_user_id.is_some() {
            user.whoop_user_id = whoop_user_id;
        }
        self.upsert_user(&user).await
    }

    // ─── Settings ────────────────────────────────────────────────
    /// Stored settings, or [`ReminderSettings::default()`] when none exist.
    async fn reminder_settings(&self, user_id: &str) -> Result<ReminderSettings, AppError>;
    async fn set_reminder_settings(
        &self,
        user_id: &str,
        settings: &ReminderSettings,
    ) -> Result<(), AppError>;

    // ─── Reminder Log ────────────────────────────────────────────
    async fn reminders_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<ReminderEvent>, AppError>;
    /// Most recent events first.
    async fn recent_reminders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReminderEvent>, AppError>;
    async fn log_reminder(&self, event: &ReminderEvent) -> Result<(), AppError>;

    // ─── Daily Activity ──────────────────────────────────────────
    async fn daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyActivity>, AppError>;
    /// Create the row or merge the patch into it; returns the stored row.
    async fn upsert_daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
        patch: &ActivityPatch,
    ) -> Result<DailyActivity, AppError>;
    /// Rows on or after `since`, newest first.
    async fn activity_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyActivity>, AppError>;

    // ─── Stats ───────────────────────────────────────────────────
    async fn stats(&self, user_id: &str) -> Result<Option<Stats>, AppError>;
    async fn set_stats(&self, user_id: &str, stats: &Stats) -> Result<(), AppError>;
    /// Apply one day's outcome to the stats row as a single read-modify-write.
    ///
    /// Returns `None` without writing when the user has no stats row.
    async fn record_day(
        &self,
        user_id: &str,
        workout_done: bool,
    ) -> Result<Option<Stats>, AppError>;

    // ─── Weight ──────────────────────────────────────────────────
    async fn log_weight(&self, entry: &WeightLog) -> Result<(), AppError>;
    /// Entries on or after `since`, oldest first.
    async fn weight_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<WeightLog>, AppError>;
}
