// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures. Each test binary uses a different subset.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Europe::Rome;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use workout_nagger::config::Config;
use workout_nagger::db::{FirestoreDb, MemoryStore, NagStore};
use workout_nagger::error::AppError;
use workout_nagger::models::{
    ActivityPatch, ActivitySnapshot, DailyActivity, ProviderCredential, ReminderEvent,
    ReminderSettings, Stats, User, WeightLog,
};
use workout_nagger::routes::create_router;
use workout_nagger::services::notify::EmailMessage;
use workout_nagger::services::{
    ActivityProvider, EmailSender, NagService, Notifiers, TextSender, WhoopClient, WhoopService,
};
use workout_nagger::AppState;

pub const PRIMARY_EMAIL: &str = "main@example.com";
pub const API_TOKEN: &str = "test_api_token";

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Instant at `hour:minute` Rome time on 2026-03-`day` (CET, UTC+1).
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Rome.with_ymd_and_hms(2026, 3, day, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

pub fn user(id: &str, phone: Option<&str>, connected: bool) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: None,
        phone: phone.map(String::from),
        whoop_user_id: connected.then_some(42),
        credential: connected.then(|| ProviderCredential {
            access_token: format!("access-{}", id),
            refresh_token: format!("refresh-{}", id),
            expires_at: Utc::now() + Duration::days(365),
        }),
    }
}

// ─── Fake WHOOP ──────────────────────────────────────────────────────────────

/// Provider that hands out whatever snapshot the test sets.
#[derive(Default)]
pub struct FakeProvider {
    snapshot: Mutex<ActivitySnapshot>,
    fail: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeProvider {
    pub fn set_snapshot(&self, snapshot: ActivitySnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every snapshot fetch take `ms` milliseconds.
    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActivityProvider for FakeProvider {
    async fn ensure_valid(&self, user: &User) -> Option<String> {
        user.credential.as_ref().map(|c| c.access_token.clone())
    }

    async fn today_snapshot(
        &self,
        _access_token: &str,
        _now: DateTime<Utc>,
    ) -> Result<ActivitySnapshot, AppError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::WhoopApi("connection reset".to_string()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

// ─── Recording senders ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<(String, EmailMessage)>>,
    fail: AtomicBool,
}

impl RecordingEmail {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Delivery("email provider returned 500".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingText {
    pub sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingText {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl TextSender for RecordingText {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Delivery("sms provider returned 500".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// ─── Flaky store ─────────────────────────────────────────────────────────────

/// Memory store that fails every settings read for one user.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub broken_user: String,
}

#[async_trait]
impl NagStore for FlakyStore {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.inner.list_users().await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.inner.get_user(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.inner.get_user_by_email(email).await
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.inner.upsert_user(user).await
    }

    async fn reminder_settings(&self, user_id: &str) -> Result<ReminderSettings, AppError> {
        if user_id == self.broken_user {
            return Err(AppError::Database("deadline exceeded".to_string()));
        }
        self.inner.reminder_settings(user_id).await
    }

    async fn set_reminder_settings(
        &self,
        user_id: &str,
        settings: &ReminderSettings,
    ) -> Result<(), AppError> {
        self.inner.set_reminder_settings(user_id, settings).await
    }

    async fn reminders_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        self.inner.reminders_for_day(user_id, day).await
    }

    async fn recent_reminders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        self.inner.recent_reminders(user_id, limit).await
    }

    async fn log_reminder(&self, event: &ReminderEvent) -> Result<(), AppError> {
        self.inner.log_reminder(event).await
    }

    async fn daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyActivity>, AppError> {
        self.inner.daily_activity(user_id, date).await
    }

    async fn upsert_daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
        patch: &ActivityPatch,
    ) -> Result<DailyActivity, AppError> {
        self.inner.upsert_daily_activity(user_id, date, patch).await
    }

    async fn activity_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyActivity>, AppError> {
        self.inner.activity_history(user_id, since).await
    }

    async fn stats(&self, user_id: &str) -> Result<Option<Stats>, AppError> {
        self.inner.stats(user_id).await
    }

    async fn set_stats(&self, user_id: &str, stats: &Stats) -> Result<(), AppError> {
        self.inner.set_stats(user_id, stats).await
    }

    async fn record_day(
        &self,
        user_id: &str,
        workout_done: bool,
    ) -> Result<Option<Stats>, AppError> {
        self.inner.record_day(user_id, workout_done).await
    }

    async fn log_weight(&self, entry: &WeightLog) -> Result<(), AppError> {
        self.inner.log_weight(entry).await
    }

    async fn weight_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<WeightLog>, AppError> {
        self.inner.weight_history(user_id, since).await
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A nag service over a memory store, fake WHOOP and recording senders.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub email: Arc<RecordingEmail>,
    pub text: Arc<RecordingText>,
    pub nagger: NagService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::default());
        let email = Arc::new(RecordingEmail::default());
        let text = Arc::new(RecordingText::default());

        let notifiers = Notifiers {
            email: Some(email.clone() as Arc<dyn EmailSender>),
            text: Some(text.clone() as Arc<dyn TextSender>),
        };
        let nagger = NagService::new(
            store.clone(),
            provider.clone(),
            notifiers,
            Rome,
            85.0,
        );

        Self {
            store,
            provider,
            email,
            text,
            nagger,
        }
    }

    /// Store `user` with a fresh stats row.
    pub async fn add_user(&self, user: &User) {
        self.store.upsert_user(user).await.unwrap();
        self.store
            .set_stats(&user.id, &Stats::default())
            .await
            .unwrap();
    }

    /// Logged reminder kinds for `user_id` on `day`, oldest first
    /// (email before sms within one check).
    pub async fn kinds(&self, user_id: &str, day: NaiveDate) -> Vec<String> {
        let events = self.store.reminders_for_day(user_id, day).await.unwrap();
        let mut kinds: Vec<_> = events
            .iter()
            .map(|e| (e.sent_at, e.kind.to_string()))
            .collect();
        kinds.sort();
        kinds.into_iter().map(|(_, kind)| kind).collect()
    }

    /// Router over this harness, with the primary user seeded.
    pub async fn app(&self) -> (axum::Router, Arc<AppState>) {
        self.add_user(&User {
            id: PRIMARY_EMAIL.to_string(),
            email: PRIMARY_EMAIL.to_string(),
            name: Some("Main".to_string()),
            phone: None,
            whoop_user_id: None,
            credential: None,
        })
        .await;
        self.app_without_user()
    }

    pub fn app_without_user(&self) -> (axum::Router, Arc<AppState>) {
        let config = Config::test_default();
        let store: Arc<dyn NagStore> = self.store.clone();
        let client = WhoopClient::new(
            config.whoop_client_id.clone(),
            config.whoop_client_secret.clone(),
            config.whoop_redirect_uri.clone(),
            config.provider_timeout,
        );
        let whoop = WhoopService::new(client, store.clone(), config.timezone);

        let state = Arc::new(AppState {
            config,
            store,
            whoop,
            nagger: self.nagger.clone(),
        });

        (create_router(state.clone()), state)
    }
}
