// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local runs (`STORE=memory`) and tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::db::{day_document_id, NagStore};
use crate::error::AppError;
use crate::models::{
    ActivityPatch, DailyActivity, ReminderEvent, ReminderSettings, Stats, User, WeightLog,
};

/// Same keyed layout as the Firestore collections, held in `DashMap`s.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    settings: DashMap<String, ReminderSettings>,
    reminders: DashMap<String, ReminderEvent>,
    activity: DashMap<String, DailyActivity>,
    stats: DashMap<String, Stats>,
    weights: DashMap<String, WeightLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every logged reminder across users, oldest first.
    pub fn all_reminders(&self) -> Vec<ReminderEvent> {
        let mut events: Vec<ReminderEvent> =
            self.reminders.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.sent_at);
        events
    }
}

#[async_trait]
impl NagStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.value().clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn reminder_settings(&self, user_id: &str) -> Result<ReminderSettings, AppError> {
        Ok(self
            .settings
            .get(user_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn set_reminder_settings(
        &self,
        user_id: &str,
        settings: &ReminderSettings,
    ) -> Result<(), AppError> {
        self.settings.insert(user_id.to_string(), settings.clone());
        Ok(())
    }

    async fn reminders_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        Ok(self
            .reminders
            .iter()
            .filter(|e| e.user_id == user_id && e.day == day)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn recent_reminders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        let mut events: Vec<ReminderEvent> = self
            .reminders
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        events.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn log_reminder(&self, event: &ReminderEvent) -> Result<(), AppError> {
        self.reminders.insert(event.document_id(), event.clone());
        Ok(())
    }

    async fn daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyActivity>, AppError> {
        Ok(self
            .activity
            .get(&day_document_id(user_id, date))
            .map(|a| a.value().clone()))
    }

    async fn upsert_daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
        patch: &ActivityPatch,
    ) -> Result<DailyActivity, AppError> {
        let mut row = self
            .activity
            .entry(day_document_id(user_id, date))
            .or_insert_with(|| DailyActivity::new(user_id, date));
        row.apply(patch);
        Ok(row.value().clone())
    }

    async fn activity_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyActivity>, AppError> {
        let mut rows: Vec<DailyActivity> = self
            .activity
            .iter()
            .filter(|a| a.user_id == user_id && a.date >= since)
            .map(|a| a.value().clone())
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn stats(&self, user_id: &str) -> Result<Option<Stats>, AppError> {
        Ok(self.stats.get(user_id).map(|s| s.value().clone()))
    }

    async fn set_stats(&self, user_id: &str, stats: &Stats) -> Result<(), AppError> {
        self.stats.insert(user_id.to_string(), stats.clone());
        Ok(())
    }

    async fn record_day(
        &self,
        user_id: &str,
        workout_done: bool,
    ) -> Result<Option<Stats>, AppError> {
        // The shard lock is held for the whole update.
        Ok(self.stats.get_mut(user_id).map(|mut stats| {
            stats.record_day(workout_done);
            stats.value().clone()
        }))
    }

    async fn log_weight(&self, entry: &WeightLog) -> Result<(), AppError> {
        self.weights.insert(
            day_document_id(&entry.user_id, entry.logged_on),
            entry.clone(),
        );
        Ok(())
    }

    async fn weight_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<WeightLog>, AppError> {
        let mut entries: Vec<WeightLog> = self
            .weights
            .iter()
            .filter(|w| w.user_id == user_id && w.logged_on >= since)
            .map(|w| w.value().clone())
            .collect();
        entries.sort_by_key(|w| w.logged_on);
        Ok(entries)
    }
}
