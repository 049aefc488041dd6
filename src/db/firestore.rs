// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and WHOOP credential)
//! - Reminder settings and the append-only reminder log
//! - Daily activity rows, streak stats and weight logs

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::{collections, day_document_id, NagStore};
use crate::error::AppError;
use crate::models::{
    ActivityPatch, DailyActivity, ReminderEvent, ReminderSettings, Stats, User, WeightLog,
};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation returns `AppError::Database`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn put<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get<T>(&self, collection: &str, doc_id: &str) -> Result<Option<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl NagStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get(collections::USERS, user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.put(collections::USERS, &user.id, user).await
    }

    // ─── Settings ────────────────────────────────────────────────

    async fn reminder_settings(&self, user_id: &str) -> Result<ReminderSettings, AppError> {
        Ok(self
            .get(collections::REMINDER_SETTINGS, user_id)
            .await?
            .unwrap_or_default())
    }

    async fn set_reminder_settings(
        &self,
        user_id: &str,
        settings: &ReminderSettings,
    ) -> Result<(), AppError> {
        self.put(collections::REMINDER_SETTINGS, user_id, settings)
            .await
    }

    // ─── Reminder Log ────────────────────────────────────────────

    async fn reminders_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        let user_id = user_id.to_string();
        let day = day.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REMINDER_LOGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("day").eq(day.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn recent_reminders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ReminderEvent>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REMINDER_LOGS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([("sent_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn log_reminder(&self, event: &ReminderEvent) -> Result<(), AppError> {
        self.put(collections::REMINDER_LOGS, &event.document_id(), event)
            .await
    }

    // ─── Daily Activity ──────────────────────────────────────────

    async fn daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyActivity>, AppError> {
        self.get(collections::DAILY_ACTIVITY, &day_document_id(user_id, date))
            .await
    }

    /// Read-merge-write inside a transaction so a concurrent sync and
    /// manual edit cannot drop each other's fields.
    async fn upsert_daily_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
        patch: &ActivityPatch,
    ) -> Result<DailyActivity, AppError> {
        let client = self.get_client()?;
        let doc_id = day_document_id(user_id, date);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through the transaction so a concurrent write aborts the commit.
        let current: Option<DailyActivity> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::DAILY_ACTIVITY)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read activity in transaction: {}", e))
            })?;

        let mut row = current.unwrap_or_else(|| DailyActivity::new(user_id, date));
        row.apply(patch);

        client
            .fluent()
            .update()
            .in_col(collections::DAILY_ACTIVITY)
            .document_id(&doc_id)
            .object(&row)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add activity to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(user_id, %date, "Daily activity upserted");
        Ok(row)
    }

    async fn activity_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyActivity>, AppError> {
        let user_id = user_id.to_string();
        let since = since.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_ACTIVITY)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").greater_than_or_equal(since.clone()),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Stats ───────────────────────────────────────────────────

    async fn stats(&self, user_id: &str) -> Result<Option<Stats>, AppError> {
        self.get(collections::STATS, user_id).await
    }

    async fn set_stats(&self, user_id: &str, stats: &Stats) -> Result<(), AppError> {
        self.put(collections::STATS, user_id, stats).await
    }

    async fn record_day(
        &self,
        user_id: &str,
        workout_done: bool,
    ) -> Result<Option<Stats>, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<Stats> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::STATS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read stats in transaction: {}", e))
            })?;

        let Some(mut stats) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };
        stats.record_day(workout_done);

        client
            .fluent()
            .update()
            .in_col(collections::STATS)
            .document_id(user_id)
            .object(&stats)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add stats to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(Some(stats))
    }

    // ─── Weight ──────────────────────────────────────────────────

    async fn log_weight(&self, entry: &WeightLog) -> Result<(), AppError> {
        let doc_id = day_document_id(&entry.user_id, entry.logged_on);
        self.put(collections::WEIGHT_LOGS, &doc_id, entry).await
    }

    async fn weight_history(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<WeightLog>, AppError> {
        let user_id = user_id.to_string();
        let since = since.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WEIGHT_LOGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("logged_on").greater_than_or_equal(since.clone()),
                ])
            })
            .order_by([("logged_on", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
