// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard API routes for the primary user.

use crate::error::{AppError, Result};
use crate::middleware::auth::PrimaryUser;
use crate::models::{
    ActivityPatch, ActivitySnapshot, DailyActivity, RecoverySummary, ReminderEvent,
    ReminderSettings, SleepSummary, Stats, WeightLog, WorkoutSummary,
};
use crate::services::SweepSummary;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const WEIGHT_HISTORY_DAYS: i64 = 90;
const ACTIVITY_HISTORY_DAYS: i64 = 30;
const RECENT_REMINDERS: u32 = 50;

/// API routes (require the API token when configured).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/weight", post(log_weight))
        .route("/api/activity", post(log_activity))
        .route("/api/settings", put(update_settings))
        .route("/api/force-check", post(force_check))
        .route("/api/reminders", get(get_reminders))
        .route("/api/sync-whoop", post(sync_whoop))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct DashboardResponse {
    pub user: DashboardUser,
    pub today: TodayResponse,
    pub stats: Stats,
    pub weight: WeightSummary,
    pub activity_history: Vec<DailyActivity>,
    pub settings: ReminderSettings,
}

#[derive(Serialize)]
pub struct DashboardUser {
    pub email: String,
    pub whoop_connected: bool,
}

#[derive(Serialize)]
pub struct TodayResponse {
    pub workout_done: bool,
    pub workout: Option<WorkoutSummary>,
    pub recovery: Option<RecoverySummary>,
    pub sleep: Option<SleepSummary>,
    pub strain: Option<f64>,
    pub meals_ok: bool,
    pub alcohol: bool,
    pub notes: Option<String>,
    pub reminders_sent: usize,
}

#[derive(Serialize)]
pub struct WeightSummary {
    pub current: f64,
    pub start: f64,
    pub goal: f64,
    pub lost: f64,
    pub to_go: f64,
    pub history: Vec<WeightLog>,
}

impl WeightSummary {
    /// Current weight is the latest entry, or `start` with no entries.
    fn new(history: Vec<WeightLog>, start: f64, goal: f64) -> Self {
        let current = history.last().map(|w| w.weight_kg).unwrap_or(start);
        Self {
            current,
            start,
            goal,
            lost: round1(start - current),
            to_go: round1(current - goal),
            history,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Everything the dashboard page shows, in one call.
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
) -> Result<Json<DashboardResponse>> {
    let now = Utc::now();
    let today = state.nagger.today(now);

    // Live data is best-effort; the stored row covers the rest.
    let snapshot = state.nagger.fetch_snapshot(&user, now).await;

    let (activity, stats, weights, history, reminders, settings) = tokio::try_join!(
        state.store.daily_activity(&user.id, today),
        state.store.stats(&user.id),
        state
            .store
            .weight_history(&user.id, today - Duration::days(WEIGHT_HISTORY_DAYS)),
        state
            .store
            .activity_history(&user.id, today - Duration::days(ACTIVITY_HISTORY_DAYS)),
        state.store.reminders_for_day(&user.id, today),
        state.store.reminder_settings(&user.id),
    )?;

    let snapshot = snapshot.unwrap_or_default();
    let workout_done = snapshot.has_workout || activity.as_ref().is_some_and(|a| a.workout_done);

    Ok(Json(DashboardResponse {
        user: DashboardUser {
            email: user.email.clone(),
            whoop_connected: user.credential.is_some(),
        },
        today: TodayResponse {
            workout_done,
            workout: snapshot.workout,
            recovery: snapshot.recovery,
            sleep: snapshot.sleep,
            strain: snapshot.strain,
            meals_ok: activity.as_ref().and_then(|a| a.meals_ok).unwrap_or(true),
            alcohol: activity.as_ref().and_then(|a| a.alcohol).unwrap_or(false),
            notes: activity.and_then(|a| a.notes),
            reminders_sent: reminders.len(),
        },
        stats: stats.unwrap_or_default(),
        weight: WeightSummary::new(
            weights,
            state.config.weight_start_kg,
            state.config.weight_goal_kg,
        ),
        activity_history: history,
        settings,
    }))
}

// ─── Weight ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct WeightRequest {
    pub weight: f64,
}

/// Log today's weigh-in (replaces an earlier one from the same day).
async fn log_weight(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
    Json(body): Json<WeightRequest>,
) -> Result<Json<WeightLog>> {
    if !(40.0..=200.0).contains(&body.weight) {
        return Err(AppError::BadRequest(
            "weight must be between 40 and 200 kg".to_string(),
        ));
    }

    let entry = WeightLog {
        user_id: user.id.clone(),
        weight_kg: body.weight,
        logged_on: state.nagger.today(Utc::now()),
    };
    state.store.log_weight(&entry).await?;

    tracing::info!(user_id = %user.id, weight_kg = entry.weight_kg, "Weight logged");
    Ok(Json(entry))
}

// ─── Manual activity ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct ActivityRequest {
    #[serde(default)]
    pub workout_done: Option<bool>,
    #[serde(default)]
    pub meals_ok: Option<bool>,
    #[serde(default)]
    pub alcohol: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn log_activity(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
    Json(body): Json<ActivityRequest>,
) -> Result<Json<DailyActivity>> {
    let patch = ActivityPatch {
        workout_done: body.workout_done,
        meals_ok: body.meals_ok,
        alcohol: body.alcohol,
        notes: body.notes,
        ..Default::default()
    };

    let row = state
        .store
        .upsert_daily_activity(&user.id, state.nagger.today(Utc::now()), &patch)
        .await?;
    Ok(Json(row))
}

// ─── Settings ────────────────────────────────────────────────

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
    Json(settings): Json<ReminderSettings>,
) -> Result<Json<ReminderSettings>> {
    settings
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.store.set_reminder_settings(&user.id, &settings).await?;
    tracing::info!(user_id = %user.id, ?settings, "Reminder settings updated");
    Ok(Json(settings))
}

// ─── Manual trigger ──────────────────────────────────────────

#[derive(Serialize)]
pub struct ForceCheckResponse {
    pub success: bool,
    pub message: String,
    pub summary: SweepSummary,
}

/// Run one full escalation sweep now.
async fn force_check(State(state): State<Arc<AppState>>) -> Result<Json<ForceCheckResponse>> {
    tracing::info!("Manual nag sweep requested");
    let summary = state.nagger.run_sweep().await?;
    Ok(Json(ForceCheckResponse {
        success: true,
        message: "Check executed".to_string(),
        summary,
    }))
}

// ─── Reminder history ────────────────────────────────────────

async fn get_reminders(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
) -> Result<Json<Vec<ReminderEvent>>> {
    let events = state
        .store
        .recent_reminders(&user.id, RECENT_REMINDERS)
        .await?;
    Ok(Json(events))
}

// ─── WHOOP sync ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub data: ActivitySnapshot,
    pub activity: DailyActivity,
}

/// Fetch today's WHOOP data now and store it. 401 when not connected.
async fn sync_whoop(
    State(state): State<Arc<AppState>>,
    Extension(PrimaryUser(user)): Extension<PrimaryUser>,
) -> Result<Json<SyncResponse>> {
    let (data, activity) = state.nagger.sync_user(&user, Utc::now()).await?;
    Ok(Json(SyncResponse {
        success: true,
        data,
        activity,
    }))
}
