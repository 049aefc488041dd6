// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nag service: runs the escalation engine for every user and carries out
//! its decisions.
//!
//! For each user a sweep:
//! 1. Gates on settings and the reminder window
//! 2. Fetches today's WHOOP snapshot (falling back to the stored row)
//! 3. Merges the snapshot into today's `DailyActivity`
//! 4. Asks the engine what to send, sends it, and logs each successful send
//!
//! A failure for one user is logged and the sweep moves on.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::NagStore;
use crate::error::AppError;
use crate::models::{
    ActivityPatch, ActivitySnapshot, Channel, DailyActivity, ReminderEvent, ReminderKind, Tier,
    User,
};
use crate::services::escalation::{self, Decision, EscalationInput};
use crate::services::notify::{self, Notifiers, WeeklyReport};
use crate::services::streak;
use crate::services::whoop::ActivityProvider;

/// Counts from one pass over all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub users: usize,
    /// Users whose processing ended in an error
    pub failed: usize,
    /// Notifications delivered and logged
    pub sent: usize,
}

/// Today's state as the dashboard and manual sync see it.
#[derive(Debug, Clone)]
pub struct TodayState {
    pub date: NaiveDate,
    /// `None` when WHOOP is not connected or could not be reached
    pub snapshot: Option<ActivitySnapshot>,
    pub activity: Option<DailyActivity>,
}

impl TodayState {
    pub fn workout_done(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.has_workout)
            || self.activity.as_ref().is_some_and(|a| a.workout_done)
    }
}

#[derive(Clone)]
pub struct NagService {
    store: Arc<dyn NagStore>,
    provider: Arc<dyn ActivityProvider>,
    notifiers: Notifiers,
    tz: Tz,
    goal_kg: f64,
}

impl NagService {
    pub fn new(
        store: Arc<dyn NagStore>,
        provider: Arc<dyn ActivityProvider>,
        notifiers: Notifiers,
        tz: Tz,
        goal_kg: f64,
    ) -> Self {
        Self {
            store,
            provider,
            notifiers,
            tz,
            goal_kg,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Local calendar date of `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    // ─── Escalation sweep ────────────────────────────────────────

    pub async fn run_sweep(&self) -> Result<SweepSummary, AppError> {
        self.run_sweep_at(Utc::now()).await
    }

    /// Evaluate every user at `now`.
    ///
    /// Only failing to list users is an error; per-user failures are counted.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepSummary, AppError> {
        let users = self.store.list_users().await?;
        let mut summary = SweepSummary {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            match self.check_user(user, now).await {
                Ok(sent) => summary.sent += sent,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(user_id = %user.id, error = %e, "Nag check failed for user");
                }
            }
        }

        tracing::info!(
            users = summary.users,
            failed = summary.failed,
            sent = summary.sent,
            "Nag sweep complete"
        );
        Ok(summary)
    }

    /// Run one escalation step for `user`. Returns the number of sends logged.
    pub async fn check_user(&self, user: &User, now: DateTime<Utc>) -> Result<usize, AppError> {
        let local_now = now.with_timezone(&self.tz);
        let settings = self.store.reminder_settings(&user.id).await?;

        if let Some(reason) = escalation::gate(&settings, &local_now) {
            tracing::debug!(user_id = %user.id, ?reason, "Skipping user");
            return Ok(0);
        }

        let state = self.today_state(user, now).await?;
        let today_events = self.store.reminders_for_day(&user.id, state.date).await?;
        let has_phone = user.phone().is_some() && self.notifiers.text.is_some();

        let decision = escalation::decide(&EscalationInput {
            now: local_now,
            settings: &settings,
            today_events: &today_events,
            workout_done: state.workout_done(),
            has_phone,
        });

        match decision {
            Decision::Skip(reason) => {
                tracing::debug!(user_id = %user.id, ?reason, "Skipping user");
                Ok(0)
            }
            Decision::AlreadyCongratulated => {
                tracing::debug!(user_id = %user.id, "Workout done, already congratulated");
                Ok(0)
            }
            Decision::Congratulate => {
                let Some(workout) = state.snapshot.as_ref().and_then(|s| s.workout.as_ref())
                else {
                    // Only the stored row says done, so there is nothing to report.
                    tracing::debug!(
                        user_id = %user.id,
                        "Workout done without live detail, no success email"
                    );
                    return Ok(0);
                };

                let message = notify::success_email(user.display_name(), workout, self.goal_kg);
                if !self
                    .deliver(user, ReminderKind::SUCCESS, &message.subject, now, state.date, || {
                        self.notifiers.send_email(&user.email, &message)
                    })
                    .await?
                {
                    return Ok(0);
                }
                streak::apply(self.store.as_ref(), &user.id, true).await?;
                Ok(1)
            }
            Decision::Nag(plan) if plan.is_empty() => {
                tracing::debug!(
                    user_id = %user.id,
                    emails_sent = plan.emails_sent,
                    sms_sent = plan.sms_sent,
                    "Nothing due yet"
                );
                Ok(0)
            }
            Decision::Nag(plan) => {
                tracing::info!(
                    user_id = %user.id,
                    hours_since_start = plan.hours_since_start,
                    emails_sent = plan.emails_sent,
                    sms_sent = plan.sms_sent,
                    email = ?plan.email,
                    sms = ?plan.sms,
                    "Escalation plan"
                );

                let mut sent = 0;
                for kind in plan.kinds() {
                    if self.send_nag(user, kind, now, state.date).await? {
                        sent += 1;
                    }
                }
                Ok(sent)
            }
        }
    }

    async fn send_nag(
        &self,
        user: &User,
        kind: ReminderKind,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<bool, AppError> {
        let name = user.display_name();
        match kind.channel {
            Channel::Email => {
                let message = notify::nag_email(kind.tier, name);
                self.deliver(user, kind, &message.subject, now, today, || {
                    self.notifiers.send_email(&user.email, &message)
                })
                .await
            }
            Channel::Sms => {
                let Some(phone) = user.phone() else {
                    return Ok(false);
                };
                let body = notify::nag_text(kind.tier, name);
                self.deliver(user, kind, &body, now, today, || {
                    self.notifiers.send_text(phone, &body)
                })
                .await
            }
        }
    }

    /// Send, then log on success.
    ///
    /// A delivery failure is logged and reported as `Ok(false)`; only a
    /// failure to write the log entry is an error.
    async fn deliver<F, Fut>(
        &self,
        user: &User,
        kind: ReminderKind,
        message: &str,
        now: DateTime<Utc>,
        today: NaiveDate,
        send: F,
    ) -> Result<bool, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), AppError>>,
    {
        if let Err(e) = send().await {
            tracing::warn!(user_id = %user.id, kind = %kind, error = %e, "Delivery failed");
            return Ok(false);
        }

        let event = ReminderEvent::new(&user.id, kind, message, now, today);
        self.store.log_reminder(&event).await?;
        tracing::info!(user_id = %user.id, kind = %kind, "Reminder sent");
        Ok(true)
    }

    // ─── Today's state ───────────────────────────────────────────

    /// Live snapshot (if reachable) merged into the stored row for today.
    pub async fn today_state(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<TodayState, AppError> {
        let date = self.today(now);
        let snapshot = self.fetch_snapshot(user, now).await;

        let activity = match &snapshot {
            Some(s) => Some(
                self.store
                    .upsert_daily_activity(&user.id, date, &ActivityPatch::from(s))
                    .await?,
            ),
            None => self.store.daily_activity(&user.id, date).await?,
        };

        Ok(TodayState {
            date,
            snapshot,
            activity,
        })
    }

    /// Live snapshot, or `None` when not connected or the provider failed.
    pub async fn fetch_snapshot(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Option<ActivitySnapshot> {
        let Some(token) = self.provider.ensure_valid(user).await else {
            tracing::debug!(user_id = %user.id, "No valid WHOOP token");
            return None;
        };

        match self.provider.today_snapshot(&token, now).await {
            Ok(snapshot) => {
                tracing::debug!(
                    user_id = %user.id,
                    has_workout = snapshot.has_workout,
                    "WHOOP snapshot fetched"
                );
                Some(snapshot)
            }
            Err(e) if e.is_whoop_token_error() => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %e,
                    "WHOOP rejected the token, reconnect needed"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %e,
                    "WHOOP fetch failed, using stored activity"
                );
                None
            }
        }
    }

    /// Fetch today's snapshot now and store it.
    ///
    /// Unlike a sweep, a provider failure here is returned to the caller.
    pub async fn sync_user(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<(ActivitySnapshot, DailyActivity), AppError> {
        let token = self
            .provider
            .ensure_valid(user)
            .await
            .ok_or(AppError::Unauthorized)?;
        let snapshot = self.provider.today_snapshot(&token, now).await?;
        let row = self
            .store
            .upsert_daily_activity(&user.id, self.today(now), &ActivityPatch::from(&snapshot))
            .await?;
        Ok((snapshot, row))
    }

    // ─── Evening shame pass ──────────────────────────────────────

    pub async fn run_shame_pass(&self) -> Result<SweepSummary, AppError> {
        self.run_shame_pass_at(Utc::now()).await
    }

    pub async fn run_shame_pass_at(&self, now: DateTime<Utc>) -> Result<SweepSummary, AppError> {
        let users = self.store.list_users().await?;
        let mut summary = SweepSummary {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            match self.shame_user(user, now).await {
                Ok(true) => summary.sent += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(user_id = %user.id, error = %e, "Shame pass failed for user");
                }
            }
        }

        tracing::info!(
            users = summary.users,
            failed = summary.failed,
            sent = summary.sent,
            "Shame pass complete"
        );
        Ok(summary)
    }

    async fn shame_user(&self, user: &User, now: DateTime<Utc>) -> Result<bool, AppError> {
        let today = self.today(now);
        let local_hour = now.with_timezone(&self.tz).hour();
        let settings = self.store.reminder_settings(&user.id).await?;
        let activity = self.store.daily_activity(&user.id, today).await?;

        if !escalation::shame_due(&settings, activity.as_ref(), local_hour) {
            if settings.enabled && settings.in_window(local_hour) {
                tracing::debug!(user_id = %user.id, local_hour, "Window still open, no shame");
            }
            return Ok(false);
        }

        // A restarted scheduler may fire twice in one evening, and a success
        // logged after the activity read still counts.
        let events = self.store.reminders_for_day(&user.id, today).await?;
        if let Some(event) = events
            .iter()
            .find(|e| matches!(e.kind.tier, Tier::Shame | Tier::Success))
        {
            tracing::debug!(user_id = %user.id, kind = %event.kind, "Day already settled");
            return Ok(false);
        }

        let message = notify::shame_email(user.display_name());
        if !self
            .deliver(user, ReminderKind::SHAME, &message.subject, now, today, || {
                self.notifiers.send_email(&user.email, &message)
            })
            .await?
        {
            return Ok(false);
        }

        streak::apply(self.store.as_ref(), &user.id, false).await?;
        Ok(true)
    }

    // ─── Weekly report ───────────────────────────────────────────

    pub async fn run_weekly_report(&self) -> Result<SweepSummary, AppError> {
        self.run_weekly_report_at(Utc::now()).await
    }

    pub async fn run_weekly_report_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary, AppError> {
        let users = self.store.list_users().await?;
        let mut summary = SweepSummary {
            users: users.len(),
            ..Default::default()
        };
        let today = self.today(now);

        for user in &users {
            let result = self.report_user(user, today).await;
            match result {
                Ok(true) => {
                    summary.sent += 1;
                    tracing::info!(user_id = %user.id, "Weekly report sent");
                }
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(user_id = %user.id, error = %e, "Weekly report failed");
                }
            }
        }

        Ok(summary)
    }

    async fn report_user(&self, user: &User, today: NaiveDate) -> Result<bool, AppError> {
        let settings = self.store.reminder_settings(&user.id).await?;
        if !settings.enabled {
            return Ok(false);
        }
        let report = self.weekly_report(&user.id, today).await?;
        let message = notify::weekly_report_email(&report);
        self.notifiers.send_email(&user.email, &message).await?;
        Ok(true)
    }

    /// Figures for the seven days ending on `today`.
    pub async fn weekly_report(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<WeeklyReport, AppError> {
        let week_start = today - Duration::days(6);
        let activity = self.store.activity_history(user_id, week_start).await?;
        let workouts_done = activity
            .iter()
            .filter(|a| a.workout_done && a.date <= today)
            .count() as u32;

        let stats = self.store.stats(user_id).await?.unwrap_or_default();

        let weights = self
            .store
            .weight_history(user_id, today - Duration::days(90))
            .await?;
        let current_weight = weights.last().map(|w| w.weight_kg);
        let week_first = weights
            .iter()
            .find(|w| w.logged_on >= week_start);
        let weight_change = match (week_first, weights.last()) {
            (Some(first), Some(last)) if first.logged_on < last.logged_on => {
                Some(((last.weight_kg - first.weight_kg) * 10.0).round() / 10.0)
            }
            _ => None,
        };

        Ok(WeeklyReport {
            workouts_done,
            current_streak: stats.current_streak,
            current_weight,
            weight_change,
            goal_kg: self.goal_kg,
        })
    }
}
