// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily activity record and the provider's live snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per user per local date.
///
/// Stored at: `daily_activity/{user_id}_{date}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub workout_done: bool,
    #[serde(default)]
    pub workout_strain: Option<f64>,
    #[serde(default)]
    pub workout_calories: Option<u32>,
    #[serde(default)]
    pub workout_type: Option<String>,
    #[serde(default)]
    pub recovery_score: Option<f64>,
    #[serde(default)]
    pub sleep_performance: Option<f64>,
    #[serde(default)]
    pub meals_ok: Option<bool>,
    #[serde(default)]
    pub alcohol: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DailyActivity {
    pub fn new(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            workout_done: false,
            workout_strain: None,
            workout_calories: None,
            workout_type: None,
            recovery_score: None,
            sleep_performance: None,
            meals_ok: None,
            alcohol: None,
            notes: None,
        }
    }

    /// Merge a patch: only fields present in the patch overwrite.
    pub fn apply(&mut self, patch: &ActivityPatch) {
        if let Some(v) = patch.workout_done {
            self.workout_done = v;
        }
        if patch.workout_strain.is_some() {
            self.workout_strain = patch.workout_strain;
        }
        if patch.workout_calories.is_some() {
            self.workout_calories = patch.workout_calories;
        }
        if patch.workout_type.is_some() {
            self.workout_type = patch.workout_type.clone();
        }
        if patch.recovery_score.is_some() {
            self.recovery_score = patch.recovery_score;
        }
        if patch.sleep_performance.is_some() {
            self.sleep_performance = patch.sleep_performance;
        }
        if patch.meals_ok.is_some() {
            self.meals_ok = patch.meals_ok;
        }
        if patch.alcohol.is_some() {
            self.alcohol = patch.alcohol;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes.clone();
        }
    }
}

/// Partial update for a [`DailyActivity`] row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub workout_done: Option<bool>,
    pub workout_strain: Option<f64>,
    pub workout_calories: Option<u32>,
    pub workout_type: Option<String>,
    pub recovery_score: Option<f64>,
    pub sleep_performance: Option<f64>,
    pub meals_ok: Option<bool>,
    pub alcohol: Option<bool>,
    pub notes: Option<String>,
}

/// A snapshot can mark the day done but never undo a manual entry.
impl From<&ActivitySnapshot> for ActivityPatch {
    fn from(snapshot: &ActivitySnapshot) -> Self {
        let workout = snapshot.workout.as_ref();
        Self {
            workout_done: snapshot.has_workout.then_some(true),
            workout_strain: workout.and_then(|w| w.strain),
            workout_calories: workout.and_then(|w| w.calories),
            workout_type: workout.and_then(|w| w.sport.clone()),
            recovery_score: snapshot.recovery.as_ref().and_then(|r| r.score),
            sleep_performance: snapshot.sleep.as_ref().and_then(|s| s.performance),
            ..Default::default()
        }
    }
}

/// The provider's live answer for "did this user work out today".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    pub has_workout: bool,
    pub workout: Option<WorkoutSummary>,
    pub recovery: Option<RecoverySummary>,
    pub sleep: Option<SleepSummary>,
    /// Whole-day strain from the current physiological cycle
    pub strain: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub sport: Option<String>,
    pub strain: Option<f64>,
    pub calories: Option<u32>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoverySummary {
    pub score: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub resting_hr: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SleepSummary {
    pub performance: Option<f64>,
    pub efficiency: Option<f64>,
    pub duration_hours: Option<f64>,
}
