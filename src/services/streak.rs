// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Streak tracker: applies one day's outcome to the stored stats.

use crate::db::NagStore;
use crate::error::AppError;
use crate::models::Stats;

/// Record today's outcome for `user_id`.
///
/// Returns the updated stats, or `None` when the user has no stats row
/// (nothing is created here).
pub async fn apply(
    store: &dyn NagStore,
    user_id: &str,
    workout_done: bool,
) -> Result<Option<Stats>, AppError> {
    let Some(stats) = store.record_day(user_id, workout_done).await? else {
        tracing::debug!(user_id, "No stats row, streak not updated");
        return Ok(None);
    };

    tracing::info!(
        user_id,
        workout_done,
        current_streak = stats.current_streak,
        longest_streak = stats.longest_streak,
        "Streak updated"
    );
    Ok(Some(stats))
}
