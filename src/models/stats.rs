//! Cumulative workout statistics per user.
//!
//! Updated once per day: either by the success notification (workout
//! confirmed) or by the evening shame pass (day missed).

use serde::{Deserialize, Serialize};

/// Streak statistics for a user.
///
/// Stored at: `stats/{user_id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Consecutive days with a confirmed workout
    #[serde(default)]
    pub current_streak: u32,
    /// Best streak ever reached
    #[serde(default)]
    pub longest_streak: u32,
    /// Total confirmed workouts
    #[serde(default)]
    pub total_workouts: u32,
}

impl Stats {
    /// Apply one day's outcome.
    ///
    /// Not idempotent: callers must apply at most one outcome per user per day.
    pub fn record_day(&mut self, workout_done: bool) {
        if workout_done {
            self.current_streak += 1;
            self.longest_streak = self.longest_streak.max(self.current_streak);
            self.total_workouts += 1;
        } else {
            self.current_streak = 0;
        }
    }
}
