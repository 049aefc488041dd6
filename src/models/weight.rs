//! Body weight log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One weigh-in per user per day.
///
/// Stored at: `weight_logs/{user_id}_{logged_on}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLog {
    pub user_id: String,
    pub weight_kg: f64,
    pub logged_on: NaiveDate,
}
