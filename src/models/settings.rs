// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user reminder settings.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Reminder settings for one user.
///
/// Stored at: `reminder_settings/{user_id}`. When no document exists the
/// store hands out [`ReminderSettings::default()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct ReminderSettings {
    pub enabled: bool,
    /// First hour (local time) at which nagging may fire
    #[validate(range(min = 0, max = 23))]
    pub start_hour: u32,
    /// Last hour (inclusive) at which nagging may fire
    #[validate(range(min = 0, max = 23))]
    pub end_hour: u32,
    #[validate(range(exclusive_min = 0.0, max = 24.0))]
    pub email_interval_hours: f64,
    #[validate(range(exclusive_min = 0.0, max = 24.0))]
    pub sms_interval_hours: f64,
    /// Hours after `start_hour` from which tiers escalate to aggressive
    #[validate(range(min = 0.0, max = 24.0))]
    pub aggressive_after_hours: f64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 9,
            end_hour: 21,
            email_interval_hours: 3.0,
            sms_interval_hours: 4.0,
            aggressive_after_hours: 6.0,
        }
    }
}

impl ReminderSettings {
    /// Whether `hour` falls inside the inclusive reminder window.
    pub fn in_window(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }
}

fn validate_window(settings: &ReminderSettings) -> Result<(), ValidationError> {
    if settings.start_hour > settings.end_hour {
        return Err(ValidationError::new("start_hour_after_end_hour"));
    }
    Ok(())
}
