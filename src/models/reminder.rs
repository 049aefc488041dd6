// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reminder log model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery medium of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    /// SMS or WhatsApp, depending on deployment
    Sms,
}

/// Intensity of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Gentle,
    Reminder,
    Aggressive,
    Success,
    Shame,
}

impl Tier {
    /// Nagging tiers count towards escalation and interval gating.
    pub fn is_nag(self) -> bool {
        matches!(self, Tier::Gentle | Tier::Reminder | Tier::Aggressive)
    }

    fn as_str(self) -> &'static str {
        match self {
            Tier::Gentle => "gentle",
            Tier::Reminder => "reminder",
            Tier::Aggressive => "aggressive",
            Tier::Success => "success",
            Tier::Shame => "shame",
        }
    }
}

/// What was sent: channel plus tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderKind {
    pub channel: Channel,
    pub tier: Tier,
}

impl ReminderKind {
    pub const SUCCESS: ReminderKind = ReminderKind::email(Tier::Success);
    pub const SHAME: ReminderKind = ReminderKind::email(Tier::Shame);

    pub const fn email(tier: Tier) -> Self {
        Self {
            channel: Channel::Email,
            tier,
        }
    }

    pub const fn sms(tier: Tier) -> Self {
        Self {
            channel: Channel::Sms,
            tier,
        }
    }

    /// Whether this is a nagging send on `channel`.
    pub fn is_nag_on(&self, channel: Channel) -> bool {
        self.channel == channel && self.tier.is_nag()
    }
}

/// Storage/display label: `email_gentle`, `sms_aggressive`, `success`, `shame`.
impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tier.is_nag() {
            return f.write_str(self.tier.as_str());
        }
        let channel = match self.channel {
            Channel::Email => "email",
            Channel::Sms => "sms",
        };
        write!(f, "{}_{}", channel, self.tier.as_str())
    }
}

/// A notification that was sent. Never mutated once written.
///
/// Stored at: `reminder_logs/{user_id}_{kind}_{sent_at_millis}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub user_id: String,
    pub kind: ReminderKind,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    /// Local calendar day the event belongs to
    pub day: NaiveDate,
}

impl ReminderEvent {
    pub fn new(
        user_id: &str,
        kind: ReminderKind,
        message: impl Into<String>,
        sent_at: DateTime<Utc>,
        day: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            message: message.into(),
            sent_at,
            day,
        }
    }

    /// Deterministic document ID, so a retried write overwrites instead of duplicating.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.user_id,
            self.kind,
            self.sent_at.timestamp_millis()
        )
    }
}
