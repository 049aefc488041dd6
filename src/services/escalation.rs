// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Escalation engine: decides which reminder (if any) to send next.
//!
//! Pure decision logic with no I/O. Given the current instant, the user's
//! settings, today's reminder log and whether a workout was recorded, it
//! returns a [`Decision`]. The caller performs the sends and logs one
//! [`ReminderEvent`] per successful send.

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;

use crate::models::{Channel, DailyActivity, ReminderEvent, ReminderKind, ReminderSettings, Tier};
use crate::time_utils::{day_at_hour, hours_between};

/// Everything the engine looks at for one user at one instant.
#[derive(Debug, Clone, Copy)]
pub struct EscalationInput<'a> {
    /// Current wall-clock time in the configured timezone
    pub now: DateTime<Tz>,
    pub settings: &'a ReminderSettings,
    /// All events logged for this user today, in any order
    pub today_events: &'a [ReminderEvent],
    /// Live snapshot or persisted activity says a workout happened
    pub workout_done: bool,
    /// User has a phone number and a text channel is configured
    pub has_phone: bool,
}

/// Outcome of one engine evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing to evaluate right now.
    Skip(SkipReason),
    /// Workout confirmed and not yet celebrated today: send the success
    /// notification, log it and extend the streak.
    Congratulate,
    /// Workout confirmed and already celebrated today.
    AlreadyCongratulated,
    /// No workout yet: send whatever the plan contains.
    Nag(NagPlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    OutsideWindow,
}

/// Tiers to send this invocation; `None` means the channel stays quiet.
#[derive(Debug, Clone, PartialEq)]
pub struct NagPlan {
    pub email: Option<Tier>,
    pub sms: Option<Tier>,
    pub hours_since_start: f64,
    pub emails_sent: usize,
    pub sms_sent: usize,
}

impl NagPlan {
    /// The plan as reminder kinds, email first.
    pub fn kinds(&self) -> impl Iterator<Item = ReminderKind> {
        self.email
            .map(ReminderKind::email)
            .into_iter()
            .chain(self.sms.map(ReminderKind::sms))
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.sms.is_none()
    }
}

/// Today's nagging history on one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelHistory {
    sent: usize,
    /// `f64::INFINITY` when nothing was sent today
    hours_since_last: f64,
}

impl ChannelHistory {
    fn from_events(events: &[ReminderEvent], channel: Channel, now: &DateTime<Tz>) -> Self {
        let mut sent = 0;
        let mut last = None;
        for event in events.iter().filter(|e| e.kind.is_nag_on(channel)) {
            sent += 1;
            last = last.max(Some(event.sent_at));
        }

        Self {
            sent,
            hours_since_last: last
                .map(|l| hours_between(&l, now))
                .unwrap_or(f64::INFINITY),
        }
    }
}

/// First send of the day is gentle, then reminder until the aggressive
/// threshold is crossed, then aggressive.
fn pick_tier(already_sent: usize, aggressive: bool) -> Tier {
    if already_sent == 0 {
        Tier::Gentle
    } else if aggressive {
        Tier::Aggressive
    } else {
        Tier::Reminder
    }
}

/// Eligibility gate, evaluated before anything else.
pub fn gate(settings: &ReminderSettings, now: &DateTime<Tz>) -> Option<SkipReason> {
    if !settings.enabled {
        Some(SkipReason::Disabled)
    } else if !settings.in_window(now.hour()) {
        Some(SkipReason::OutsideWindow)
    } else {
        None
    }
}

/// Decide what to do for one user right now.
pub fn decide(input: &EscalationInput<'_>) -> Decision {
    let settings = input.settings;

    if let Some(reason) = gate(settings, &input.now) {
        return Decision::Skip(reason);
    }

    if input.workout_done {
        let congratulated = input
            .today_events
            .iter()
            .any(|e| e.kind.tier == Tier::Success);
        return if congratulated {
            Decision::AlreadyCongratulated
        } else {
            Decision::Congratulate
        };
    }

    let day_start = day_at_hour(&input.now, settings.start_hour);
    let hours_since_start = hours_between(&day_start, &input.now);
    let aggressive = hours_since_start >= settings.aggressive_after_hours;

    // Both channels are judged on the history as it was on entry.
    let email = ChannelHistory::from_events(input.today_events, Channel::Email, &input.now);
    let sms = ChannelHistory::from_events(input.today_events, Channel::Sms, &input.now);

    let email_tier = (email.hours_since_last >= settings.email_interval_hours)
        .then(|| pick_tier(email.sent, aggressive));

    let sms_tier = (email.sent > 0
        && input.has_phone
        && sms.hours_since_last >= settings.sms_interval_hours)
        .then(|| pick_tier(sms.sent, aggressive));

    Decision::Nag(NagPlan {
        email: email_tier,
        sms: sms_tier,
        hours_since_start,
        emails_sent: email.sent,
        sms_sent: sms.sent,
    })
}

/// Whether the evening shame pass should reprimand this user.
///
/// Never while the user's window is still open at `local_hour`: the nag
/// sweep may still see a workout for today.
pub fn shame_due(
    settings: &ReminderSettings,
    today: Option<&DailyActivity>,
    local_hour: u32,
) -> bool {
    settings.enabled
        && !settings.in_window(local_hour)
        && !today.is_some_and(|a| a.workout_done)
}
