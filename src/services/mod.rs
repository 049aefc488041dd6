// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod escalation;
pub mod nagger;
pub mod notify;
pub mod scheduler;
pub mod streak;
pub mod whoop;

pub use nagger::{NagService, SweepSummary, TodayState};
pub use notify::{EmailSender, Notifiers, TextSender};
pub use whoop::{ActivityProvider, WhoopClient, WhoopService};
