// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nag service tests over the in-memory store.
//!
//! These tests verify that:
//! 1. Reminders escalate over the day and are logged once per successful send
//! 2. A recorded workout is celebrated exactly once and extends the streak
//! 3. The evening shame pass resets the streak and never fires twice
//! 4. One failing user or channel does not block the others

use chrono_tz::Europe::Rome;
use std::sync::Arc;
use workout_nagger::db::{FirestoreDb, MemoryStore, NagStore};
use workout_nagger::error::AppError;
use workout_nagger::models::{
    ActivityPatch, ActivitySnapshot, RecoverySummary, ReminderEvent, ReminderKind,
    ReminderSettings, Stats, WeightLog, WorkoutSummary,
};
use workout_nagger::services::{EmailSender, NagService, Notifiers, TextSender};

mod common;
use common::{at, date, user, FakeProvider, FlakyStore, Harness, RecordingEmail, RecordingText};

fn cycling() -> ActivitySnapshot {
    ActivitySnapshot {
        has_workout: true,
        workout: Some(WorkoutSummary {
            sport: Some("Cycling".to_string()),
            strain: Some(9.1),
            calories: Some(400),
            duration_minutes: Some(45),
        }),
        recovery: Some(RecoverySummary {
            score: Some(67.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ESCALATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_first_check_sends_gentle_email_only() {
    let h = Harness::new();
    h.add_user(&user("alice", Some("+39 333 1234567"), false))
        .await;

    let sent = h
        .nagger
        .check_user(&user("alice", Some("+39 333 1234567"), false), at(2, 9, 0))
        .await
        .unwrap();

    assert_eq!(sent, 1);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["email_gentle"]);
    assert_eq!(h.text.count(), 0, "SMS waits for a first email");

    let sent_to = h.email.sent.lock().unwrap()[0].0.clone();
    assert_eq!(sent_to, "alice@example.com");
}

#[tokio::test]
async fn test_escalation_over_the_day() {
    let h = Harness::new();
    let alice = user("alice", Some("+39 333 1234567"), false);
    h.add_user(&alice).await;

    for (hour, minute) in [(9, 0), (9, 30), (12, 0), (15, 0), (16, 0), (16, 30)] {
        h.nagger
            .check_user(&alice, at(2, hour, minute))
            .await
            .unwrap();
    }

    assert_eq!(
        h.kinds("alice", date(2)).await,
        vec![
            "email_gentle",
            "sms_gentle",
            "email_reminder",
            "email_aggressive",
            "sms_aggressive",
        ]
    );
    assert_eq!(h.text.count(), 2);
    assert_eq!(h.email.subjects().len(), 3);
    assert!(h.email.subjects()[2].contains("ALICE"));
}

#[tokio::test]
async fn test_user_without_phone_gets_email_only() {
    let h = Harness::new();
    let bob = user("bob", None, false);
    h.add_user(&bob).await;

    for hour in [9, 12, 15, 18, 21] {
        h.nagger.check_user(&bob, at(2, hour, 0)).await.unwrap();
    }

    let kinds = h.kinds("bob", date(2)).await;
    assert_eq!(kinds.len(), 5);
    assert!(kinds.iter().all(|k| k.starts_with("email_")));
    assert_eq!(h.text.count(), 0);
}

#[tokio::test]
async fn test_outside_window_and_disabled_send_nothing() {
    let h = Harness::new();
    let alice = user("alice", None, false);
    h.add_user(&alice).await;

    assert_eq!(h.nagger.check_user(&alice, at(2, 8, 59)).await.unwrap(), 0);
    assert_eq!(h.nagger.check_user(&alice, at(2, 22, 0)).await.unwrap(), 0);

    let settings = ReminderSettings {
        enabled: false,
        ..Default::default()
    };
    h.store
        .set_reminder_settings("alice", &settings)
        .await
        .unwrap();
    assert_eq!(h.nagger.check_user(&alice, at(2, 12, 0)).await.unwrap(), 0);

    assert!(h.store.all_reminders().is_empty());
    assert!(h.email.subjects().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// SUCCESS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_workout_is_congratulated_once() {
    let h = Harness::new();
    let alice = user("alice", Some("+39 333 1234567"), true);
    h.add_user(&alice).await;
    h.provider.set_snapshot(cycling());

    assert_eq!(h.nagger.check_user(&alice, at(2, 10, 0)).await.unwrap(), 1);
    assert_eq!(h.nagger.check_user(&alice, at(2, 10, 30)).await.unwrap(), 0);
    assert_eq!(h.nagger.check_user(&alice, at(2, 18, 0)).await.unwrap(), 0);

    assert_eq!(h.kinds("alice", date(2)).await, vec!["success"]);
    let stats = h.store.stats("alice").await.unwrap().unwrap();
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.total_workouts, 1);

    let (_, message) = h.email.sent.lock().unwrap()[0].clone();
    assert!(message.html.contains("Cycling"));
    assert!(message.html.contains("400 kcal"));
}

#[tokio::test]
async fn test_snapshot_is_merged_into_daily_activity() {
    let h = Harness::new();
    let alice = user("alice", None, true);
    h.add_user(&alice).await;
    h.provider.set_snapshot(cycling());

    h.nagger.check_user(&alice, at(2, 11, 0)).await.unwrap();

    let row = h
        .store
        .daily_activity("alice", date(2))
        .await
        .unwrap()
        .expect("row written by the check");
    assert!(row.workout_done);
    assert_eq!(row.workout_calories, Some(400));
    assert_eq!(row.workout_type.as_deref(), Some("Cycling"));
    assert_eq!(row.recovery_score, Some(67.0));
}

#[tokio::test]
async fn test_manual_workout_without_detail_sends_nothing() {
    let h = Harness::new();
    let alice = user("alice", None, true);
    h.add_user(&alice).await;
    h.store
        .upsert_daily_activity(
            "alice",
            date(2),
            &ActivityPatch {
                workout_done: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Live data says nothing happened; the manual entry still wins.
    h.provider.set_snapshot(ActivitySnapshot::default());
    assert_eq!(h.nagger.check_user(&alice, at(2, 12, 0)).await.unwrap(), 0);

    let row = h.store.daily_activity("alice", date(2)).await.unwrap();
    assert!(row.unwrap().workout_done);
    assert!(h.store.all_reminders().is_empty());
    assert_eq!(h.store.stats("alice").await.unwrap(), Some(Stats::default()));
}

#[tokio::test]
async fn test_provider_failure_falls_back_to_stored_row() {
    let h = Harness::new();
    let alice = user("alice", None, true);
    h.add_user(&alice).await;
    h.provider.set_failing(true);

    // Nothing stored: treated as no workout.
    assert_eq!(h.nagger.check_user(&alice, at(2, 9, 0)).await.unwrap(), 1);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["email_gentle"]);

    h.store
        .upsert_daily_activity(
            "alice",
            date(2),
            &ActivityPatch {
                workout_done: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(h.nagger.check_user(&alice, at(2, 12, 0)).await.unwrap(), 0);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["email_gentle"]);
}

#[tokio::test]
async fn test_streak_over_several_days() {
    let h = Harness::new();
    let alice = user("alice", None, true);
    h.add_user(&alice).await;

    h.provider.set_snapshot(cycling());
    for day in 2..=4 {
        h.nagger.check_user(&alice, at(day, 18, 0)).await.unwrap();
        // The evening pass leaves a day with a workout alone.
        h.nagger.run_shame_pass_at(at(day, 22, 0)).await.unwrap();
    }

    let stats = h.store.stats("alice").await.unwrap().unwrap();
    assert_eq!(
        stats,
        Stats {
            current_streak: 3,
            longest_streak: 3,
            total_workouts: 3,
        }
    );

    h.provider.set_snapshot(ActivitySnapshot::default());
    h.nagger.check_user(&alice, at(5, 18, 0)).await.unwrap();
    h.nagger.run_shame_pass_at(at(5, 22, 0)).await.unwrap();

    let stats = h.store.stats("alice").await.unwrap().unwrap();
    assert_eq!(stats.current_streak, 0);
    assert_eq!(stats.longest_streak, 3);
    assert_eq!(stats.total_workouts, 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// SHAME PASS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_shame_without_activity_row_resets_streak() {
    let h = Harness::new();
    let alice = user("alice", None, false);
    h.store.upsert_user(&alice).await.unwrap();
    h.store
        .set_stats(
            "alice",
            &Stats {
                current_streak: 3,
                longest_streak: 5,
                total_workouts: 10,
            },
        )
        .await
        .unwrap();

    let summary = h.nagger.run_shame_pass_at(at(2, 22, 0)).await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["shame"]);

    let stats = h.store.stats("alice").await.unwrap().unwrap();
    assert_eq!(stats.current_streak, 0);
    assert_eq!(stats.longest_streak, 5);
}

#[tokio::test]
async fn test_shame_pass_runs_once_per_day() {
    let h = Harness::new();
    h.add_user(&user("alice", None, false)).await;

    h.nagger.run_shame_pass_at(at(2, 22, 0)).await.unwrap();
    let again = h.nagger.run_shame_pass_at(at(2, 22, 15)).await.unwrap();

    assert_eq!(again.sent, 0);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["shame"]);
    assert_eq!(h.email.subjects().len(), 1);
}

#[tokio::test]
async fn test_no_shame_for_workout_or_disabled() {
    let h = Harness::new();
    h.add_user(&user("alice", None, false)).await;
    h.add_user(&user("bob", None, false)).await;

    h.store
        .upsert_daily_activity(
            "alice",
            date(2),
            &ActivityPatch {
                workout_done: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.store
        .set_reminder_settings(
            "bob",
            &ReminderSettings {
                enabled: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let summary = h.nagger.run_shame_pass_at(at(2, 22, 0)).await.unwrap();
    assert_eq!(summary.users, 2);
    assert_eq!(summary.sent, 0);
    assert!(h.store.all_reminders().is_empty());
}

#[tokio::test]
async fn test_no_shame_while_window_is_open() {
    let h = Harness::new();
    h.add_user(&user("alice", None, false)).await;

    let summary = h.nagger.run_shame_pass_at(at(2, 21, 30)).await.unwrap();

    assert_eq!(summary.sent, 0);
    assert!(h.store.all_reminders().is_empty());
    assert_eq!(h.store.stats("alice").await.unwrap(), Some(Stats::default()));
}

#[tokio::test]
async fn test_no_shame_after_success_email() {
    let h = Harness::new();
    h.add_user(&user("alice", None, false)).await;
    // Congratulated, but the activity row never got the workout.
    h.store
        .log_reminder(&ReminderEvent::new(
            "alice",
            ReminderKind::SUCCESS,
            "Nice work",
            at(2, 18, 0),
            date(2),
        ))
        .await
        .unwrap();

    let summary = h.nagger.run_shame_pass_at(at(2, 22, 0)).await.unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["success"]);
    assert!(h.email.subjects().is_empty());
}

#[tokio::test]
async fn test_late_sweep_and_shame_pass_together() {
    let h = Harness::new();
    let alice = user("alice", None, true);
    h.add_user(&alice).await;
    h.store
        .set_stats(
            "alice",
            &Stats {
                current_streak: 3,
                longest_streak: 3,
                total_workouts: 3,
            },
        )
        .await
        .unwrap();
    h.provider.set_snapshot(cycling());
    h.provider.set_delay_ms(100);

    let (sweep, shame) = tokio::join!(
        h.nagger.run_sweep_at(at(2, 21, 30)),
        h.nagger.run_shame_pass_at(at(2, 21, 30)),
    );
    sweep.unwrap();
    shame.unwrap();

    assert_eq!(h.kinds("alice", date(2)).await, vec!["success"]);
    assert_eq!(
        h.store.stats("alice").await.unwrap(),
        Some(Stats {
            current_streak: 4,
            longest_streak: 4,
            total_workouts: 4,
        })
    );

    // The scheduled pass after the window closes leaves the day alone.
    h.provider.set_delay_ms(0);
    let later = h.nagger.run_shame_pass_at(at(2, 22, 0)).await.unwrap();
    assert_eq!(later.sent, 0);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["success"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_failed_text_does_not_block_email() {
    let h = Harness::new();
    let alice = user("alice", Some("+39 333 1234567"), false);
    h.add_user(&alice).await;

    h.nagger.check_user(&alice, at(2, 9, 0)).await.unwrap();

    h.text.set_failing(true);
    assert_eq!(h.nagger.check_user(&alice, at(2, 12, 0)).await.unwrap(), 1);
    assert_eq!(
        h.kinds("alice", date(2)).await,
        vec!["email_gentle", "email_reminder"]
    );

    // Nothing was logged for the text, so the next check retries it.
    h.text.set_failing(false);
    assert_eq!(h.nagger.check_user(&alice, at(2, 12, 30)).await.unwrap(), 1);
    assert_eq!(
        h.kinds("alice", date(2)).await,
        vec!["email_gentle", "email_reminder", "sms_gentle"]
    );
}

#[tokio::test]
async fn test_failed_email_is_not_logged() {
    let h = Harness::new();
    let alice = user("alice", Some("+39 333 1234567"), false);
    h.add_user(&alice).await;

    h.email.set_failing(true);
    assert_eq!(h.nagger.check_user(&alice, at(2, 9, 0)).await.unwrap(), 0);
    assert!(h.store.all_reminders().is_empty());
    assert_eq!(h.text.count(), 0);

    h.email.set_failing(false);
    assert_eq!(h.nagger.check_user(&alice, at(2, 9, 30)).await.unwrap(), 1);
    assert_eq!(h.kinds("alice", date(2)).await, vec!["email_gentle"]);
}

#[tokio::test]
async fn test_unconfigured_text_channel_skips_sms() {
    let store = Arc::new(MemoryStore::new());
    let email = Arc::new(RecordingEmail::default());
    let nagger = NagService::new(
        store.clone(),
        Arc::new(FakeProvider::default()),
        Notifiers {
            email: Some(email.clone() as Arc<dyn EmailSender>),
            text: None,
        },
        Rome,
        85.0,
    );
    let alice = user("alice", Some("+39 333 1234567"), false);
    store.upsert_user(&alice).await.unwrap();

    for hour in [9, 12, 16] {
        nagger.check_user(&alice, at(2, hour, 0)).await.unwrap();
    }

    let events = store.reminders_for_day("alice", date(2)).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.kind.to_string().starts_with("email_")));
}

#[tokio::test]
async fn test_one_failing_user_does_not_stop_sweep() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        broken_user: "bob".to_string(),
    });
    store
        .upsert_user(&user("alice", None, false))
        .await
        .unwrap();
    store.upsert_user(&user("bob", None, false)).await.unwrap();
    store
        .upsert_user(&user("carol", None, false))
        .await
        .unwrap();

    let nagger = NagService::new(
        store.clone(),
        Arc::new(FakeProvider::default()),
        Notifiers {
            email: Some(Arc::new(RecordingEmail::default()) as Arc<dyn EmailSender>),
            text: Some(Arc::new(RecordingText::default()) as Arc<dyn TextSender>),
        },
        Rome,
        85.0,
    );

    let summary = nagger.run_sweep_at(at(2, 9, 0)).await.unwrap();
    assert_eq!(summary.users, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sent, 2);
    assert!(store.inner.all_reminders().iter().all(|e| e.user_id != "bob"));
}

#[tokio::test]
async fn test_store_failure_fails_sweep() {
    let nagger = NagService::new(
        Arc::new(FirestoreDb::new_mock()),
        Arc::new(FakeProvider::default()),
        Notifiers::default(),
        Rome,
        85.0,
    );

    let result = nagger.run_sweep_at(at(2, 9, 0)).await;
    assert!(matches!(result, Err(AppError::Database(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// WEEKLY REPORT
// ═══════════════════════════════════════════════════════════════════════════

async fn seed_week(store: &MemoryStore) {
    // 2026-03-08 is a Sunday; the report covers 03-02..=03-08.
    for (day, done) in [(1, true), (2, true), (3, false), (4, true), (6, true), (8, true)] {
        store
            .upsert_daily_activity(
                "alice",
                date(day),
                &ActivityPatch {
                    workout_done: Some(done),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    for (day, kg) in [(1, 92.0), (4, 91.6), (7, 91.2)] {
        store
            .log_weight(&WeightLog {
                user_id: "alice".to_string(),
                weight_kg: kg,
                logged_on: date(day),
            })
            .await
            .unwrap();
    }

    store
        .set_stats(
            "alice",
            &Stats {
                current_streak: 1,
                longest_streak: 4,
                total_workouts: 20,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_weekly_report_figures() {
    let h = Harness::new();
    h.store
        .upsert_user(&user("alice", None, false))
        .await
        .unwrap();
    seed_week(&h.store).await;

    let report = h.nagger.weekly_report("alice", date(8)).await.unwrap();
    assert_eq!(report.workouts_done, 4);
    assert_eq!(report.current_streak, 1);
    assert_eq!(report.current_weight, Some(91.2));
    // The 03-01 weigh-in is before the week, so the baseline is 03-04.
    assert_eq!(report.weight_change, Some(-0.4));
    assert_eq!(report.goal_kg, 85.0);
}

#[tokio::test]
async fn test_weekly_report_is_emailed() {
    let h = Harness::new();
    h.store
        .upsert_user(&user("alice", None, false))
        .await
        .unwrap();
    seed_week(&h.store).await;

    let summary = h.nagger.run_weekly_report_at(at(8, 20, 0)).await.unwrap();
    assert_eq!(summary.sent, 1);

    let subjects = h.email.subjects();
    assert_eq!(subjects, vec!["📊 Weekly report - 4/7 days"]);
    // Reports are not part of the reminder log.
    assert!(h.store.all_reminders().is_empty());
}
