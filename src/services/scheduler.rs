// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wall-clock scheduler for the nag sweep, shame pass and weekly report.
//!
//! One tokio task per job. Each task computes the next cron occurrence in the
//! configured timezone, sleeps until then and runs the job. A failed run is
//! logged and the job waits for its next occurrence.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::services::nagger::NagService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    NagSweep,
    ShamePass,
    WeeklyReport,
}

impl JobKind {
    fn name(self) -> &'static str {
        match self {
            JobKind::NagSweep => "nag_sweep",
            JobKind::ShamePass => "shame_pass",
            JobKind::WeeklyReport => "weekly_report",
        }
    }
}

/// A parsed cron job.
pub struct Job {
    pub kind: JobKind,
    pub expr: String,
    cron: Cron,
}

impl Job {
    pub fn parse(kind: JobKind, expr: &str) -> anyhow::Result<Self> {
        let cron = Cron::new(expr)
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse cron '{}': {}", expr, e))?;
        Ok(Self {
            kind,
            expr: expr.to_string(),
            cron,
        })
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Tz>) -> anyhow::Result<DateTime<Tz>> {
        self.cron
            .find_next_occurrence(after, false)
            .map_err(|e| anyhow::anyhow!("No next occurrence for '{}': {}", self.expr, e))
    }
}

/// Parse the three configured schedules.
pub fn jobs_from_config(config: &Config) -> anyhow::Result<Vec<Job>> {
    Ok(vec![
        Job::parse(JobKind::NagSweep, &config.nag_schedule)?,
        Job::parse(JobKind::ShamePass, &config.shame_schedule)?,
        Job::parse(JobKind::WeeklyReport, &config.weekly_report_schedule)?,
    ])
}

async fn run_job(nagger: &NagService, kind: JobKind) {
    let result = match kind {
        JobKind::NagSweep => nagger.run_sweep().await,
        JobKind::ShamePass => nagger.run_shame_pass().await,
        JobKind::WeeklyReport => nagger.run_weekly_report().await,
    };

    if let Err(e) = result {
        tracing::error!(job = kind.name(), error = %e, "Scheduled job failed");
    }
}

/// Spawn one task per job plus an immediate nag sweep.
pub fn spawn(nagger: NagService, jobs: Vec<Job>) -> Vec<JoinHandle<()>> {
    let tz = nagger.timezone();
    let mut handles = Vec::with_capacity(jobs.len() + 1);

    let initial = nagger.clone();
    handles.push(tokio::spawn(async move {
        tracing::info!("Running initial nag sweep");
        run_job(&initial, JobKind::NagSweep).await;
    }));

    for job in jobs {
        let nagger = nagger.clone();
        tracing::info!(job = job.kind.name(), schedule = %job.expr, timezone = %tz, "Job scheduled");

        handles.push(tokio::spawn(async move {
            loop {
                let now = Utc::now().with_timezone(&tz);
                let next = match job.next_after(&now) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::error!(job = job.kind.name(), error = %e, "Job stopped");
                        return;
                    }
                };

                let wait = (next.with_timezone(&Utc) - Utc::now())
                    .to_std()
                    .unwrap_or_default();
                tracing::debug!(job = job.kind.name(), next = %next, "Sleeping until next run");
                tokio::time::sleep(wait).await;

                run_job(&nagger, job.kind).await;
            }
        }));
    }

    handles
}
