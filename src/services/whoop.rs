// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP API client and token lifecycle.
//!
//! Handles:
//! - OAuth code exchange and token refresh
//! - Today's workout/recovery/sleep/cycle snapshot
//! - Refresh of credentials that are about to expire, one refresh per user at a time

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::db::NagStore;
use crate::error::AppError;
use crate::models::{
    ActivitySnapshot, ProviderCredential, RecoverySummary, SleepSummary, Stats, User,
    WorkoutSummary,
};
use crate::time_utils::local_date;

const WHOOP_AUTH_BASE: &str = "https://api.prod.whoop.com/oauth/oauth2";
const WHOOP_API_BASE: &str = "https://api.prod.whoop.com/developer";

const SCOPES: &str =
    "offline read:recovery read:cycles read:workout read:sleep read:profile read:body_measurement";

/// Records are fetched from this far back so a workout that started
/// yesterday in UTC but today locally is still seen.
const LOOKBACK_HOURS: i64 = 48;

/// WHOOP API client.
#[derive(Clone)]
pub struct WhoopClient {
    http: reqwest::Client,
    auth_base: String,
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl WhoopClient {
    /// Create a new WHOOP client with OAuth credentials.
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        timeout: StdDuration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            auth_base: WHOOP_AUTH_BASE.to_string(),
            api_base: WHOOP_API_BASE.to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Point the client at a different host (local stub server in tests).
    pub fn with_base_urls(mut self, auth_base: &str, api_base: &str) -> Self {
        self.auth_base = auth_base.trim_end_matches('/').to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// URL the user is redirected to for consent.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_base))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::WhoopApi(format!("Token exchange request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expiring access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_base))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("scope", "offline"),
            ])
            .send()
            .await
            .map_err(|e| AppError::WhoopApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Get the authenticated user's basic profile.
    pub async fn profile(&self, access_token: &str) -> Result<WhoopProfile, AppError> {
        self.get_json("/v2/user/profile/basic", access_token, &[])
            .await
    }

    pub async fn workouts(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<WhoopWorkout>, AppError> {
        let page: Page<WhoopWorkout> = self
            .get_json(
                "/v2/activity/workout",
                access_token,
                &[("start", start.to_rfc3339()), ("limit", "25".to_string())],
            )
            .await?;
        Ok(page.records)
    }

    /// Most recent recovery since `start`.
    pub async fn latest_recovery(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
    ) -> Result<Option<WhoopRecovery>, AppError> {
        self.latest("/v2/recovery", access_token, start).await
    }

    /// Most recent sleep since `start`.
    pub async fn latest_sleep(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
    ) -> Result<Option<WhoopSleep>, AppError> {
        self.latest("/v2/activity/sleep", access_token, start).await
    }

    /// Most recent physiological cycle (day strain) since `start`.
    pub async fn latest_cycle(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
    ) -> Result<Option<WhoopCycle>, AppError> {
        self.latest("/v2/cycle", access_token, start).await
    }

    /// Today's facts, with the four collections fetched concurrently.
    pub async fn today_snapshot(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<ActivitySnapshot, AppError> {
        let start = now - Duration::hours(LOOKBACK_HOURS);
        let (workouts, recovery, sleep, cycle) = tokio::try_join!(
            self.workouts(access_token, start),
            self.latest_recovery(access_token, start),
            self.latest_sleep(access_token, start),
            self.latest_cycle(access_token, start),
        )?;

        Ok(build_snapshot(
            &workouts,
            recovery.as_ref(),
            sleep.as_ref(),
            cycle.as_ref(),
            local_date(now, tz),
            tz,
        ))
    }

    async fn latest<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
        start: DateTime<Utc>,
    ) -> Result<Option<T>, AppError> {
        let page: Page<T> = self
            .get_json(
                path,
                access_token,
                &[("start", start.to_rfc3339()), ("limit", "5".to_string())],
            )
            .await?;
        Ok(page.records.into_iter().next())
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::WhoopApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("WHOOP rate limit hit (429)");
                return Err(AppError::WhoopApi(AppError::WHOOP_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::WhoopApi(AppError::WHOOP_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::WhoopApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::WhoopApi(format!("JSON parse error: {}", e)))
    }
}

/// Reduce raw WHOOP records to today's snapshot.
///
/// Only workouts that started on `today` (in `tz`) count; the first one is
/// summarised.
pub fn build_snapshot(
    workouts: &[WhoopWorkout],
    recovery: Option<&WhoopRecovery>,
    sleep: Option<&WhoopSleep>,
    cycle: Option<&WhoopCycle>,
    today: NaiveDate,
    tz: Tz,
) -> ActivitySnapshot {
    let workout = workouts
        .iter()
        .find(|w| local_date(w.start, tz) == today)
        .map(|w| WorkoutSummary {
            sport: w.sport_name.clone(),
            strain: w.score.as_ref().and_then(|s| s.strain),
            calories: w
                .score
                .as_ref()
                .and_then(|s| s.kilojoule)
                .map(|kj| (kj / 4.184).round() as u32),
            duration_minutes: w
                .end
                .map(|end| ((end - w.start).num_seconds() as f64 / 60.0).round() as i64),
        });

    let recovery = recovery
        .and_then(|r| r.score.as_ref())
        .map(|s| RecoverySummary {
            score: s.recovery_score,
            hrv_ms: s.hrv_rmssd_milli,
            resting_hr: s.resting_heart_rate,
        });

    let sleep = sleep.and_then(|s| s.score.as_ref()).map(|s| SleepSummary {
        performance: s.sleep_performance_percentage,
        efficiency: s.sleep_efficiency_percentage,
        duration_hours: s
            .stage_summary
            .as_ref()
            .and_then(|st| st.total_in_bed_time_milli)
            .map(|ms| (ms / 360_000.0).round() / 10.0),
    });

    ActivitySnapshot {
        has_workout: workout.is_some(),
        workout,
        recovery,
        sleep,
        strain: cycle.and_then(|c| c.score.as_ref()).and_then(|s| s.strain),
    }
}

/// Token response from the WHOOP token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the `offline` scope was not granted
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
}

impl TokenResponse {
    /// Convert to a stored credential, keeping `previous_refresh` when no new
    /// refresh token was issued.
    pub fn into_credential(self, now: DateTime<Utc>, previous_refresh: &str) -> ProviderCredential {
        ProviderCredential {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| previous_refresh.to_string()),
            expires_at: now + Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

/// `/v2/user/profile/basic`
#[derive(Debug, Clone, Deserialize)]
pub struct WhoopProfile {
    pub user_id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoopWorkout {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sport_name: Option<String>,
    #[serde(default)]
    pub score: Option<WorkoutScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutScore {
    pub strain: Option<f64>,
    pub kilojoule: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoopRecovery {
    #[serde(default)]
    pub score: Option<RecoveryScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryScore {
    pub recovery_score: Option<f64>,
    pub hrv_rmssd_milli: Option<f64>,
    pub resting_heart_rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoopSleep {
    #[serde(default)]
    pub score: Option<SleepScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepScore {
    pub sleep_performance_percentage: Option<f64>,
    pub sleep_efficiency_percentage: Option<f64>,
    #[serde(default)]
    pub stage_summary: Option<StageSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageSummary {
    pub total_in_bed_time_milli: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoopCycle {
    #[serde(default)]
    pub score: Option<CycleScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleScore {
    pub strain: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// WhoopService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// What the nag service needs from the fitness provider.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    /// A usable access token for `user`, refreshing it first if it is about
    /// to expire. `None` when the user is not connected or the refresh failed.
    async fn ensure_valid(&self, user: &User) -> Option<String>;

    /// Today's activity facts for the owner of `access_token`.
    async fn today_snapshot(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivitySnapshot, AppError>;
}

/// WHOOP client plus credential storage.
#[derive(Clone)]
pub struct WhoopService {
    client: WhoopClient,
    store: Arc<dyn NagStore>,
    tz: Tz,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl WhoopService {
    pub fn new(client: WhoopClient, store: Arc<dyn NagStore>, tz: Tz) -> Self {
        Self {
            client,
            store,
            tz,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &WhoopClient {
        &self.client
    }

    /// Handle OAuth callback: exchange the code, then attach the credential
    /// to the user whose email matches the WHOOP profile, falling back to
    /// `primary_email`. A user is created when neither exists.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        primary_email: &str,
    ) -> Result<User, AppError> {
        let tokens = self.client.exchange_code(code).await?;
        let profile = self.client.profile(&tokens.access_token).await?;
        let credential = tokens.into_credential(Utc::now(), "");

        let existing = match self.store.get_user_by_email(&profile.email).await? {
            Some(user) => Some(user),
            None => self.store.get_user_by_email(primary_email).await?,
        };

        let mut user = existing.unwrap_or_else(|| User {
            id: profile.user_id.to_string(),
            email: profile.email.clone(),
            name: profile.first_name.clone(),
            phone: None,
            whoop_user_id: None,
            credential: None,
        });
        user.whoop_user_id = Some(profile.user_id);
        user.credential = Some(credential);
        self.store.upsert_user(&user).await?;

        if self.store.stats(&user.id).await?.is_none() {
            self.store.set_stats(&user.id, &Stats::default()).await?;
        }

        tracing::info!(
            user_id = %user.id,
            whoop_user_id = profile.user_id,
            "WHOOP account connected"
        );
        Ok(user)
    }

    async fn refresh_locked(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        let Some(credential) = user.credential else {
            return Ok(None);
        };

        let now = Utc::now();
        if !credential.expires_within(now, Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)) {
            return Ok(Some(credential.access_token));
        }

        tracing::info!(user_id, "WHOOP token expiring, refreshing");
        let refreshed = self
            .client
            .refresh_token(&credential.refresh_token)
            .await?
            .into_credential(now, &credential.refresh_token);

        self.store
            .set_credential(user_id, &refreshed, None)
            .await?;

        tracing::info!(user_id, expires_at = %refreshed.expires_at, "WHOOP token refreshed");
        Ok(Some(refreshed.access_token))
    }
}

#[async_trait]
impl ActivityProvider for WhoopService {
    async fn ensure_valid(&self, user: &User) -> Option<String> {
        let credential = user.credential.as_ref()?;

        if !credential.expires_within(Utc::now(), Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)) {
            return Some(credential.access_token.clone());
        }

        match self.refresh_locked(&user.id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "WHOOP token refresh failed");
                None
            }
        }
    }

    async fn today_snapshot(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivitySnapshot, AppError> {
        self.client.today_snapshot(access_token, now, self.tz).await
    }
}
