//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment
//! (Cloud Run secret bindings) or a local `.env` file.

use chrono_tz::Tz;
use std::env;
use std::time::Duration;

/// Default cron schedules (evaluated in `timezone`).
pub const DEFAULT_NAG_SCHEDULE: &str = "0,30 9-21 * * *";
pub const DEFAULT_SHAME_SCHEDULE: &str = "0 22 * * *";
pub const DEFAULT_WEEKLY_REPORT_SCHEDULE: &str = "0 20 * * 0";

/// Which backend persists state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store, state is lost on restart
    Memory,
}

/// Which service delivers the text (non-email) channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChannel {
    Sms,
    WhatsApp,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// WHOOP OAuth client ID (public)
    pub whoop_client_id: String,
    /// Redirect URI registered with WHOOP
    pub whoop_redirect_uri: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    pub store: StoreBackend,
    /// Server port
    pub port: u16,
    /// Email of the user the dashboard API acts for
    pub primary_user_email: String,
    /// Phone for the primary user when it is first created
    pub primary_user_phone: Option<String>,
    /// Sender address for notification emails
    pub email_from: String,
    pub text_channel: TextChannel,
    /// Twilio sending number
    pub twilio_phone_number: Option<String>,
    /// Wall-clock timezone for reminder windows and schedules
    pub timezone: Tz,
    pub nag_schedule: String,
    pub shame_schedule: String,
    pub weekly_report_schedule: String,
    /// Upper bound for every call to an external API
    pub provider_timeout: Duration,
    pub weight_start_kg: f64,
    pub weight_goal_kg: f64,

    // --- Secrets ---
    /// WHOOP OAuth client secret
    pub whoop_client_secret: String,
    /// Key for signing the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Bearer token for `/api/*`; the API is open when unset
    pub api_token: Option<String>,
    pub resend_api_key: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub textmebot_api_key: Option<String>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            whoop_client_id: "test_client_id".to_string(),
            whoop_redirect_uri: "http://localhost:8080/auth/whoop/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            store: StoreBackend::Memory,
            port: 8080,
            primary_user_email: "main@example.com".to_string(),
            primary_user_phone: None,
            email_from: "nagger@example.com".to_string(),
            text_channel: TextChannel::Sms,
            twilio_phone_number: None,
            timezone: chrono_tz::Europe::Rome,
            nag_schedule: DEFAULT_NAG_SCHEDULE.to_string(),
            shame_schedule: DEFAULT_SHAME_SCHEDULE.to_string(),
            weekly_report_schedule: DEFAULT_WEEKLY_REPORT_SCHEDULE.to_string(),
            provider_timeout: Duration::from_secs(15),
            weight_start_kg: 93.0,
            weight_goal_kg: 85.0,
            whoop_client_secret: "test_secret".to_string(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!".to_vec(),
            api_token: Some("test_api_token".to_string()),
            resend_api_key: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            textmebot_api_key: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store = match env::var("STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORE")),
        };

        let text_channel = match env::var("TEXT_CHANNEL").as_deref() {
            Ok("whatsapp") => TextChannel::WhatsApp,
            Ok("sms") | Err(_) => TextChannel::Sms,
            Ok(_) => return Err(ConfigError::Invalid("TEXT_CHANNEL")),
        };

        let timezone = env::var("TIMEZONE")
            .unwrap_or_else(|_| "Europe/Rome".to_string())
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid("TIMEZONE"))?;

        Ok(Self {
            whoop_client_id: env::var("WHOOP_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("WHOOP_CLIENT_ID"))?,
            whoop_redirect_uri: env::var("WHOOP_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("WHOOP_REDIRECT_URI"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            primary_user_email: env::var("PRIMARY_USER_EMAIL")
                .map_err(|_| ConfigError::Missing("PRIMARY_USER_EMAIL"))?,
            primary_user_phone: optional("PRIMARY_USER_PHONE"),
            email_from: env::var("EMAIL_FROM").map_err(|_| ConfigError::Missing("EMAIL_FROM"))?,
            text_channel,
            twilio_phone_number: optional("TWILIO_PHONE_NUMBER"),
            timezone,
            nag_schedule: env::var("NAG_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_NAG_SCHEDULE.to_string()),
            shame_schedule: env::var("SHAME_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_SHAME_SCHEDULE.to_string()),
            weekly_report_schedule: env::var("WEEKLY_REPORT_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_WEEKLY_REPORT_SCHEDULE.to_string()),
            provider_timeout: Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 15)?),
            weight_start_kg: parse_or("WEIGHT_START_KG", 93.0)?,
            weight_goal_kg: parse_or("WEIGHT_GOAL_KG", 85.0)?,

            whoop_client_secret: env::var("WHOOP_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WHOOP_CLIENT_SECRET"))?,
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            api_token: optional("API_TOKEN"),
            resend_api_key: optional("RESEND_API_KEY"),
            twilio_account_sid: optional("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: optional("TWILIO_AUTH_TOKEN"),
            textmebot_api_key: optional("TEXTMEBOT_APIKEY"),
        })
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
