// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification delivery (email and text) and message templates.
//!
//! Email goes through Resend. The text channel is either Twilio SMS or
//! WhatsApp via TextMeBot, chosen at deployment time.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, TextChannel};
use crate::error::AppError;
use crate::models::{Tier, WorkoutSummary};

const RESEND_URL: &str = "https://api.resend.com/emails";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const TEXTMEBOT_URL: &str = "https://api.textmebot.com/send.php";

/// A rendered email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), AppError>;
}

#[async_trait]
pub trait TextSender: Send + Sync {
    /// Short name for logs ("sms", "whatsapp").
    fn name(&self) -> &'static str;

    async fn send_text(&self, to: &str, body: &str) -> Result<(), AppError>;
}

/// The configured senders. A `None` channel is not configured.
#[derive(Clone, Default)]
pub struct Notifiers {
    pub email: Option<Arc<dyn EmailSender>>,
    pub text: Option<Arc<dyn TextSender>>,
}

impl Notifiers {
    /// Build senders from whichever credentials are present.
    pub fn from_config(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .unwrap_or_default();

        let email = config.resend_api_key.as_ref().map(|key| {
            Arc::new(ResendEmail::new(http.clone(), key, &config.email_from))
                as Arc<dyn EmailSender>
        });
        if email.is_none() {
            tracing::warn!("RESEND_API_KEY not set, emails will not be delivered");
        }

        let text: Option<Arc<dyn TextSender>> = match config.text_channel {
            TextChannel::Sms => match (
                &config.twilio_account_sid,
                &config.twilio_auth_token,
                &config.twilio_phone_number,
            ) {
                (Some(sid), Some(token), Some(from)) => {
                    Some(Arc::new(TwilioSms::new(http.clone(), sid, token, from))
                        as Arc<dyn TextSender>)
                }
                _ => None,
            },
            TextChannel::WhatsApp => config
                .textmebot_api_key
                .as_ref()
                .map(|key| Arc::new(TextMeBot::new(http.clone(), key)) as Arc<dyn TextSender>),
        };
        match &text {
            Some(sender) => tracing::info!(channel = sender.name(), "Text channel configured"),
            None => tracing::info!("No text channel configured, SMS reminders disabled"),
        }

        Self { email, text }
    }

    pub async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), AppError> {
        let sender = self
            .email
            .as_ref()
            .ok_or_else(|| AppError::Delivery("email channel not configured".to_string()))?;
        sender.send_email(to, message).await
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), AppError> {
        let sender = self
            .text
            .as_ref()
            .ok_or_else(|| AppError::Delivery("text channel not configured".to_string()))?;
        sender.send_text(to, body).await
    }
}

// ─── Resend ──────────────────────────────────────────────────────────────────

pub struct ResendEmail {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendEmail {
    pub fn new(http: reqwest::Client, api_key: &str, from: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmail {
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), AppError> {
        let body = serde_json::json!({
            "from": self.from,
            "to": [to],
            "subject": message.subject,
            "html": message.html,
        });

        let response = self
            .http
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Resend request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!("Resend HTTP {}: {}", status, text)));
        }

        tracing::info!(subject = %message.subject, "Email sent");
        Ok(())
    }
}

// ─── Twilio ──────────────────────────────────────────────────────────────────

pub struct TwilioSms {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioSms {
    pub fn new(http: reqwest::Client, account_sid: &str, auth_token: &str, from: &str) -> Self {
        Self {
            http,
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl TextSender for TwilioSms {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!("Twilio HTTP {}: {}", status, text)));
        }

        tracing::info!("SMS sent");
        Ok(())
    }
}

// ─── TextMeBot (WhatsApp) ────────────────────────────────────────────────────

pub struct TextMeBot {
    http: reqwest::Client,
    api_key: String,
}

impl TextMeBot {
    pub fn new(http: reqwest::Client, api_key: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
        }
    }
}

/// TextMeBot wants the bare digits of the number.
fn digits_only(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl TextSender for TextMeBot {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<(), AppError> {
        let response = self
            .http
            .get(TEXTMEBOT_URL)
            .query(&[
                ("recipient", digits_only(to).as_str()),
                ("apikey", self.api_key.as_str()),
                ("text", body),
            ])
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("TextMeBot request failed: {}", e)))?;

        let ok = response.status().is_success();
        let text = response.text().await.unwrap_or_default();

        // TextMeBot reports some failures with a 200 and an error text.
        if !ok || text.to_lowercase().contains("error") {
            return Err(AppError::Delivery(format!("TextMeBot error: {}", text)));
        }

        tracing::info!("WhatsApp message sent");
        Ok(())
    }
}

// ─── Templates ───────────────────────────────────────────────────────────────

fn wrap(body: &str) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">{}</div>"#,
        body
    )
}

/// Nagging email for `tier`. Success and shame have their own builders.
pub fn nag_email(tier: Tier, name: &str) -> EmailMessage {
    match tier {
        Tier::Gentle => EmailMessage {
            subject: format!("🏃 Hey {}, have you moved today?", name),
            html: wrap(&format!(
                "<h2>Hi {}!</h2>\
                 <p>No workout on your WHOOP yet today.</p>\
                 <p>Bike, indoor trainer, or just a walk. Even 15 minutes counts.</p>\
                 <p style=\"color: #666; font-size: 12px;\">Your personal nagger</p>",
                name
            )),
        },
        Tier::Reminder | Tier::Success | Tier::Shame => EmailMessage {
            subject: format!("⚠️ {}, still no activity...", name),
            html: wrap(
                "<h2>Hours have gone by.</h2>\
                 <p>Your WHOOP has not recorded a workout.</p>\
                 <p><strong>15-20 minutes on the bike.</strong> That is all it takes.</p>\
                 <p>Move. Now.</p>",
            ),
        },
        Tier::Aggressive => EmailMessage {
            subject: format!("🔴 {}. WAKE UP.", name.to_uppercase()),
            html: wrap(
                "<h1 style=\"color: #c0392b;\">NO MORE EXCUSES.</h1>\
                 <p>Another day thrown away?</p>\
                 <p><strong>GET UP AND DO SOMETHING.</strong> Ten minutes. But NOW.</p>",
            ),
        },
    }
}

/// Text-channel body for a nagging `tier`.
pub fn nag_text(tier: Tier, name: &str) -> String {
    match tier {
        Tier::Gentle => {
            "Hey, WHOOP sees no activity today. Bike? Walk? Even 15 min! 💪".to_string()
        }
        Tier::Aggressive => "🔴 NO WORKOUT YET. GET MOVING RIGHT NOW.".to_string(),
        Tier::Reminder | Tier::Success | Tier::Shame => {
            format!("{}. Hours without activity. The plan was clear. Move.", name)
        }
    }
}

/// Congratulation email listing whichever workout details are known.
pub fn success_email(name: &str, workout: &WorkoutSummary, goal_kg: f64) -> EmailMessage {
    let mut items = String::new();
    if let Some(sport) = &workout.sport {
        items.push_str(&format!("<li>Type: {}</li>", sport));
    }
    if let Some(strain) = workout.strain {
        items.push_str(&format!("<li>Strain: {:.1}</li>", strain));
    }
    if let Some(calories) = workout.calories {
        items.push_str(&format!("<li>Calories: {} kcal</li>", calories));
    }
    if let Some(minutes) = workout.duration_minutes {
        items.push_str(&format!("<li>Duration: {} min</li>", minutes));
    }

    EmailMessage {
        subject: format!("✅ Well done {}! Workout recorded!", name),
        html: wrap(&format!(
            "<h2 style=\"color: #27ae60;\">Great! 💪</h2>\
             <p>WHOOP recorded activity today:</p><ul>{}</ul>\
             <p>Keep going. One day at a time.</p>\
             <p>🎯 Goal: {:.0} kg</p>",
            items, goal_kg
        )),
    }
}

pub fn shame_email(name: &str) -> EmailMessage {
    EmailMessage {
        subject: "📊 Daily report: day lost".to_string(),
        html: wrap(&format!(
            "<h2 style=\"color: #c0392b;\">Zero activity today, {}.</h2>\
             <p>The streak is broken.</p>\
             <p>You will get this email every evening you do not move.</p>\
             <p style=\"color: #666;\">Tomorrow, wake up and ride.</p>",
            name
        )),
    }
}

/// Figures for the weekly report email.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub workouts_done: u32,
    pub current_streak: u32,
    pub current_weight: Option<f64>,
    /// Change over the week; negative is a loss
    pub weight_change: Option<f64>,
    pub goal_kg: f64,
}

impl WeeklyReport {
    pub fn verdict(&self) -> &'static str {
        if self.workouts_done >= 5 {
            "🎉 Great week! Keep it up!"
        } else if self.workouts_done >= 3 {
            "👍 Decent week, you can do better!"
        } else {
            "⚠️ Poor week. Try harder!"
        }
    }
}

pub fn weekly_report_email(report: &WeeklyReport) -> EmailMessage {
    let weight = report
        .current_weight
        .map(|w| format!("{:.1} kg", w))
        .unwrap_or_else(|| "n/a".to_string());
    let change = report
        .weight_change
        .map(|c| format!("{:+.1} kg", c))
        .unwrap_or_else(|| "n/a".to_string());
    let to_go = report
        .current_weight
        .map(|w| format!(" ({:.1} kg to go)", (w - report.goal_kg).max(0.0)))
        .unwrap_or_default();

    EmailMessage {
        subject: format!("📊 Weekly report - {}/7 days", report.workouts_done),
        html: wrap(&format!(
            "<h2>Weekly Report</h2>\
             <table style=\"width: 100%;\">\
             <tr><td>Workouts completed</td><td><strong>{}/7</strong></td></tr>\
             <tr><td>Current streak</td><td><strong>{} days</strong></td></tr>\
             <tr><td>Current weight</td><td><strong>{}</strong></td></tr>\
             <tr><td>Weight change</td><td><strong>{}</strong></td></tr>\
             </table>\
             <p>{}</p>\
             <p style=\"color: #666;\">🎯 Goal: {:.0} kg{}</p>",
            report.workouts_done,
            report.current_streak,
            weight,
            change,
            report.verdict(),
            report.goal_kg,
            to_go
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("+39 333 123-4567"), "393331234567");
    }

    #[test]
    fn test_nag_templates_escalate() {
        let gentle = nag_email(Tier::Gentle, "Sam");
        let aggressive = nag_email(Tier::Aggressive, "Sam");
        assert!(gentle.subject.contains("Sam"));
        assert!(aggressive.subject.contains("SAM"));
        assert_ne!(nag_text(Tier::Gentle, "Sam"), nag_text(Tier::Aggressive, "Sam"));
    }

    #[test]
    fn test_success_email_lists_known_fields_only() {
        let workout = WorkoutSummary {
            sport: Some("cycling".to_string()),
            strain: Some(12.345),
            calories: None,
            duration_minutes: Some(40),
        };
        let email = success_email("Sam", &workout, 85.0);
        assert!(email.html.contains("Type: cycling"));
        assert!(email.html.contains("Strain: 12.3"));
        assert!(email.html.contains("Duration: 40 min"));
        assert!(!email.html.contains("Calories"));
    }

    #[test]
    fn test_weekly_verdict_thresholds() {
        let mut report = WeeklyReport {
            workouts_done: 5,
            current_streak: 2,
            current_weight: Some(90.0),
            weight_change: Some(-0.8),
            goal_kg: 85.0,
        };
        assert!(report.verdict().starts_with("🎉"));
        report.workouts_done = 3;
        assert!(report.verdict().starts_with("👍"));
        report.workouts_done = 2;
        assert!(report.verdict().starts_with("⚠️"));

        let email = weekly_report_email(&report);
        assert!(email.subject.contains("2/7"));
        assert!(email.html.contains("-0.8 kg"));
        assert!(email.html.contains("5.0 kg to go"));
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_delivery_error() {
        let notifiers = Notifiers::default();
        let err = notifiers.send_text("+391", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Delivery(_)));
    }
}
