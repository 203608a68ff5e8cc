use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Transactional delivery via the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        self.client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("email API unreachable")?
            .error_for_status()
            .context("email API rejected the message")?;

        Ok(())
    }
}

/// Used when no API key is configured; logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<()> {
        info!(%to, %subject, "email delivery skipped (no mailer configured)");
        Ok(())
    }
}

pub fn verification_email(name: &str, verify_url: &str) -> (String, String) {
    let subject = "Verify your Aris account".to_string();
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Welcome to Aris. Please confirm your email address to finish setting \
         up your account:</p>\
         <p><a href=\"{verify_url}\">Verify my email</a></p>\
         <p>If you did not create this account, you can ignore this message.</p>",
    );
    (subject, html)
}

pub fn signup_confirmation(name: &str, unsubscribe_url: &str) -> (String, String) {
    let subject = "You're on the Aris list".to_string();
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Thanks for your interest in Aris. We'll let you know when early \
         access opens.</p>\
         <p><a href=\"{unsubscribe_url}\">Unsubscribe</a></p>",
    );
    (subject, html)
}
