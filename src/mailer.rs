//! Outbound e-mail
//! Mission: Deliver password-reset links out-of-band

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub message: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Posts mail to a JSON HTTP mail API (Resend-style `POST /emails`).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("movie-catalog/0.1 (+reqwest)")
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build mail HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let payload = MailPayload {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.message,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Mail API request failed")?;

        let status = response.status();
        debug!(
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Mail API responded"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Mail API rejected message");
            anyhow::bail!("Mail API error: HTTP {}: {}", status, body);
        }

        info!(subject = %email.subject, "📧 Mail sent");
        Ok(())
    }
}

/// Development mailer: writes the message to the log instead of sending it.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "📧 (log mailer) {}",
            email.message
        );
        Ok(())
    }
}
