/// SendGrid mail dispatcher.
///
/// Sends the finished-session transcript to the sales team through the
/// SendGrid v3 mail API.
///
/// Required env vars (validated at startup by the binary):
///   SENDGRID_API_KEY     — bearer credential
///   SENDGRID_FROM_EMAIL  — verified sender address
///   SENDGRID_TO_EMAIL    — sales team recipient
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use porchline_core::{Notifier, TranscriptEmail};

use crate::format;

#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub from_email: String,
    pub to_email: String,
}

pub struct SendGridNotifier {
    config: SendGridConfig,
    client: Client,
    base_url: String,
}

impl SendGridNotifier {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            base_url: "https://api.sendgrid.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 2],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send_transcript(&self, email: &TranscriptEmail) -> Result<()> {
        let subject = format::subject(email);
        let text = format::render_text(email);
        let html = format::render_html(email);

        let body = MailSend {
            personalizations: [Personalization {
                to: [Address { email: &self.config.to_email }],
            }],
            from: Address { email: &self.config.from_email },
            subject: &subject,
            content: [
                Content { content_type: "text/plain", value: &text },
                Content { content_type: "text/html", value: &html },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .context("SendGrid HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("SendGrid returned {}: {}", status, error_body);
        }

        info!(session_id = %email.session_id, "Chat transcript email sent");
        Ok(())
    }
}
