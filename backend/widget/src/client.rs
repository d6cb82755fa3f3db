//! HTTP client for the normal chat turn (`POST /chat`).

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatTurnRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnReply {
    pub message: String,
    pub session_id: String,
}

pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat", base_url.trim_end_matches('/')),
        }
    }

    /// Send one customer message; the server replies with the assistant
    /// turn and the (possibly freshly assigned) session key.
    pub async fn send(&self, session_id: Option<&str>, message: &str) -> Result<ChatTurnReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatTurnRequest { session_id, message })
            .send()
            .await
            .context("Chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat endpoint returned {}: {}", status, body);
        }

        response.json().await.context("Failed to parse chat reply")
    }
}
