//! Delivery channel selector — one "deliver transcript" capability, two
//! transports.
//!
//! The beacon transport is fire-and-forget: it reports local enqueue
//! success and is never retried, since the sender cannot observe the
//! receiving side's outcome and a retry could double-fire the staff
//! notification. The confirmed transport awaits the server's
//! acknowledgement and is preferred whenever the page is still fully
//! interactive.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use porchline_core::{ChatMessage, ChatRole};

/// Why the session is ending. Determines the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Customer pressed "end chat".
    Explicit,
    /// Foreground inactivity window elapsed.
    IdleTimeout,
    /// Page stayed hidden past the shorter window.
    HiddenTimeout,
    /// Page is being unloaded.
    PageUnload,
}

impl EndReason {
    /// Teardown contexts cannot wait for a response; everything else can.
    fn prefers_beacon(self) -> bool {
        matches!(self, EndReason::HiddenTimeout | EndReason::PageUnload)
    }
}

/// Wire form of the end-session call: session key plus the full ordered
/// transcript, timestamps in RFC 3339.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionPayload {
    pub session_id: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
    pub timestamp: String,
}

impl EndSessionPayload {
    pub fn new(session_id: impl Into<String>, transcript: &[ChatMessage]) -> Self {
        Self {
            session_id: session_id.into(),
            messages: transcript
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        ChatRole::User => "user",
                        _ => "assistant",
                    },
                    content: m.content.clone(),
                    timestamp: m.timestamp.to_rfc3339(),
                })
                .collect(),
        }
    }

    /// Abbreviated variant carrying only the newest turn (the last
    /// customer message and everything after it), for size-constrained
    /// sends. The server falls back to its stored transcript when the
    /// resulting payload is thinner than what it already holds.
    pub fn newest_turn_only(session_id: impl Into<String>, transcript: &[ChatMessage]) -> Self {
        let start = transcript
            .iter()
            .rposition(|m| m.role == ChatRole::User)
            .unwrap_or(0);
        Self::new(session_id, &transcript[start..])
    }
}

/// One way to get the final transcript to the server.
#[async_trait]
pub trait TranscriptDelivery: Send + Sync {
    /// `Ok` means the transport accepted the payload: local enqueue for
    /// the beacon, a parsed acknowledgement for the confirmed transport.
    async fn deliver(&self, payload: &EndSessionPayload) -> Result<()>;
}

/// Best-effort one-way send on a detached task. Guaranteed to be
/// attempted even while the page is tearing down; the outcome is never
/// observed.
pub struct BeaconDelivery {
    client: Client,
    endpoint: String,
}

impl BeaconDelivery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl TranscriptDelivery for BeaconDelivery {
    async fn deliver(&self, payload: &EndSessionPayload) -> Result<()> {
        let body = serde_json::to_vec(payload).context("Failed to encode beacon payload")?;
        let request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body);
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) => debug!(status = %resp.status(), "beacon delivered"),
                Err(e) => debug!(error = %e, "beacon send failed; transcript dropped"),
            }
        });
        // Local enqueue succeeded; no fallback is attempted after this.
        Ok(())
    }
}

/// Confirmed request/response send for interactive contexts.
pub struct ConfirmedDelivery {
    client: Client,
    endpoint: String,
}

impl ConfirmedDelivery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl TranscriptDelivery for ConfirmedDelivery {
    async fn deliver(&self, payload: &EndSessionPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .context("End-session request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("end-session returned {}: {}", status, body);
        }
        Ok(())
    }
}

/// Chooses the transport by execution context so the lifecycle
/// controller never special-cases transport.
pub struct ChannelSelector {
    beacon: Arc<dyn TranscriptDelivery>,
    confirmed: Arc<dyn TranscriptDelivery>,
}

impl ChannelSelector {
    pub fn new(beacon: Arc<dyn TranscriptDelivery>, confirmed: Arc<dyn TranscriptDelivery>) -> Self {
        Self { beacon, confirmed }
    }

    /// Both transports aimed at the service's end-session endpoint.
    pub fn over_http(base_url: &str) -> Self {
        let endpoint = format!("{}/chat/end-session", base_url.trim_end_matches('/'));
        Self::new(
            Arc::new(BeaconDelivery::new(endpoint.clone())),
            Arc::new(ConfirmedDelivery::new(endpoint)),
        )
    }

    pub async fn deliver(&self, reason: EndReason, payload: &EndSessionPayload) -> Result<()> {
        let transport: &dyn TranscriptDelivery = if reason.prefers_beacon() {
            self.beacon.as_ref()
        } else {
            self.confirmed.as_ref()
        };
        if let Err(e) = transport.deliver(payload).await {
            // If the page closes before delivery completes, the
            // transcript for that delivery is lost. Accepted trade-off:
            // best-effort notification, not a durable queue.
            warn!(session_id = %payload.session_id, error = %e, "transcript delivery failed");
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records delivered payloads instead of sending them.
    #[derive(Default)]
    pub struct RecordingDelivery {
        pub count: AtomicUsize,
        pub last: Mutex<Option<EndSessionPayload>>,
    }

    #[async_trait]
    impl TranscriptDelivery for RecordingDelivery {
        async fn deliver(&self, payload: &EndSessionPayload) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(payload.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingDelivery;
    use super::*;
    use std::sync::atomic::Ordering;

    fn payload() -> EndSessionPayload {
        EndSessionPayload::new("s1", &[ChatMessage::user("hi")])
    }

    fn selector() -> (ChannelSelector, Arc<RecordingDelivery>, Arc<RecordingDelivery>) {
        let beacon = Arc::new(RecordingDelivery::default());
        let confirmed = Arc::new(RecordingDelivery::default());
        let sel = ChannelSelector::new(beacon.clone(), confirmed.clone());
        (sel, beacon, confirmed)
    }

    #[tokio::test]
    async fn teardown_contexts_use_the_beacon() {
        for reason in [EndReason::PageUnload, EndReason::HiddenTimeout] {
            let (sel, beacon, confirmed) = selector();
            sel.deliver(reason, &payload()).await.unwrap();
            assert_eq!(beacon.count.load(Ordering::SeqCst), 1);
            assert_eq!(confirmed.count.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn interactive_contexts_use_the_confirmed_transport() {
        for reason in [EndReason::Explicit, EndReason::IdleTimeout] {
            let (sel, beacon, confirmed) = selector();
            sel.deliver(reason, &payload()).await.unwrap();
            assert_eq!(beacon.count.load(Ordering::SeqCst), 0);
            assert_eq!(confirmed.count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn newest_turn_only_trims_to_the_last_customer_exchange() {
        let transcript = [
            ChatMessage::assistant("Hi! Ask me about swing beds."),
            ChatMessage::user("Do you ship to Texas?"),
            ChatMessage::assistant("We do."),
            ChatMessage::user("What about lead times?"),
            ChatMessage::assistant("5-7 weeks."),
        ];
        let payload = EndSessionPayload::newest_turn_only("s1", &transcript);
        assert_eq!(payload.messages.len(), 2);
        assert_eq!(payload.messages[0].content, "What about lead times?");
        assert_eq!(payload.messages[1].content, "5-7 weeks.");

        // No customer message yet: the whole (greeting-only) transcript.
        let greeting = [ChatMessage::assistant("Hi!")];
        let payload = EndSessionPayload::newest_turn_only("s1", &greeting);
        assert_eq!(payload.messages.len(), 1);
    }

    #[test]
    fn payload_serializes_camel_case_with_rfc3339_timestamps() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(json["sessionId"], "s1");
        let ts = json["messages"][0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
