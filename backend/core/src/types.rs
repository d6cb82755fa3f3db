use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
///
/// `System` exists only on the outbound completion request; it is never
/// persisted or shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into(), timestamp: Utc::now() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into(), timestamp: Utc::now() }
    }
}

/// Server-side session status.
///
/// Transitions are monotonic: `Active` → {`Completed`, `Abandoned`}.
/// The only way out of a terminal state is `Abandoned` → `Active` on
/// renewed user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

/// Minimal metadata captured about the customer's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub first_seen: DateTime<Utc>,
}

impl CustomerInfo {
    pub fn unknown() -> Self {
        Self { ip_address: None, user_agent: None, first_seen: Utc::now() }
    }
}

/// One continuous customer conversation, keyed by an opaque identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    /// Insertion order equals conversation order.
    pub messages: Vec<ChatMessage>,
    pub customer_info: CustomerInfo,
    pub status: SessionStatus,
    pub last_activity: DateTime<Utc>,
    /// One-shot: flips false → true at most once, never back.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A notification is only ever dispatched for sessions where the
    /// customer actually said something.
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == ChatRole::User)
    }
}

/// Generate a fresh opaque session key.
pub fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}
