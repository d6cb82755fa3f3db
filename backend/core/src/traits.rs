use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ChatMessage, CustomerInfo};

/// Trait for LLM completion providers backing the assistant.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Send a completion request and return the assistant's reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply>;
}

/// Request to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    /// Conversation history, oldest first. Roles are user/assistant only;
    /// the system instruction travels separately.
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionReply {
    pub content: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Everything the staff email needs about a finished session.
#[derive(Debug, Clone)]
pub struct TranscriptEmail {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub customer_info: CustomerInfo,
}

/// Trait for the outbound one-time session summary.
///
/// Implementations must not be retried by callers: the lifecycle layer
/// guarantees at most one dispatch attempt per session.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_transcript(&self, email: &TranscriptEmail) -> Result<()>;
}
