use anyhow::Result;
use async_trait::async_trait;

use porchline_core::{CompletionReply, CompletionRequest, LlmProvider};

/// A mock completion provider that returns canned replies.
pub struct MockProvider {
    fixed_reply: Option<String>,
    fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self { fixed_reply: None, fail: false }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.fixed_reply = Some(reply.into());
        self
    }

    /// Make every completion fail, to exercise the degraded path.
    pub fn failing() -> Self {
        Self { fixed_reply: None, fail: true }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply> {
        if self.fail {
            anyhow::bail!("mock provider forced failure");
        }
        Ok(CompletionReply {
            content: self
                .fixed_reply
                .clone()
                .unwrap_or_else(|| "Mock reply".to_string()),
            model: request.model.clone(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porchline_core::ChatMessage;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "mock".into(),
            system_prompt: String::new(),
            messages: vec![ChatMessage::user("hello")],
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn canned_reply_is_returned() {
        let provider = MockProvider::new().with_reply("Twin through King.");
        let reply = provider.complete(&request()).await.unwrap();
        assert_eq!(reply.content, "Twin through King.");
    }

    #[tokio::test]
    async fn failing_provider_errors() {
        let provider = MockProvider::failing();
        assert!(provider.complete(&request()).await.is_err());
    }
}
