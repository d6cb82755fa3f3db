pub mod error;
pub mod traits;
pub mod types;

pub use error::ChatError;
pub use traits::{CompletionReply, CompletionRequest, LlmProvider, Notifier, TranscriptEmail};
pub use types::{ChatMessage, ChatRole, CustomerInfo, Session, SessionStatus};
