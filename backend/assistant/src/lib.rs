pub mod prompt;
pub mod providers;

pub use prompt::{build_system_prompt, FALLBACK_REPLY};
pub use providers::{mock::MockProvider, openai::OpenAiProvider};

/// Completion defaults used for every customer turn.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
