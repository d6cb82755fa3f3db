use anyhow::{Context, Result};

/// Porchline runtime configuration.
///
/// The upstream credentials are required: the service refuses to start
/// without a completion key and a complete mail configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// SQLite database path
    pub db_path: String,
    /// OpenAI API key
    pub openai_api_key: String,
    /// SendGrid API key
    pub sendgrid_api_key: String,
    /// Verified sender address
    pub sendgrid_from_email: String,
    /// Sales team recipient
    pub sendgrid_to_email: String,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables. Missing required
    /// credentials are a fatal startup condition.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: std::env::var("PORCHLINE_BIND")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORCHLINE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            db_path: std::env::var("PORCHLINE_DB")
                .unwrap_or_else(|_| "porchline.db".to_string()),
            openai_api_key: require("OPENAI_API_KEY")?,
            sendgrid_api_key: require("SENDGRID_API_KEY")?,
            sendgrid_from_email: require("SENDGRID_FROM_EMAIL")?,
            sendgrid_to_email: require("SENDGRID_TO_EMAIL")?,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("Please define the {name} environment variable"))
}
