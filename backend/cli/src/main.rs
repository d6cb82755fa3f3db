mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use porchline_assistant::OpenAiProvider;
use porchline_gateway::{start_server, AppState, SweeperConfig};
use porchline_notify::{SendGridConfig, SendGridNotifier};
use porchline_store::ChatStore;

use config::Config;

#[derive(Parser)]
#[command(name = "porchline")]
#[command(about = "Porchline — customer-support chat service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show current service status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }

            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| {
                            tracing_subscriber::EnvFilter::new(&config.log_level)
                        }),
                )
                .json()
                .init();

            run_server(config).await?;
        }
        Commands::Status => {
            let port = std::env::var("PORCHLINE_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8080);
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{port}/api/health"))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("Porchline is not running on port {port}");
                }
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let store = Arc::new(ChatStore::open(&config.db_path)?);
    let provider = Arc::new(OpenAiProvider::new(&config.openai_api_key));
    let notifier = Arc::new(SendGridNotifier::new(SendGridConfig {
        api_key: config.sendgrid_api_key.clone(),
        from_email: config.sendgrid_from_email.clone(),
        to_email: config.sendgrid_to_email.clone(),
    }));

    let state = Arc::new(AppState::new(store, provider, notifier));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    info!(db_path = %config.db_path, "starting Porchline");
    start_server(addr, state, SweeperConfig::default()).await
}
