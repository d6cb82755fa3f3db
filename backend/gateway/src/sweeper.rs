//! Stale-session sweeper.
//!
//! A recurring task on a fixed interval, decoupled from inbound request
//! volume: active, un-notified sessions idle past the cutoff are marked
//! abandoned. This only prevents stale "active" bookkeeping; it never
//! touches completed or notified sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::warn;

use porchline_store::ChatStore;

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Sessions idle longer than this are considered stale.
    pub stale_after: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            stale_after: Duration::from_secs(10 * 60),
        }
    }
}

/// Run the sweep loop indefinitely. Errors are logged and the loop keeps
/// going; a failed sweep only delays bookkeeping.
pub async fn run_sweeper(store: Arc<ChatStore>, config: SweeperConfig) {
    let mut interval = time::interval(config.interval);
    // The immediate first tick would sweep at startup before anything
    // could be stale; skip it.
    interval.tick().await;
    loop {
        interval.tick().await;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(config.stale_after).unwrap_or(chrono::Duration::zero());
        if let Err(e) = store.sweep_stale(cutoff).await {
            warn!(error = %e, "stale-session sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porchline_core::{ChatMessage, CustomerInfo, SessionStatus};

    #[tokio::test]
    async fn sweeper_abandons_idle_sessions() {
        let store = Arc::new(ChatStore::in_memory().unwrap());
        store
            .record_turn(
                "idle",
                &CustomerInfo::unknown(),
                &[ChatMessage::assistant("Hi! Ask me about swing beds.")],
            )
            .await
            .unwrap();

        let config = SweeperConfig {
            interval: Duration::from_millis(20),
            stale_after: Duration::ZERO,
        };
        let handle = tokio::spawn(run_sweeper(store.clone(), config));

        // Give the loop a couple of ticks.
        time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        let session = store.find("idle").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Abandoned);
    }
}
