use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use porchline_core::{Notifier, TranscriptEmail};

/// Test double that records dispatches instead of sending mail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: AtomicUsize,
    fail: AtomicBool,
    last: Mutex<Option<TranscriptEmail>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every dispatch fail from now on.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub async fn last_email(&self) -> Option<TranscriptEmail> {
        self.last.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_transcript(&self, email: &TranscriptEmail) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("recording notifier forced failure");
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().await = Some(email.clone());
        Ok(())
    }
}
