//! Session lifecycle controller — the single authority for client-side
//! state transitions and for preventing duplicate terminal actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use porchline_assistant::FALLBACK_REPLY;
use porchline_core::ChatMessage;

use crate::client::ChatClient;
use crate::clock::{IdlePolicy, SessionClock, TimeoutKind};
use crate::delivery::{ChannelSelector, EndReason, EndSessionPayload};

struct WidgetState {
    session_id: Option<String>,
    transcript: Vec<ChatMessage>,
}

/// Owns the client-local binary session state (`active`/`ended`), the
/// transcript, and the end-once guard.
pub struct LifecycleController {
    chat: ChatClient,
    selector: ChannelSelector,
    clock: SessionClock,
    state: Mutex<WidgetState>,
    /// Set synchronously before any asynchronous delivery work begins,
    /// so concurrent triggers cannot both execute the end logic.
    ended: AtomicBool,
}

impl LifecycleController {
    /// Wire up the clock and start listening for its signal. The
    /// returned controller ends itself on inactivity.
    pub fn start(policy: IdlePolicy, chat: ChatClient, selector: ChannelSelector) -> Arc<Self> {
        let (timeout_tx, mut timeout_rx) = mpsc::channel(1);
        let clock = SessionClock::start(policy, timeout_tx);

        let controller = Arc::new(Self {
            chat,
            selector,
            clock,
            state: Mutex::new(WidgetState { session_id: None, transcript: Vec::new() }),
            ended: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&controller);
        tokio::spawn(async move {
            if let Some(kind) = timeout_rx.recv().await {
                if let Some(controller) = weak.upgrade() {
                    let reason = match kind {
                        TimeoutKind::Idle => EndReason::IdleTimeout,
                        TimeoutKind::Hidden => EndReason::HiddenTimeout,
                    };
                    controller.end(reason).await;
                }
            }
        });

        controller
    }

    /// Seed the conversation with the assistant greeting.
    pub fn greet(&self, text: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.transcript.push(ChatMessage::assistant(text));
    }

    /// One customer turn: append, reset the clock, call the server, and
    /// degrade to the fixed fallback reply on any upstream failure.
    ///
    /// Returns `None` once the session has ended — the input surface is
    /// disabled and no further turns are accepted.
    pub async fn send_message(&self, text: &str) -> Option<String> {
        if self.ended.load(Ordering::SeqCst) {
            return None;
        }

        let session_id = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.transcript.push(ChatMessage::user(text));
            state.session_id.clone()
        };
        self.clock.record_activity();

        let reply = match self.chat.send(session_id.as_deref(), text).await {
            Ok(turn) => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if state.session_id.is_none() {
                    state.session_id = Some(turn.session_id);
                }
                turn.message
            }
            Err(e) => {
                // Degrade, don't corrupt: the session stays usable for
                // future turns.
                warn!(error = %e, "chat turn failed; showing fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.transcript.push(ChatMessage::assistant(reply.clone()));
        }
        self.clock.record_activity();
        Some(reply)
    }

    pub fn page_hidden(&self) {
        self.clock.page_hidden();
    }

    pub fn page_visible(&self) {
        self.clock.page_visible();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).transcript.clone()
    }

    /// Transition to `ended` and drain the transcript through the
    /// delivery channel selector. Executes at most once; concurrent
    /// triggers (unload racing a pending timeout) see `false`.
    pub async fn end(&self, reason: EndReason) -> bool {
        if self.ended.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.clock.shutdown();

        let (session_id, transcript) = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            (state.session_id.clone(), state.transcript.clone())
        };

        // No server contact ever happened: there is nothing to drain.
        let Some(session_id) = session_id else {
            info!(?reason, "session ended before first server contact");
            return true;
        };

        info!(%session_id, ?reason, "ending chat session");
        let payload = EndSessionPayload::new(session_id, &transcript);
        let _ = self.selector.deliver(reason, &payload).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::RecordingDelivery;
    use porchline_core::ChatRole;
    use std::sync::atomic::Ordering as AtomicOrdering;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn quick_policy() -> IdlePolicy {
        IdlePolicy {
            idle_window: Duration::from_millis(80),
            hidden_window: Duration::from_millis(30),
        }
    }

    fn long_policy() -> IdlePolicy {
        IdlePolicy {
            idle_window: Duration::from_secs(300),
            hidden_window: Duration::from_secs(120),
        }
    }

    // Nothing listens on this port; chat turns fail and degrade.
    fn dead_client() -> ChatClient {
        ChatClient::new("http://127.0.0.1:9")
    }

    fn controller_with(
        policy: IdlePolicy,
    ) -> (Arc<LifecycleController>, Arc<RecordingDelivery>, Arc<RecordingDelivery>) {
        let beacon = Arc::new(RecordingDelivery::default());
        let confirmed = Arc::new(RecordingDelivery::default());
        let selector = ChannelSelector::new(beacon.clone(), confirmed.clone());
        let controller = LifecycleController::start(policy, dead_client(), selector);
        (controller, beacon, confirmed)
    }

    fn seed_session(controller: &LifecycleController, id: &str) {
        let mut state = controller.state.lock().unwrap();
        state.session_id = Some(id.to_string());
    }

    #[tokio::test]
    async fn end_executes_at_most_once() {
        let (controller, _beacon, confirmed) = controller_with(long_policy());
        controller.greet("Hi!");
        seed_session(&controller, "s1");

        assert!(controller.end(EndReason::Explicit).await);
        assert!(!controller.end(EndReason::Explicit).await);
        assert!(!controller.end(EndReason::PageUnload).await);
        assert_eq!(confirmed.count.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_triggers_race_to_a_single_end() {
        let (controller, beacon, confirmed) = controller_with(long_policy());
        seed_session(&controller, "s1");

        let a = controller.clone();
        let b = controller.clone();
        let (ra, rb) = tokio::join!(
            a.end(EndReason::Explicit),
            b.end(EndReason::PageUnload),
        );
        assert_ne!(ra, rb, "exactly one trigger wins");
        let total = beacon.count.load(AtomicOrdering::SeqCst)
            + confirmed.count.load(AtomicOrdering::SeqCst);
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn input_is_rejected_after_end() {
        let (controller, _beacon, _confirmed) = controller_with(long_policy());
        seed_session(&controller, "s1");
        controller.end(EndReason::Explicit).await;
        assert!(controller.is_ended());
        assert_eq!(controller.send_message("anyone there?").await, None);
    }

    #[tokio::test]
    async fn failed_turn_degrades_to_fallback_reply() {
        let (controller, _beacon, _confirmed) = controller_with(long_policy());
        let reply = controller.send_message("What sizes do you offer?").await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);

        // Session state is not corrupted: turn recorded, still active.
        assert!(!controller.is_ended());
        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn idle_timeout_ends_via_confirmed_transport() {
        let (controller, beacon, confirmed) = controller_with(quick_policy());
        seed_session(&controller, "s1");

        timeout(Duration::from_secs(2), async {
            while !controller.is_ended() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("controller should end itself on inactivity");

        assert_eq!(confirmed.count.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(beacon.count.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hidden_timeout_ends_via_beacon() {
        let (controller, beacon, confirmed) = controller_with(quick_policy());
        seed_session(&controller, "s1");
        controller.page_hidden();

        timeout(Duration::from_secs(2), async {
            while !controller.is_ended() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("controller should end itself while hidden");

        assert_eq!(beacon.count.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(confirmed.count.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn end_without_server_contact_delivers_nothing() {
        let (controller, beacon, confirmed) = controller_with(long_policy());
        controller.greet("Hi!");
        assert!(controller.end(EndReason::PageUnload).await);
        assert_eq!(beacon.count.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(confirmed.count.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delivered_payload_carries_the_full_transcript() {
        let (controller, _beacon, confirmed) = controller_with(long_policy());
        controller.greet("Hi! Ask me about swing beds.");
        controller.send_message("Do you ship to Texas?").await;
        seed_session(&controller, "s1");

        controller.end(EndReason::Explicit).await;
        let payload = confirmed.last.lock().unwrap().clone().unwrap();
        assert_eq!(payload.session_id, "s1");
        // Greeting + user turn + fallback assistant reply.
        assert_eq!(payload.messages.len(), 3);
    }
}
