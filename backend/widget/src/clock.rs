//! Session clock — inactivity detection with a hidden-page fast path.
//!
//! The watcher task sleeps until the next candidate deadline, then
//! re-checks elapsed time since the last recorded activity before
//! signaling. A timer that fires early or late under a busy scheduler
//! therefore never ends a session that saw activity in the meantime; it
//! re-arms for the remaining duration instead.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant};
use tracing::debug;

/// Inactivity windows. The shorter window applies while the page is
/// hidden (backgrounded or tab-switched).
#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    pub idle_window: Duration,
    pub hidden_window: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            idle_window: Duration::from_secs(5 * 60),
            hidden_window: Duration::from_secs(2 * 60),
        }
    }
}

/// Which window expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Full foreground window elapsed with no activity.
    Idle,
    /// Page stayed hidden past the shorter window.
    Hidden,
}

struct ClockState {
    last_activity: Instant,
    hidden: bool,
    cancelled: bool,
}

/// Tracks last-activity time and signals the lifecycle controller at
/// most once when the inactivity window elapses.
pub struct SessionClock {
    state: Arc<Mutex<ClockState>>,
    notify: Arc<Notify>,
}

impl SessionClock {
    /// Spawn the watcher task. The signal is delivered on `timeout_tx`;
    /// a dropped receiver simply forfeits automatic cleanup.
    pub fn start(policy: IdlePolicy, timeout_tx: mpsc::Sender<TimeoutKind>) -> Self {
        let state = Arc::new(Mutex::new(ClockState {
            last_activity: Instant::now(),
            hidden: false,
            cancelled: false,
        }));
        let notify = Arc::new(Notify::new());

        let watch_state = Arc::clone(&state);
        let watch_notify = Arc::clone(&notify);
        tokio::spawn(async move {
            run_watcher(policy, watch_state, watch_notify, timeout_tx).await;
        });

        Self { state, notify }
    }

    /// Update last-activity time; reschedules the pending timeout.
    pub fn record_activity(&self) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if s.cancelled {
            return;
        }
        s.last_activity = Instant::now();
        drop(s);
        self.notify.notify_one();
    }

    /// The page went to the background: switch to the shorter window.
    pub fn page_hidden(&self) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if s.cancelled {
            return;
        }
        s.hidden = true;
        drop(s);
        self.notify.notify_one();
    }

    /// Returning to the foreground counts as activity and restores the
    /// full window, cancelling early termination.
    pub fn page_visible(&self) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if s.cancelled {
            return;
        }
        s.hidden = false;
        s.last_activity = Instant::now();
        drop(s);
        self.notify.notify_one();
    }

    /// Clear all pending timers. No signal fires after shutdown.
    pub fn shutdown(&self) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        s.cancelled = true;
        drop(s);
        self.notify.notify_one();
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_watcher(
    policy: IdlePolicy,
    state: Arc<Mutex<ClockState>>,
    notify: Arc<Notify>,
    timeout_tx: mpsc::Sender<TimeoutKind>,
) {
    loop {
        let deadline = {
            let s = state.lock().unwrap_or_else(|e| e.into_inner());
            if s.cancelled {
                return;
            }
            let window = if s.hidden { policy.hidden_window } else { policy.idle_window };
            s.last_activity + window
        };

        tokio::select! {
            _ = time::sleep_until(deadline) => {
                let fired = {
                    let s = state.lock().unwrap_or_else(|e| e.into_inner());
                    if s.cancelled {
                        return;
                    }
                    let window =
                        if s.hidden { policy.hidden_window } else { policy.idle_window };
                    if s.last_activity.elapsed() >= window {
                        Some(if s.hidden { TimeoutKind::Hidden } else { TimeoutKind::Idle })
                    } else {
                        // Activity arrived while we slept; loop re-arms
                        // for the remaining duration.
                        None
                    }
                };
                if let Some(kind) = fired {
                    debug!(?kind, "session clock expired");
                    let _ = timeout_tx.send(kind).await;
                    return;
                }
            }
            // State changed (activity, visibility, shutdown): recompute
            // the deadline.
            _ = notify.notified() => {}
        }
    }
}
