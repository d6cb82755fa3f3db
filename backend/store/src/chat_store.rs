/// SQLite-backed conversation store.
///
/// One row per session plus one row per message; message insertion order
/// is conversation order. SQLite's per-statement atomicity is what makes
/// `claim_completion` a real compare-and-set: two racing end-session
/// requests cannot both observe `status = 'active'`.
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};

use porchline_core::{ChatMessage, ChatRole, CustomerInfo, Session, SessionStatus};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        session_id    TEXT PRIMARY KEY,
        status        TEXT NOT NULL DEFAULT 'active',
        ip_address    TEXT,
        user_agent    TEXT,
        first_seen    INTEGER NOT NULL,
        last_activity INTEGER NOT NULL,
        notified      INTEGER NOT NULL DEFAULT 0,
        created_at    INTEGER NOT NULL,
        completed_at  INTEGER
    );
    CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT NOT NULL,
        role        TEXT NOT NULL,
        content     TEXT NOT NULL,
        sent_at     INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_status   ON sessions(status);
    CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(last_activity);
    CREATE INDEX IF NOT EXISTS idx_messages_session  ON messages(session_id);";

pub struct ChatStore {
    conn: Mutex<Connection>,
}

impl ChatStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .context("Failed to open SQLite chat database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize chat schema")?;
        info!("ChatStore opened at {:?}", path.as_ref());
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Load a full session with its transcript, if it exists.
    pub async fn find(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().await;
        Self::load_session(&conn, session_id)
    }

    /// Record one completed turn: create the session on first contact,
    /// append the new messages, refresh last-activity, and flip
    /// abandoned → active on renewed user activity.
    pub async fn record_turn(
        &self,
        session_id: &str,
        customer_info: &CustomerInfo,
        new_messages: &[ChatMessage],
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::upsert_session(&conn, session_id, customer_info)?;
        Self::insert_messages(&conn, session_id, new_messages)?;
        Ok(())
    }

    /// Replace the whole stored transcript with a client-resent history.
    ///
    /// Clients that ship their full message array each turn own the
    /// transcript; appending their resend would duplicate every prior
    /// turn. Session bookkeeping is the same as [`Self::record_turn`].
    pub async fn replace_transcript(
        &self,
        session_id: &str,
        customer_info: &CustomerInfo,
        messages: &[ChatMessage],
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        Self::upsert_session(&conn, session_id, customer_info)?;
        conn.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
        Self::insert_messages(&conn, session_id, messages)?;
        Ok(())
    }

    fn upsert_session(
        conn: &Connection,
        session_id: &str,
        customer_info: &CustomerInfo,
    ) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let exists: Option<String> = conn
            .query_row(
                "SELECT status FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            None => {
                conn.execute(
                    "INSERT INTO sessions
                         (session_id, status, ip_address, user_agent,
                          first_seen, last_activity, notified, created_at)
                     VALUES (?1, 'active', ?2, ?3, ?4, ?5, 0, ?5)",
                    params![
                        session_id,
                        customer_info.ip_address,
                        customer_info.user_agent,
                        customer_info.first_seen.timestamp_millis(),
                        now,
                    ],
                )?;
                debug!(session_id, "Created new chat session");
            }
            Some(status) => {
                // Renewed activity reactivates an abandoned session.
                // Completed sessions stay completed.
                if status == "abandoned" {
                    conn.execute(
                        "UPDATE sessions SET status = 'active', last_activity = ?1
                         WHERE session_id = ?2",
                        params![now, session_id],
                    )?;
                } else {
                    conn.execute(
                        "UPDATE sessions SET last_activity = ?1 WHERE session_id = ?2",
                        params![now, session_id],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn insert_messages(
        conn: &Connection,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<()> {
        for msg in messages {
            conn.execute(
                "INSERT INTO messages (session_id, role, content, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session_id,
                    role_str(msg.role),
                    msg.content,
                    msg.timestamp.timestamp_millis(),
                ],
            )?;
        }
        Ok(())
    }

    /// Atomically claim the active → completed transition.
    ///
    /// Exactly one of any number of concurrent end-session signals for the
    /// same key gets `true`; everyone else sees `false` and must treat the
    /// end as already processed.
    pub async fn claim_completion(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "UPDATE sessions SET status = 'completed', completed_at = ?1
             WHERE session_id = ?2 AND status = 'active'",
            params![Utc::now().timestamp_millis(), session_id],
        )?;
        Ok(n == 1)
    }

    /// Flip the one-shot notification flag. Called only after a successful
    /// dispatch; nothing ever sets it back.
    pub async fn mark_notified(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE sessions SET notified = 1 WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    /// Terminal state for sessions that never had a customer message.
    pub async fn mark_abandoned(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "UPDATE sessions SET status = 'abandoned' WHERE session_id = ?1 AND status = 'active'",
            params![session_id],
        )?;
        Ok(n == 1)
    }

    /// Mark active, un-notified sessions idle since before `cutoff` as
    /// abandoned. Returns the number of sessions swept.
    pub async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "UPDATE sessions SET status = 'abandoned'
             WHERE status = 'active' AND notified = 0 AND last_activity < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        if n > 0 {
            info!("Swept {} stale chat sessions", n);
        }
        Ok(n)
    }

    fn load_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
        let header = conn
            .query_row(
                "SELECT status, ip_address, user_agent, first_seen,
                        last_activity, notified, created_at, completed_at
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<i64>>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, ip, ua, first_seen, last_activity, notified, created_at, completed_at)) =
            header
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT role, content, sent_at FROM messages
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let messages = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(role, content, sent_at)| ChatMessage {
                role: parse_role(&role),
                content,
                timestamp: millis_to_utc(sent_at),
            })
            .collect();

        Ok(Some(Session {
            session_id: session_id.to_string(),
            messages,
            customer_info: CustomerInfo {
                ip_address: ip,
                user_agent: ua,
                first_seen: millis_to_utc(first_seen),
            },
            status: SessionStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown session status: {status}"))?,
            last_activity: millis_to_utc(last_activity),
            notified,
            created_at: millis_to_utc(created_at),
            completed_at: completed_at.map(millis_to_utc),
        }))
    }
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    }
}

fn parse_role(s: &str) -> ChatRole {
    match s {
        "user" => ChatRole::User,
        // The store never holds system messages; tolerate unknowns as
        // assistant rather than failing a whole transcript load.
        _ => ChatRole::Assistant,
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            ip_address: Some("203.0.113.7".into()),
            user_agent: Some("test-agent".into()),
            first_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_turn_creates_active_session() {
        let store = ChatStore::in_memory().unwrap();
        let turn = [
            ChatMessage::user("What sizes do you offer?"),
            ChatMessage::assistant("Twin through King."),
        ];
        store.record_turn("s1", &customer(), &turn).await.unwrap();

        let session = store.find("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!session.notified);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, ChatRole::User);
        assert_eq!(session.messages[1].role, ChatRole::Assistant);
        assert_eq!(session.customer_info.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn find_unknown_session_is_none() {
        let store = ChatStore::in_memory().unwrap();
        assert!(store.find("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let store = ChatStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .record_turn("s1", &customer(), &[ChatMessage::user(format!("turn {i}"))])
                .await
                .unwrap();
        }
        let session = store.find("s1").await.unwrap().unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 0", "turn 1", "turn 2", "turn 3", "turn 4"]);
    }

    #[tokio::test]
    async fn renewed_activity_reactivates_abandoned_session() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn("s1", &customer(), &[ChatMessage::assistant("greeting")])
            .await
            .unwrap();
        assert!(store.mark_abandoned("s1").await.unwrap());

        store
            .record_turn("s1", &customer(), &[ChatMessage::user("still there?")])
            .await
            .unwrap();
        let session = store.find("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn completed_sessions_are_not_reactivated() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn("s1", &customer(), &[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert!(store.claim_completion("s1").await.unwrap());

        store
            .record_turn("s1", &customer(), &[ChatMessage::user("late message")])
            .await
            .unwrap();
        let session = store.find("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn claim_completion_has_exactly_one_winner() {
        let store = std::sync::Arc::new(ChatStore::in_memory().unwrap());
        store
            .record_turn("s1", &customer(), &[ChatMessage::user("hi")])
            .await
            .unwrap();

        // Race two claims on separate tasks; exactly one may win.
        let a = tokio::spawn({
            let store = store.clone();
            async move { store.claim_completion("s1").await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.claim_completion("s1").await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_ne!(a, b, "exactly one claim wins");

        // A later claim loses too.
        assert!(!store.claim_completion("s1").await.unwrap());

        let session = store.find("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn replace_transcript_discards_the_stored_history() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn(
                "s1",
                &customer(),
                &[ChatMessage::user("hi"), ChatMessage::assistant("ok")],
            )
            .await
            .unwrap();

        // A client resending its full history owns the transcript.
        let resend = [
            ChatMessage::user("hi"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
            ChatMessage::assistant("ok"),
        ];
        store.replace_transcript("s1", &customer(), &resend).await.unwrap();

        let session = store.find("s1").await.unwrap().unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "ok", "second", "ok"]);
    }

    #[tokio::test]
    async fn claim_completion_on_unknown_session_is_false() {
        let store = ChatStore::in_memory().unwrap();
        assert!(!store.claim_completion("nope").await.unwrap());
    }

    #[tokio::test]
    async fn notified_flag_is_one_shot() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn("s1", &customer(), &[ChatMessage::user("hi")])
            .await
            .unwrap();
        store.mark_notified("s1").await.unwrap();
        let session = store.find("s1").await.unwrap().unwrap();
        assert!(session.notified);

        // There is no API that clears the flag; sweeping must also skip
        // notified sessions.
        let swept = store.sweep_stale(Utc::now() + Duration::hours(1)).await.unwrap();
        assert_eq!(swept, 0);
    }

    #[tokio::test]
    async fn sweep_marks_only_stale_active_sessions() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn("stale", &customer(), &[ChatMessage::assistant("greeting")])
            .await
            .unwrap();
        store
            .record_turn("done", &customer(), &[ChatMessage::user("hi")])
            .await
            .unwrap();
        store.claim_completion("done").await.unwrap();

        // Cutoff in the future: everything still active and un-notified
        // counts as stale.
        let swept = store.sweep_stale(Utc::now() + Duration::minutes(1)).await.unwrap();
        assert_eq!(swept, 1);

        let stale = store.find("stale").await.unwrap().unwrap();
        assert_eq!(stale.status, SessionStatus::Abandoned);
        let done = store.find("done").await.unwrap().unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn sweep_skips_recently_active_sessions() {
        let store = ChatStore::in_memory().unwrap();
        store
            .record_turn("fresh", &customer(), &[ChatMessage::user("hi")])
            .await
            .unwrap();
        let swept = store.sweep_stale(Utc::now() - Duration::minutes(10)).await.unwrap();
        assert_eq!(swept, 0);
        let fresh = store.find("fresh").await.unwrap().unwrap();
        assert_eq!(fresh.status, SessionStatus::Active);
    }
}
