//! HTTP routes: the chat turn, the end-session signal, and health.
//!
//! All externally observable failures collapse to 400/404/500 with a
//! small JSON body; internal detail goes to tracing only.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use porchline_assistant::{
    build_system_prompt, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use porchline_core::{
    types::new_session_id, ChatError, ChatMessage, ChatRole, CompletionRequest, CustomerInfo,
    LlmProvider, Notifier, TranscriptEmail,
};
use porchline_store::ChatStore;

type ApiResponse = (StatusCode, Json<Value>);

/// Shared application state for the route handlers.
pub struct AppState {
    pub store: Arc<ChatStore>,
    pub provider: Arc<dyn LlmProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub system_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AppState {
    pub fn new(
        store: Arc<ChatStore>,
        provider: Arc<dyn LlmProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            provider,
            notifier,
            system_prompt: build_system_prompt(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat_turn))
        .route("/chat/end-session", post(end_session))
        .route("/api/health", get(health))
        // The widget runs in a browser on the storefront's origin.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "porchline",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Collapse the error taxonomy to its external HTTP form.
fn error_response(err: ChatError) -> ApiResponse {
    match &err {
        ChatError::InvalidRequest(message) => {
            warn!(%message, "rejected malformed request");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
        }
        ChatError::SessionNotFound(session_id) => {
            warn!(session_id, "end-session for unknown session");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Chat session not found" })),
            )
        }
        _ => {
            error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
        }
    }
}

fn customer_info_from(headers: &HeaderMap) -> CustomerInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    CustomerInfo {
        ip_address: header("x-forwarded-for").or_else(|| header("x-real-ip")),
        user_agent: header("user-agent"),
        first_seen: Utc::now(),
    }
}

/// The accepted `/chat` body shapes carry different ownership semantics:
/// a single message is appended to the stored transcript, while a full
/// `messages` array is the client's authoritative history and replaces it.
enum Incoming {
    Turn(ChatMessage),
    History(Vec<ChatMessage>),
}

/// Pull the conversation input out of any of the accepted body shapes:
/// `{message: string}`, `{messages: [...]}`, or a raw JSON string.
fn parse_incoming(body: &Value) -> Option<Incoming> {
    if let Some(text) = body.as_str() {
        return Some(Incoming::Turn(ChatMessage::user(text)));
    }
    if let Some(text) = body.get("message").and_then(Value::as_str) {
        return Some(Incoming::Turn(ChatMessage::user(text)));
    }
    if let Some(items) = body.get("messages").and_then(Value::as_array) {
        let parsed: Option<Vec<ChatMessage>> = items.iter().map(parse_wire_message).collect();
        return parsed
            .filter(|msgs| !msgs.is_empty())
            .map(Incoming::History);
    }
    None
}

fn parse_wire_message(item: &Value) -> Option<ChatMessage> {
    let role = match item.get("role").and_then(Value::as_str)? {
        "user" => ChatRole::User,
        "assistant" => ChatRole::Assistant,
        _ => return None,
    };
    let content = item.get("content").and_then(Value::as_str)?.to_string();
    let timestamp = item
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some(ChatMessage { role, content, timestamp })
}

fn parse_body(body: &str) -> Result<Value, ChatError> {
    if body.trim().is_empty() {
        return Err(ChatError::InvalidRequest("Empty request body".into()));
    }
    serde_json::from_str(body)
        .map_err(|_| ChatError::InvalidRequest("Invalid JSON in request body".into()))
}

/// Handler for `POST /chat` — one customer turn.
pub async fn chat_turn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResponse {
    match chat_turn_inner(&state, &headers, &body).await {
        Ok(response) => response,
        Err(e) => error_response(e),
    }
}

async fn chat_turn_inner(
    state: &AppState,
    headers: &HeaderMap,
    body: &str,
) -> Result<ApiResponse, ChatError> {
    let body = parse_body(body)?;
    let incoming = parse_incoming(&body).ok_or_else(|| {
        ChatError::InvalidRequest(
            "Invalid message format. Expected messages array or message string.".into(),
        )
    })?;

    let session_id = body
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(new_session_id);
    let customer_info = customer_info_from(headers);

    // Completion context: an appended turn extends the stored
    // transcript; a resent history IS the transcript.
    let context = match &incoming {
        Incoming::Turn(msg) => {
            let mut stored = match state
                .store
                .find(&session_id)
                .await
                .map_err(|e| ChatError::Storage(e.to_string()))?
            {
                Some(session) => session.messages,
                None => Vec::new(),
            };
            stored.push(msg.clone());
            stored
        }
        Incoming::History(history) => history.clone(),
    };

    let request = CompletionRequest {
        model: state.model.clone(),
        system_prompt: state.system_prompt.clone(),
        messages: context,
        max_tokens: state.max_tokens,
        temperature: state.temperature,
    };

    let reply = state
        .provider
        .complete(&request)
        .await
        .map_err(|e| ChatError::Completion(e.to_string()))?;

    match incoming {
        Incoming::Turn(msg) => {
            state
                .store
                .record_turn(
                    &session_id,
                    &customer_info,
                    &[msg, ChatMessage::assistant(&reply.content)],
                )
                .await
                .map_err(|e| ChatError::Storage(e.to_string()))?;
        }
        Incoming::History(mut history) => {
            history.push(ChatMessage::assistant(&reply.content));
            state
                .store
                .replace_transcript(&session_id, &customer_info, &history)
                .await
                .map_err(|e| ChatError::Storage(e.to_string()))?;
        }
    }

    info!(
        session_id,
        provider = state.provider.name(),
        tokens = reply.tokens_used,
        latency_ms = reply.latency_ms,
        "chat turn completed"
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "message": reply.content, "sessionId": session_id })),
    ))
}

/// Handler for `POST /chat/end-session` — the terminal signal.
///
/// Idempotent at the business-outcome level: the store's atomic
/// completion claim guarantees at most one notification dispatch per
/// session no matter how many end signals race in.
pub async fn end_session(State(state): State<Arc<AppState>>, body: String) -> ApiResponse {
    match end_session_inner(&state, &body).await {
        Ok(response) => response,
        Err(e) => error_response(e),
    }
}

async fn end_session_inner(state: &AppState, body: &str) -> Result<ApiResponse, ChatError> {
    let body = parse_body(body)?;
    let session_id = body
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| ChatError::InvalidRequest("Session ID is required".into()))?;

    let session = state
        .store
        .find(session_id)
        .await
        .map_err(|e| ChatError::Storage(e.to_string()))?
        .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

    // Sessions where the customer never said anything are abandoned
    // without notifying anyone.
    if !session.has_user_message() {
        state
            .store
            .mark_abandoned(session_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        return Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Session had no user messages" })),
        ));
    }

    // Atomic claim: exactly one of any number of racing end signals may
    // dispatch the notification.
    let claimed = state
        .store
        .claim_completion(session_id)
        .await
        .map_err(|e| ChatError::Storage(e.to_string()))?;
    if !claimed || session.notified {
        return Ok((
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Session already processed" })),
        ));
    }

    // The client may ship a fresher transcript than what we stored
    // (e.g. turns that raced the end signal); prefer it unless it is
    // thinner than what we already hold — abbreviated payloads are
    // backstopped by the stored transcript.
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_wire_message).collect::<Vec<_>>())
        .filter(|msgs| !msgs.is_empty() && msgs.len() >= session.messages.len())
        .unwrap_or(session.messages);

    let email = TranscriptEmail {
        session_id: session_id.to_string(),
        messages,
        customer_info: session.customer_info,
    };

    match state.notifier.send_transcript(&email).await {
        Ok(()) => {
            state
                .store
                .mark_notified(session_id)
                .await
                .map_err(|e| ChatError::Storage(e.to_string()))?;
            info!(session_id, "session ended and transcript emailed");
            Ok((
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Session ended and email sent successfully"
                })),
            ))
        }
        Err(e) => {
            // The session stays completed with the flag down so repeated
            // end signals cannot turn into a retry storm.
            let err = ChatError::Notification(e.to_string());
            error!(error = %err, session_id, "notification dispatch failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Session ended but email sending failed"
                })),
            ))
        }
    }
}
