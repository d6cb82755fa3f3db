//! Transcript → email body rendering.
//!
//! Both bodies carry the session metadata header, the total message
//! count, and the numbered conversation with per-message timestamps in a
//! fixed textual form.

use chrono::{DateTime, Utc};

use porchline_core::{ChatRole, TranscriptEmail};

const FOOTER: &str =
    "This email was automatically generated from the Lowcountry Swing Beds chat interface.";

fn fmt_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn role_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "Customer",
        _ => "Assistant",
    }
}

pub fn subject(email: &TranscriptEmail) -> String {
    format!("New Customer Chat - Session {}", email.session_id)
}

/// Plain-text body.
pub fn render_text(email: &TranscriptEmail) -> String {
    let conversation = email
        .messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            format!(
                "{}. {} ({}):\n{}",
                i + 1,
                role_label(msg.role),
                fmt_time(msg.timestamp),
                msg.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "New Customer Chat Session\n\n\
         Session ID: {}\n\
         Started: {}\n\
         IP Address: {}\n\
         User Agent: {}\n\
         Total Messages: {}\n\n\
         Chat Conversation:\n{}\n\n---\n{}",
        email.session_id,
        fmt_time(email.customer_info.first_seen),
        email.customer_info.ip_address.as_deref().unwrap_or("Unknown"),
        email.customer_info.user_agent.as_deref().unwrap_or("Unknown"),
        email.messages.len(),
        conversation,
        FOOTER,
    )
}

/// HTML body with per-role message styling.
pub fn render_html(email: &TranscriptEmail) -> String {
    let conversation = email
        .messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let background = match msg.role {
                ChatRole::User => "#e3f2fd",
                _ => "#f3e5f5",
            };
            format!(
                "<div style=\"margin-bottom: 20px; padding: 10px; background: {background}; border-radius: 5px;\">\
                 <div style=\"font-size: 12px; color: #666; margin-bottom: 5px;\">{}. <strong>{}</strong> ({}):</div>\
                 <div>{}</div></div>",
                i + 1,
                role_label(msg.role),
                fmt_time(msg.timestamp),
                escape_html(&msg.content).replace('\n', "<br>"),
            )
        })
        .collect::<String>();

    format!(
        "<h2>New Customer Chat Session</h2>\
         <p><strong>Session ID:</strong> {}</p>\
         <p><strong>Started:</strong> {}</p>\
         <p><strong>IP Address:</strong> {}</p>\
         <p><strong>User Agent:</strong> {}</p>\
         <p><strong>Total Messages:</strong> {}</p>\
         <h3>Chat Conversation:</h3>\
         <div style=\"background: #f5f5f5; padding: 20px; border-radius: 8px;\">{}</div>\
         <hr><p style=\"font-size: 12px; color: #666;\">{}</p>",
        escape_html(&email.session_id),
        fmt_time(email.customer_info.first_seen),
        escape_html(email.customer_info.ip_address.as_deref().unwrap_or("Unknown")),
        escape_html(email.customer_info.user_agent.as_deref().unwrap_or("Unknown")),
        email.messages.len(),
        conversation,
        FOOTER,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
