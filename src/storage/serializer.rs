//! # Serializer
//!
//! Renders sessions into [`ExportDocument`] records. A message that cannot be rendered
//! is replaced by an [`ErrorRecord`] so the rest of the export still goes through.
//!
//! Bodies are inlined only when [`BodyPolicy`] allows it: a text-like content type,
//! valid UTF-8 and a size under [`BodyPolicy::inline_limit`]. Bodies over
//! [`BodyPolicy::preview_limit`] are cut to a preview followed by `...`. Everything
//! else is summarized as a length and a type.

use std::collections::BTreeMap;

use log::warn;

use super::types::{
    ErrorRecord, ExportDocument, MessageEntry, MessageRecord, SessionRecord, TransactionRecord,
};
use crate::data_capture::types::to_epoch_seconds;
use crate::error_handling::types::ExportError;
use crate::http_parser::{HttpMessage, MessageKind};
use crate::sanitization::PiiSanitizer;
use crate::session_management::{Session, Transaction};

/// Type reported for bodies with no usable content type or invalid UTF-8.
pub const BINARY_BODY_TYPE: &str = "binary";
const ELLIPSIS: &str = "...";

const TEXT_LIKE_TYPES: [&str; 3] = [
    "application/json",
    "application/xml",
    "application/javascript",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPolicy {
    /// When false, bodies are never inlined.
    pub capture_body: bool,
    /// Bodies of this many bytes or more are never inlined.
    pub inline_limit: usize,
    /// Inlined bodies longer than this are cut to a preview.
    pub preview_limit: usize,
}

impl Default for BodyPolicy {
    fn default() -> Self {
        Self {
            capture_body: true,
            inline_limit: 10_000,
            preview_limit: 500,
        }
    }
}

impl BodyPolicy {
    pub fn new(capture_body: bool) -> Self {
        Self {
            capture_body,
            ..Default::default()
        }
    }
}

pub fn build_export_document(sessions: &[Session], policy: &BodyPolicy) -> ExportDocument {
    let sessions: Vec<SessionRecord> = sessions
        .iter()
        .map(|session| session_record(session, policy))
        .collect();
    ExportDocument {
        session_count: sessions.len(),
        sessions,
    }
}

/// Redacts (when a sanitizer is given) then renders a snapshot of sessions.
pub fn export_sessions(
    sessions: &[Session],
    sanitizer: Option<&PiiSanitizer>,
    policy: &BodyPolicy,
) -> ExportDocument {
    match sanitizer {
        Some(sanitizer) => {
            let redacted: Vec<Session> = sessions
                .iter()
                .map(|session| sanitizer.redact_session(session))
                .collect();
            build_export_document(&redacted, policy)
        }
        None => build_export_document(sessions, policy),
    }
}

pub fn session_record(session: &Session, policy: &BodyPolicy) -> SessionRecord {
    let tuple = session.tuple();
    SessionRecord {
        session_id: session.id().to_string(),
        client_ip: tuple.client_ip.clone(),
        client_port: tuple.client_port,
        server_ip: tuple.server_ip.clone(),
        server_port: tuple.server_port,
        start_time: session.start_time().map(to_epoch_seconds),
        end_time: session.end_time().map(to_epoch_seconds),
        duration: session.duration().map(duration_seconds),
        transaction_count: session.transaction_count(),
        transactions: session
            .transactions()
            .iter()
            .map(|tx| transaction_record(tx, policy))
            .collect(),
    }
}

pub fn transaction_record(tx: &Transaction, policy: &BodyPolicy) -> TransactionRecord {
    TransactionRecord {
        request: tx.request().map(|msg| message_entry(msg, policy)),
        request_time: tx.request().and(tx.request_time()).map(to_epoch_seconds),
        response: tx.response().map(|msg| message_entry(msg, policy)),
        response_time: tx.response().and(tx.response_time()).map(to_epoch_seconds),
        duration: tx.duration().map(duration_seconds),
    }
}

/// Renders `msg`, falling back to an error record carrying its first line.
pub fn message_entry(msg: &HttpMessage, policy: &BodyPolicy) -> MessageEntry {
    match message_record(msg, policy) {
        Ok(record) => MessageEntry::Message(record),
        Err(e) => {
            let first_line = String::from_utf8_lossy(msg.raw_start_line()).into_owned();
            warn!("Failed to serialize message '{}': {}", first_line, e);
            MessageEntry::Error(ErrorRecord {
                error: e.to_string(),
                first_line,
            })
        }
    }
}

fn message_record(msg: &HttpMessage, policy: &BodyPolicy) -> Result<MessageRecord, ExportError> {
    if std::str::from_utf8(msg.raw_start_line()).is_err() {
        return Err(ExportError::Encoding(
            "start line is not valid UTF-8".to_string(),
        ));
    }

    let (method, uri, status_code, reason_phrase) = match msg.kind() {
        MessageKind::Request => (
            Some(msg.method().to_string()),
            Some(msg.uri().to_string()),
            None,
            None,
        ),
        MessageKind::Response => (
            None,
            None,
            Some(msg.status_code()),
            Some(msg.reason_phrase().to_string()),
        ),
        MessageKind::Unknown => {
            return Err(ExportError::Encoding(
                "message was never classified".to_string(),
            ))
        }
    };

    let mut record = MessageRecord {
        kind: msg.kind(),
        first_line: msg.first_line(),
        method,
        uri,
        status_code,
        reason_phrase,
        version: msg.version().to_string(),
        headers: emitted_headers(msg.headers()),
        length: msg.len(),
        body: None,
        body_truncated: false,
        body_length: None,
        body_type: None,
    };
    apply_body_policy(&mut record, msg, policy);
    Ok(record)
}

/// Headers with an empty name or value, or a value that is not UTF-8, are left out.
fn emitted_headers(headers: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .filter_map(|(name, value)| {
            std::str::from_utf8(value)
                .ok()
                .map(|value| (name.clone(), value.to_string()))
        })
        .collect()
}

fn apply_body_policy(record: &mut MessageRecord, msg: &HttpMessage, policy: &BodyPolicy) {
    let body = msg.body();
    if body.is_empty() {
        return;
    }

    let text = std::str::from_utf8(body).ok();
    let content_type = msg.content_type().filter(|ct| !ct.trim().is_empty());

    let inlinable = policy.capture_body
        && body.len() < policy.inline_limit
        && content_type.is_some_and(is_text_like);

    match text {
        Some(text) if inlinable => {
            if text.len() > policy.preview_limit {
                let cut = floor_char_boundary(text, policy.preview_limit);
                record.body = Some(format!("{}{}", &text[..cut], ELLIPSIS));
                record.body_truncated = true;
                record.body_length = Some(body.len());
            } else {
                record.body = Some(text.to_string());
            }
        }
        _ => {
            record.body_length = Some(body.len());
            record.body_type = Some(match (text, content_type) {
                (Some(_), Some(ct)) => ct.to_string(),
                _ => BINARY_BODY_TYPE.to_string(),
            });
        }
    }
}

/// `text/*` and a few structured application types, parameters ignored.
fn is_text_like(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type.starts_with("text/") || TEXT_LIKE_TYPES.contains(&media_type.as_str())
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut cut = index.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

fn duration_seconds(duration: chrono::Duration) -> f64 {
    duration
        .num_microseconds()
        .map_or(duration.num_milliseconds() as f64 / 1_000.0, |us| {
            us as f64 / 1_000_000.0
        })
}
