use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data_capture::types::Direction;

/// What a delivered buffer turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    /// Not HTTP, or too malformed to classify. Never forwarded past the parser.
    Unknown,
}

/// A structured HTTP/1.x message reconstructed from one delivery.
///
/// Immutable once built; redaction produces a new value through
/// [`HttpMessage::with_headers`] / [`HttpMessage::with_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub(super) kind: MessageKind,
    pub(super) direction: Direction,
    pub(super) method: String,
    pub(super) uri: String,
    pub(super) version: String,
    pub(super) status_code: u32,
    pub(super) reason_phrase: String,
    /// Raw bytes of the status/request line, without the CRLF.
    pub(super) start_line: Vec<u8>,
    /// Case preserved, last value wins for a repeated name.
    pub(super) headers: BTreeMap<String, Vec<u8>>,
    pub(super) body: Vec<u8>,
    /// Size of the buffer the message was parsed from.
    pub(super) length: usize,
}

impl HttpMessage {
    pub(super) fn unknown(length: usize, direction: Direction) -> Self {
        Self {
            kind: MessageKind::Unknown,
            direction,
            method: String::new(),
            uri: String::new(),
            version: String::new(),
            status_code: 0,
            reason_phrase: String::new(),
            start_line: Vec::new(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            length,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.kind != MessageKind::Unknown
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == MessageKind::Response
    }

    /// Direction of the delivery the message was parsed from.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Protocol version without the `HTTP/` prefix, e.g. `1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status_code(&self) -> u32 {
        self.status_code
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    pub fn raw_start_line(&self) -> &[u8] {
        &self.start_line
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.headers
    }

    /// Header value by ASCII case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(Vec::as_slice)
    }

    /// Header value as text, `None` when absent or not valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_str("Content-Type")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Declared length: size of the input buffer, not of the body.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Re-rendered first line, e.g. `GET /index.html HTTP/1.1`. Empty for `Unknown`.
    pub fn first_line(&self) -> String {
        match self.kind {
            MessageKind::Request => format!("{} {} HTTP/{}", self.method, self.uri, self.version),
            MessageKind::Response => format!(
                "HTTP/{} {} {}",
                self.version, self.status_code, self.reason_phrase
            ),
            MessageKind::Unknown => String::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, Vec<u8>>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}
