//! # PII redaction
//!
//! Purely textual: bodies are never parsed as JSON, so malformed documents are still
//! scrubbed on a best-effort basis. Every operation returns new values and leaves its
//! input untouched.
//!
//! - Headers named by the policy get [`REDACTION_MARKER`] as value.
//! - JSON bodies (`application/json` or any `+json` type) have the values of a fixed list
//!   of sensitive fields replaced by the marker, quoted or bare.
//! - Every body is then scrubbed for email addresses, JWTs and phone-number-shaped
//!   digit runs, in that order, each replaced by a typed placeholder.

use std::collections::BTreeMap;

use log::debug;
use regex::bytes::{NoExpand, Regex};

use super::policy::{RedactionPolicy, REDACTION_MARKER};
use crate::http_parser::HttpMessage;
use crate::session_management::Session;

const SENSITIVE_FIELDS: [&str; 18] = [
    "password",
    "pwd",
    "passwd",
    "token",
    "access_token",
    "refresh_token",
    "api_key",
    "apiKey",
    "secret",
    "api_secret",
    "authorization",
    "cookie",
    "email",
    "phone",
    "phone_number",
    "phoneNumber",
    "mobile",
    "mobile_number",
];

const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b";
const JWT_PATTERN: &str = r"eyJ[A-Za-z0-9_=-]+\.eyJ[A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+";
const PHONE_PATTERN: &str =
    r"\+?\d{1,3}[\s\-\.]?\(?\d{1,4}\)?[\s\-\.]?\d{1,4}[\s\-\.]?\d{1,4}[\s\-\.]?\d{1,9}";

struct FieldPattern {
    quoted: Regex,
    /// Unquoted scalar. Values opening an object, array or string are left alone.
    bare: Regex,
    replacement: Vec<u8>,
}

struct PiiPattern {
    re: Regex,
    placeholder: &'static [u8],
}

pub struct PiiSanitizer {
    policy: RedactionPolicy,
    fields: Vec<FieldPattern>,
    pii: Vec<PiiPattern>,
}

impl PiiSanitizer {
    pub fn new(policy: RedactionPolicy) -> Result<Self, regex::Error> {
        let fields = SENSITIVE_FIELDS
            .iter()
            .map(|field| {
                let name = regex::escape(field);
                Ok(FieldPattern {
                    quoted: Regex::new(&format!(r#""{}"\s*:\s*"([^"]*)""#, name))?,
                    bare: Regex::new(&format!(r#""{}"\s*:\s*([^,}}\s"\[{{][^,}}\s]*)"#, name))?,
                    replacement: format!(r#""{}": "{}""#, field, REDACTION_MARKER).into_bytes(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let pii = vec![
            PiiPattern {
                re: Regex::new(EMAIL_PATTERN)?,
                placeholder: b"[EMAIL]",
            },
            PiiPattern {
                re: Regex::new(JWT_PATTERN)?,
                placeholder: b"[JWT_TOKEN]",
            },
            PiiPattern {
                re: Regex::new(PHONE_PATTERN)?,
                placeholder: b"[PHONE]",
            },
        ];

        Ok(Self {
            policy,
            fields,
            pii,
        })
    }

    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Redacted copy of `msg`.
    pub fn redact(&self, msg: &HttpMessage) -> HttpMessage {
        let mut redacted = msg.clone();
        if self.policy.sanitize_headers {
            redacted = redacted.with_headers(self.redact_headers(msg.headers()));
        }
        if self.policy.sanitize_body && !msg.body().is_empty() {
            redacted = redacted.with_body(self.redact_body(msg.body(), msg.content_type()));
        }
        redacted
    }

    /// Redacted copy of every message in `session`.
    pub fn redact_session(&self, session: &Session) -> Session {
        session.map_messages(|msg| self.redact(msg))
    }

    pub fn redact_headers(&self, headers: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
        headers
            .iter()
            .map(|(name, value)| {
                if self.policy.should_redact_header(name) {
                    debug!("Sanitized header: {}", name);
                    (name.clone(), REDACTION_MARKER.as_bytes().to_vec())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }

    pub fn redact_body(&self, body: &[u8], content_type: Option<&str>) -> Vec<u8> {
        if is_json(content_type) {
            let fields_redacted = self.redact_json_fields(body);
            self.redact_text(&fields_redacted)
        } else {
            self.redact_text(body)
        }
    }

    /// Email, JWT and phone scrubbing, applied to any text.
    pub fn redact_text(&self, text: &[u8]) -> Vec<u8> {
        let mut result = text.to_vec();
        for pattern in &self.pii {
            result = pattern
                .re
                .replace_all(&result, NoExpand(pattern.placeholder))
                .into_owned();
        }
        result
    }

    fn redact_json_fields(&self, body: &[u8]) -> Vec<u8> {
        let mut result = body.to_vec();
        for field in &self.fields {
            result = field
                .quoted
                .replace_all(&result, NoExpand(&field.replacement))
                .into_owned();
            result = field
                .bare
                .replace_all(&result, NoExpand(&field.replacement))
                .into_owned();
        }
        result
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("application/json") || ct.contains("+json")
    })
}
