use std::collections::BTreeSet;

/// Replaces redacted header values and sensitive JSON field values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

pub const DEFAULT_HEADERS_TO_SANITIZE: [&str; 3] = ["Authorization", "Cookie", "Set-Cookie"];

/// What the redaction stage is allowed to touch.
///
/// Header names are compared ASCII case-insensitively; they are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    pub sanitize_headers: bool,
    pub sanitize_body: bool,
    header_names: BTreeSet<String>,
}

impl RedactionPolicy {
    pub fn new<I, S>(sanitize_headers: bool, sanitize_body: bool, header_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sanitize_headers,
            sanitize_body,
            header_names: header_names
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn should_redact_header(&self, name: &str) -> bool {
        self.sanitize_headers && self.header_names.contains(&name.to_ascii_lowercase())
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.header_names.iter().map(String::as_str)
    }
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(true, true, DEFAULT_HEADERS_TO_SANITIZE)
    }
}
