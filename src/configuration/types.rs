//! Configuration sections.
//!
//! Every section derives `serde::Deserialize` with `#[serde(default)]`, so a partial
//! file only overrides what it names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sanitization::policy::{RedactionPolicy, DEFAULT_HEADERS_TO_SANITIZE};

/// `[capture]`: where events come from, when to stop, where the export goes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recorded event stream to replay. Overridden by `--input`.
    pub input_file: Option<PathBuf>,
    /// Stop after this many HTTP messages. `0` means no limit.
    pub packet_limit: u64,
    /// Stop after this many seconds. `0` means no limit.
    pub timeout_seconds: u64,
    pub output_file: String,
    pub output_directory: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input_file: None,
            packet_limit: 100,
            timeout_seconds: 60,
            output_file: "captured_sessions.json".to_string(),
            output_directory: PathBuf::from("./output"),
        }
    }
}

/// `[filters]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Server ports to keep. Empty keeps everything.
    pub ports: Vec<u16>,
    /// When false, bodies are summarized and never inlined in the export.
    pub capture_body: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            capture_body: true,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`. `RUST_LOG` takes precedence.
    pub level: String,
    /// Log file, appended to. Empty logs to stderr.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

/// `[metrics]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `[sanitization]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizationConfig {
    pub enabled: bool,
    pub sanitize_headers: bool,
    pub sanitize_body: bool,
    pub headers_to_sanitize: Vec<String>,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sanitize_headers: true,
            sanitize_body: true,
            headers_to_sanitize: DEFAULT_HEADERS_TO_SANITIZE
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}

impl SanitizationConfig {
    /// The redaction policy to apply before export, `None` when sanitization is off.
    pub fn to_policy(&self) -> Option<RedactionPolicy> {
        self.enabled.then(|| {
            RedactionPolicy::new(
                self.sanitize_headers,
                self.sanitize_body,
                &self.headers_to_sanitize,
            )
        })
    }
}
