use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::storage::serializer::BodyPolicy;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration, read from a TOML file.
///
/// # Fields Overview
///
/// - `capture`: input stream, stop conditions and export location
/// - `filters`: server ports to keep and whether bodies may be inlined
/// - `logging`: level and optional log file
/// - `metrics`: whether the engine reports to the metrics facade
/// - `sanitization`: redaction applied before export
///
/// Missing sections and fields take their defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub filters: FilterConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub sanitization: SanitizationConfig,
}

impl Config {
    /// Reads, parses and validates the file at `path`.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.output_file.trim().is_empty() {
            return Err(ConfigError::BadValue(
                "capture.output_file must not be empty".to_string(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::BadValue(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.filters.ports.contains(&0) {
            return Err(ConfigError::NotInRange(
                "filters.ports must be between 1 and 65535".to_string(),
            ));
        }

        Ok(())
    }

    pub fn body_policy(&self) -> BodyPolicy {
        BodyPolicy::new(self.filters.capture_body)
    }
}
