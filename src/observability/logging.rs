use std::fs::OpenOptions;

use log::LevelFilter;

use crate::configuration::types::LoggingConfig;
use crate::error_handling::types::ConfigError;

/// Installs the global `env_logger`.
///
/// The configured level applies first and `RUST_LOG` directives override it. When
/// `config.file` is set, output is appended to that file instead of stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_filter(config))
        .parse_env(env_logger::Env::default())
        .format_target(false);

    if !config.file.is_empty() {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| ConfigError::BadValue(format!("logger already initialized: {}", e)))
}

fn level_filter(config: &LoggingConfig) -> LevelFilter {
    config.level.parse().unwrap_or(LevelFilter::Info)
}
