//! Operational logging initialization.
//!
//! Builds the global tracing subscriber from the `logging` section of the
//! configuration: a level filter plus one fmt layer per configured sink.
//! Components emit through the `tracing` macros; dispatch is installed
//! exactly once here, so an event fired before initialization is silently
//! dropped rather than being a failure mode.

use std::fs::File;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid 'logging.log_level' value '{level}'")]
    InvalidLevel { level: String },

    #[error("'file' output specified but 'logging.log_file_path' is empty")]
    EmptyFilePath,

    #[error("unknown log_output type '{output}'")]
    UnknownOutput { output: String },

    #[error("failed to open log file '{path}': {source}")]
    OpenFile {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Installs the global subscriber. Call once, after config validation and
/// before anything serves traffic.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.log_level).map_err(|_| LoggingError::InvalidLevel {
        level: config.log_level.clone(),
    })?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if config.log_outputs.is_empty() {
        eprintln!("[WARN] no log outputs specified in config, defaulting to stdout for operational logs");
        layers.push(fmt::layer().boxed());
    }
    for output in &config.log_outputs {
        match output.as_str() {
            "stdout" => layers.push(fmt::layer().boxed()),
            "stderr" => layers.push(fmt::layer().with_writer(io::stderr).boxed()),
            "file" => {
                if config.log_file_path.is_empty() {
                    return Err(LoggingError::EmptyFilePath);
                }
                let file =
                    File::create(&config.log_file_path).map_err(|source| LoggingError::OpenFile {
                        path: config.log_file_path.clone(),
                        source,
                    })?;
                layers.push(
                    fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false)
                        .boxed(),
                );
            }
            other => {
                return Err(LoggingError::UnknownOutput {
                    output: other.to_owned(),
                })
            }
        }
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn config_with(outputs: &[&str]) -> LoggingConfig {
        LoggingConfig {
            log_outputs: outputs.iter().map(|s| s.to_string()).collect(),
            ..LoggingConfig::default()
        }
    }

    // Only the error paths are exercised here; they all reject before the
    // global subscriber would be installed, which can happen once per
    // process.

    #[test]
    fn unknown_output_is_rejected() {
        let err = init_logging(&config_with(&["syslog"])).unwrap_err();
        assert!(matches!(err, LoggingError::UnknownOutput { .. }));
    }

    #[test]
    fn file_output_requires_a_path() {
        let config = LoggingConfig {
            log_file_path: String::new(),
            ..config_with(&["file"])
        };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, LoggingError::EmptyFilePath));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let config = LoggingConfig {
            log_level: String::from("extremely[invalid"),
            ..config_with(&["stdout"])
        };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel { .. }));
    }
}
