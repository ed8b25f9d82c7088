use crate::error::{Result, ZeroDceError};
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Directory for a daily-rolling JSON log, in addition to the terminal output
    pub log_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ZeroDceError::InvalidParameter(format!(
                "Unknown log format: {}. Valid options: compact, pretty, json",
                s
            ))),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: Level::INFO,
            format: LogFormat::Compact,
            log_directory: None,
        }
    }
}

pub fn parse_level(s: &str) -> Result<Level> {
    s.parse::<Level>()
        .map_err(|_| ZeroDceError::InvalidParameter(format!("Unknown log level: {}", s)))
}

/// Initialize the logging system.
///
/// The returned guard flushes the file log when dropped and must be kept alive for the whole run.
/// `RUST_LOG` directives take precedence over `config.level`.
pub fn init_logging(config: LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let fmt_layer = match config.format {
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match config.log_directory {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = rolling::daily(&log_dir, "zerodce.log");
            let (writer, guard) = non_blocking(file_appender);

            let file_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE);

            subscriber.with(file_layer).try_init()?;
            Ok(Some(guard))
        }
        None => {
            subscriber.try_init()?;
            Ok(None)
        }
    }
}

/// Logs the start, progress and end of a long running operation
pub struct OperationLogger {
    operation: String,
    start_time: Instant,
    metadata: Vec<(String, String)>,
}

impl OperationLogger {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::info!(operation = %operation, "Operation started");

        OperationLogger {
            operation,
            start_time: Instant::now(),
            metadata: Vec::new(),
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl ToString) {
        self.metadata.push((key.into(), value.to_string()));
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_error(&self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.operation,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            error = %error,
            "Operation failed"
        );
    }

    pub fn complete(self) {
        tracing::info!(
            operation = %self.operation,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_logger() {
        let mut logger = OperationLogger::new("test_op");
        logger.add_metadata("epochs", 3);
        assert!(logger.elapsed_secs() >= 0.0);
        logger.complete();
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("xml").is_err());
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_level("loud").is_err());
    }
}
