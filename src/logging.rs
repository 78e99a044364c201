use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    level: String,
    message: String,
    timestamp: String,
}

impl LogMessage {
    fn from_record(record: &Record) -> Self {
        Self {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// Writes log records to stderr, as plain text or one JSON object per line.
///
/// Level and format can change after installation, once the config file has been read.
pub struct ConsoleLogger {
    level: RwLock<LevelFilter>,
    json: AtomicBool,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter, json: bool) -> Self {
        Self {
            level: RwLock::new(level),
            json: AtomicBool::new(json),
        }
    }

    pub fn reconfigure(&self, level: LevelFilter, json: bool) {
        if let Ok(mut current) = self.level.write() {
            *current = level;
        }
        self.json.store(json, Ordering::Relaxed);
    }

    fn level(&self) -> LevelFilter {
        self.level.read().map(|level| *level).unwrap_or(LevelFilter::Info)
    }

    pub fn init(level: LevelFilter, json: bool) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| ConsoleLogger::new(level, json));
        log::set_logger(logger).map(|()| log::set_max_level(level))
    }

    fn format(&self, record: &Record) -> String {
        let log_message = LogMessage::from_record(record);
        if self.json.load(Ordering::Relaxed) {
            match serde_json::to_string(&log_message) {
                Ok(line) => return line,
                Err(e) => eprintln!("Failed to serialize log message: {}", e),
            }
        }
        format!(
            "{} [{}] {}",
            log_message.timestamp, log_message.level, log_message.message
        )
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", self.format(record));
        }
    }

    fn flush(&self) {}
}

/// Install the console logger, falling back to env_logger if a logger is already set.
pub fn setup_logging(level: LevelFilter, json: bool) {
    if ConsoleLogger::init(level, json).is_err() {
        let _ = env_logger::Builder::new().filter_level(level).try_init();
    }
    log::debug!("Logging initialized at {}", level);
}

/// Switch the installed logger to the configured level and format.
pub fn apply_logging_config(level: LevelFilter, json: bool) {
    if let Some(logger) = LOGGER.get() {
        logger.reconfigure(level, json);
    }
    log::set_max_level(level);
    log::debug!("Log level set to {}", level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn format_with(json: bool) -> String {
        let logger = ConsoleLogger::new(LevelFilter::Debug, json);
        logger.format(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("Socket closed"))
                .build(),
        )
    }

    #[test]
    fn plain_line_has_level_and_message() {
        assert!(format_with(false).ends_with("[WARN] Socket closed"));
    }

    #[test]
    fn json_line_is_a_log_message() {
        let value: serde_json::Value = serde_json::from_str(&format_with(true)).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["message"], "Socket closed");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn enabled_respects_level() {
        let logger = ConsoleLogger::new(LevelFilter::Info, false);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!log::Log::enabled(&logger, &debug));
        assert!(log::Log::enabled(&logger, &error));
    }

    #[test]
    fn reconfigure_changes_level_and_format() {
        let logger = ConsoleLogger::new(LevelFilter::Info, false);
        logger.reconfigure(LevelFilter::Debug, true);

        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(log::Log::enabled(&logger, &debug));
        let line = logger.format(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("Config file not found"))
                .build(),
        );
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"], "Config file not found");
    }
}
