//! Process-wide `tracing` setup.
mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the global subscriber described by `cfg`.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}

/// Like [`logger_init`], but an already installed subscriber is not an error.
pub fn logger_init_once(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match logger_init(cfg) {
        Err(LoggerError::AlreadyInitialized) => Ok(()),
        other => other,
    }
}
