//! Error types for the logging subsystem

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    /// A global subscriber was already installed, or installation failed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("Unknown log level '{0}' (expected trace, debug, info, warn or error)")]
    UnknownLevel(String),
}
