//! Error types for Edit Flux

use thiserror::Error;

/// Errors that can occur while ingesting events or producing reports
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Line not found: {line}")]
    LineNotFound { line: usize },

    #[error("Invalid event kind: {0}")]
    InvalidEventKind(String),

    #[error("Failed to parse event stream: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
