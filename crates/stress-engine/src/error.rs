//! Error types for the write engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A writer task panicked or was cancelled.
    #[error("Writer task failed: {0}")]
    WriterFailed(#[from] tokio::task::JoinError),

    /// Sinks cannot be registered once the pipeline is open.
    #[error("Cannot add sink to open multi sink")]
    SinkOpen,

    /// Sinks are one-shot: closed -> open -> closed.
    #[error("Sink '{0}' cannot be reopened")]
    SinkReopened(&'static str),

    #[error("Sink '{0}' is not open")]
    SinkNotOpen(&'static str),

    #[error("Sink '{sink}' task failed: {message}")]
    SinkTask { sink: &'static str, message: String },

    #[error("Invalid dispatch configuration: {0}")]
    InvalidConfig(String),
}
