//! Error types for write transports.

use thiserror::Error;

/// Errors produced by a [`Client`](crate::Client).
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// MySQL connection or query error.
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    /// Local file error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed endpoint URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Unexpected response JSON.
    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    /// Write rejected by the server.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Health endpoint did not answer 200.
    #[error("Health check of {url} failed with status {status}: {body}")]
    HealthCheck {
        url: String,
        status: u16,
        body: String,
    },

    /// Administrative command failed.
    #[error("Command '{command}' failed with status {status}: {body}")]
    Command {
        command: String,
        status: u16,
        body: String,
    },

    /// InfluxDB v2 bucket lookup found nothing.
    #[error("Bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported by this transport.
    #[error("{operation} is not supported by the {client} client")]
    NotSupported {
        client: &'static str,
        operation: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
