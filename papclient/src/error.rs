//! Error types for the device client

/// Result type alias for device client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the device
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Device answered with a non-success HTTP status
    #[error("Device returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// File extension is not on the upload allow-list
    #[error("Unsupported file type: {0} (allowed: mp3, m4a, aac, wav)")]
    UnsupportedFile(String),

    /// Invalid command name for the generic command endpoint
    #[error("Invalid command name: {0}")]
    InvalidCommand(String),

    /// Configuration error (from papconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a status error from an HTTP status code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}
