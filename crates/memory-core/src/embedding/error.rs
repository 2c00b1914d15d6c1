use thiserror::Error;

/// Errors returned by embedding generation and health probing.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The remote endpoint could not be reached at all.
    #[error("embedding endpoint '{url}' unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// The endpoint responded but not within the call's deadline.
    #[error("embedding call to '{url}' timed out after {deadline_ms}ms")]
    Timeout { url: String, deadline_ms: u64 },

    /// The endpoint returned a non-success status.
    #[error("embedding endpoint '{url}' returned status {status}: {body}")]
    BadResponse {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be parsed into a vector.
    #[error("failed to parse embedding response: {reason}")]
    MalformedResponse { reason: String },

    /// The returned vector's length does not match the configured
    /// dimension (fixed at startup).
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider's own configuration is invalid.
    #[error("invalid embedding provider configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout {
                url: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                deadline_ms: 30_000,
            }
        } else {
            EmbeddingError::Unreachable {
                url: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                reason: err.to_string(),
            }
        }
    }
}
