//! Error taxonomy for the orchestration core.
//!
//! Every variant is classified by [`Error::is_recoverable`], which feeds both the
//! circuit breaker (only recoverable errors count toward the failure ratio) and
//! the retry policy (only recoverable errors are retried).

use uuid::Uuid;

/// Result type alias used throughout the orchestration core.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A downstream HTTP call timed out.
    #[error("request to {service} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Logical name of the downstream service.
        service: String,
        /// Elapsed time before the timeout fired.
        elapsed_ms: u64,
    },

    /// A downstream HTTP call failed transiently (connection refused, 5xx).
    #[error("transient failure calling {service}: {message}")]
    Transient {
        /// Logical name of the downstream service.
        service: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// A downstream HTTP call failed with a fatal 4xx status.
    #[error("{service} rejected the request ({status}): {message}")]
    Fatal {
        /// Logical name of the downstream service.
        service: String,
        /// HTTP status code.
        status: u16,
        /// Human-readable failure detail.
        message: String,
    },

    /// The circuit breaker for a downstream service is open.
    #[error("circuit breaker open for {service}")]
    CircuitBroken {
        /// Logical name of the downstream service.
        service: String,
    },

    /// A resource referenced by id could not be found (maps to HTTP 404 at the boundary).
    #[error("not found: {0}")]
    NotFound(String),

    /// An invariant the caller relied on does not hold (maps to HTTP 409 at the boundary).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-supplied data failed validation (maps to HTTP 422 at the boundary).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record was malformed or missing required fields; the affected record
    /// should be skipped rather than aborting the whole operation.
    #[error("data quality issue: {0}")]
    DataQuality(String),

    /// A durable store is unavailable or returned an unexpected error.
    #[error("store error: {0}")]
    Store(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedding dimension did not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch {
        /// Configured embedding dimension.
        expected: usize,
        /// Dimension actually returned.
        actual: usize,
    },

    /// The embedding service is unavailable; callers should fall back to
    /// non-vector behavior.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Configuration was invalid or incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal programmer error, not expected to be recoverable by retrying.
    #[error("internal error: {0}")]
    Internal(String),

    /// Episode with the given id does not exist.
    #[error("episode not found: {0}")]
    EpisodeNotFound(Uuid),
}

impl Error {
    /// Whether this error is recoverable: can be retried with backoff and counts
    /// toward circuit breaker failure ratios.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Transient { .. } | Error::CircuitBroken { .. } => true,
            Error::Fatal { .. }
            | Error::NotFound(_)
            | Error::Conflict(_)
            | Error::InvalidInput(_)
            | Error::DataQuality(_)
            | Error::Serialization(_)
            | Error::EmbeddingDimensionMismatch { .. }
            | Error::Configuration(_)
            | Error::Internal(_)
            | Error::EpisodeNotFound(_) => false,
            // Store and embedding-unavailable failures are treated as degradation
            // triggers upstream, but are themselves worth a bounded retry.
            Error::Store(_) | Error::EmbeddingUnavailable(_) => true,
        }
    }

    /// Whether this error should surface to the caller as a 404 rather than an error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
