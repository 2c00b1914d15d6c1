//! Error taxonomy shared across services.
//!
//! This is the `code` surfaced to JSON-RPC/CLI callers: each
//! variant maps to one entry of the taxonomy, never to an internal type name.

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::store::StoreError;
use crate::vector::VectorIndexError;

/// Errors returned by the service layer (Memory/Project/Session/Task).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate an invariant (e.g. a second active session).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The embedding provider or vector index cannot be reached.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The relational store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The vector index failed.
    #[error("vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// The embedding provider failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl ServiceError {
    /// The stable machine-readable code surfaced over the RPC/CLI boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
            Self::VectorIndex(_) => "VECTOR_INDEX_ERROR",
            Self::Embedding(_) => "EMBEDDING_ERROR",
        }
    }

    /// The CLI exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 1,
            Self::NotFound(_) | Self::Conflict(_) => 2,
            Self::ProviderUnavailable(_) | Self::VectorIndex(_) | Self::Embedding(_) => 3,
            Self::Store(_) => 2,
        }
    }
}

/// Convenience result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that abort process startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Relational store migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] StoreError),

    /// The configured embedding dimension disagrees with the existing
    /// vector collection's metadata.
    #[error("embedding dimension mismatch: collection expects {expected}, configured {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
