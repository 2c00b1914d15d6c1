use thiserror::Error;

/// Errors returned by vector index operations.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("failed to connect to vector index at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed { collection: String, message: String },

    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("failed to upsert point(s) into '{collection}': {message}")]
    UpsertFailed { collection: String, message: String },

    #[error("failed to search in '{collection}': {message}")]
    SearchFailed { collection: String, message: String },

    #[error("failed to delete point(s) from '{collection}': {message}")]
    DeleteFailed { collection: String, message: String },

    #[error("invalid vector dimension for collection '{collection}': expected {expected}, got {actual}")]
    InvalidDimension {
        collection: String,
        expected: usize,
        actual: usize,
    },
}
