//! Vector Index: store/update/delete/search `{id, vector,
//! metadata}` against a single collection per process instance.

mod error;
mod lazy;
mod mock;
mod qdrant;

pub use error::VectorIndexError;
pub use lazy::with_lazy_collection;
pub use mock::MockVectorIndex;
pub use qdrant::QdrantVectorIndex;

use std::collections::HashMap;

use async_trait::async_trait;

/// Metadata is a flat key→scalar map: the caller normalizes
/// sequences to comma-joined strings and timestamps to RFC3339 before
/// handing off; the index never re-encodes.
pub type Metadata = HashMap<String, String>;

/// One point to write to the index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// One candidate returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub similarity: f32,
    pub metadata: Metadata,
}

/// Store/delete/update/search `{id, vector, metadata}` against a single
/// named collection, with collection lifecycle management.
///
/// Implementations do not need to handle "collection not found" on
/// mutation themselves — [`with_lazy_collection`] wraps any
/// implementation with the create-and-retry-once policy
/// requires, so the policy is written once rather than duplicated per
/// backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), VectorIndexError>;
    async fn delete_collection(&self, name: &str) -> Result<(), VectorIndexError>;
    async fn list_collections(&self) -> Result<Vec<String>, VectorIndexError>;
    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, VectorIndexError>;

    async fn store(&self, collection: &str, record: VectorRecord) -> Result<(), VectorIndexError>;
    async fn update(&self, collection: &str, record: VectorRecord) -> Result<(), VectorIndexError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), VectorIndexError>;

    /// All-or-nothing from the caller's perspective: on error, no item in
    /// `records` is considered durably indexed.
    async fn batch_store(
        &self,
        collection: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorIndexError>;
    async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorIndexError>;

    /// Returns candidates ordered by descending similarity, filtered to
    /// `similarity >= threshold`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorIndexError>;

    async fn health_probe(&self) -> Result<(), VectorIndexError>;
}

/// Cosine similarity in `[-1, 1]`; `0.0` for degenerate (zero-length or
/// zero-norm) inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
