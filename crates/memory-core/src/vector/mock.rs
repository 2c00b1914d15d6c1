use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::error::VectorIndexError;
use super::{cosine_similarity, Metadata, SearchHit, VectorIndex, VectorRecord};

#[derive(Clone)]
struct StoredPoint {
    vector: Vec<f32>,
    metadata: Metadata,
}

#[derive(Default)]
struct Collection {
    dimensions: usize,
    points: HashMap<String, StoredPoint>,
}

/// In-process vector index, bound as the startup fallback when the
/// remote probe fails. Backed by an `RwLock<HashMap<...>>` per
/// collection, with a `cosine_similarity`-then-sort-desc search shape.
#[derive(Default)]
pub struct MockVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(collection: &str, message: &str) -> VectorIndexError {
        VectorIndexError::UpsertFailed {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
    ) -> Result<(), VectorIndexError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::poisoned(name, "lock poisoned"))?;
        collections.entry(name.to_string()).or_insert(Collection {
            dimensions,
            points: HashMap::new(),
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorIndexError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::poisoned(name, "lock poisoned"))?;
        collections.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorIndexError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::poisoned("<any>", "lock poisoned"))?;
        Ok(collections.keys().cloned().collect())
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, VectorIndexError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::poisoned(name, "lock poisoned"))?;
        Ok(collections.get(name).map(|c| c.dimensions))
    }

    async fn store(&self, collection: &str, record: VectorRecord) -> Result<(), VectorIndexError> {
        self.batch_store(collection, vec![record]).await
    }

    async fn update(&self, collection: &str, record: VectorRecord) -> Result<(), VectorIndexError> {
        self.batch_store(collection, vec![record]).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), VectorIndexError> {
        self.batch_delete(collection, std::slice::from_ref(&id.to_string()))
            .await
    }

    async fn batch_store(
        &self,
        collection: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorIndexError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::poisoned(collection, "lock poisoned"))?;

        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| VectorIndexError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        for record in &records {
            if record.vector.len() != coll.dimensions {
                return Err(VectorIndexError::InvalidDimension {
                    collection: collection.to_string(),
                    expected: coll.dimensions,
                    actual: record.vector.len(),
                });
            }
        }

        for record in records {
            coll.points.insert(
                record.id.clone(),
                StoredPoint {
                    vector: record.vector,
                    metadata: record.metadata,
                },
            );
        }

        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorIndexError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Self::poisoned(collection, "lock poisoned"))?;

        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| VectorIndexError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        for id in ids {
            coll.points.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Self::poisoned(collection, "lock poisoned"))?;

        let coll = collections
            .get(collection)
            .ok_or_else(|| VectorIndexError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        let mut hits: Vec<SearchHit> = coll
            .points
            .iter()
            .map(|(id, point)| SearchHit {
                id: id.clone(),
                similarity: cosine_similarity(vector, &point.vector),
                metadata: point.metadata.clone(),
            })
            .filter(|hit| hit.similarity >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn health_probe(&self) -> Result<(), VectorIndexError> {
        Ok(())
    }
}
