use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetCollectionInfoRequest, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    Value as QdrantValue,
};
use qdrant_client::Qdrant;
use tracing::instrument;

use super::error::VectorIndexError;
use super::{Metadata, SearchHit, VectorIndex, VectorRecord};

/// Wraps `qdrant_client::Qdrant`, using a flat string-keyed metadata map
/// and string (UUID) point ids.
pub struct QdrantVectorIndex {
    client: Qdrant,
    url: String,
}

impl QdrantVectorIndex {
    pub fn new(url: &str) -> Result<Self, VectorIndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorIndexError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn payload_from_metadata(metadata: &Metadata) -> HashMap<String, QdrantValue> {
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), QdrantValue::from(v.clone())))
            .collect()
    }

    fn metadata_from_payload(payload: HashMap<String, QdrantValue>) -> Metadata {
        payload
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect()
    }

    /// Qdrant reports a missing collection as a plain gRPC status rather
    /// than a distinct error variant; recognize it by message so
    /// `with_lazy_collection` can tell it apart from other upsert/search
    /// failures and apply the create-and-retry-once policy.
    fn looks_like_missing_collection(message: &str) -> bool {
        let lower = message.to_ascii_lowercase();
        lower.contains("doesn't exist") || lower.contains("not found")
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    #[instrument(skip(self))]
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
    ) -> Result<(), VectorIndexError> {
        let vectors_config = VectorParamsBuilder::new(dimensions as u64, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(vectors_config)
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorIndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorIndexError> {
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| VectorIndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorIndexError> {
        let response = self.client.list_collections().await.map_err(|e| {
            VectorIndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, VectorIndexError> {
        let exists = self.client.collection_exists(name).await.map_err(|e| {
            VectorIndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            }
        })?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: name.to_string(),
            })
            .await
            .map_err(|e| VectorIndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let dims = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                qdrant_client::qdrant::vectors_config::Config::Params(params) => {
                    Some(params.size as usize)
                }
                _ => None,
            });
        Ok(dims)
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

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn batch_store(
        &self,
        collection: &str,
        records: Vec<VectorRecord>,
    ) -> Result<(), VectorIndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                PointStruct::new(
                    record.id,
                    record.vector,
                    Self::payload_from_metadata(&record.metadata),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| {
                let message = e.to_string();
                if Self::looks_like_missing_collection(&message) {
                    VectorIndexError::CollectionNotFound {
                        collection: collection.to_string(),
                    }
                } else {
                    VectorIndexError::UpsertFailed {
                        collection: collection.to_string(),
                        message,
                    }
                }
            })?;
        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorIndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let selector = PointsIdsList {
            ids: ids.iter().cloned().map(|id| id.into()).collect(),
        };
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(selector)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorIndexError::DeleteFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let search = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .with_payload(true)
                    .score_threshold(threshold),
            )
            .await
            .map_err(|e| {
                let message = e.to_string();
                if Self::looks_like_missing_collection(&message) {
                    VectorIndexError::CollectionNotFound {
                        collection: collection.to_string(),
                    }
                } else {
                    VectorIndexError::SearchFailed {
                        collection: collection.to_string(),
                        message,
                    }
                }
            })?;

        Ok(search
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: match point.id.and_then(|id| id.point_id_options) {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid,
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => {
                        num.to_string()
                    }
                    None => String::new(),
                },
                similarity: point.score,
                metadata: Self::metadata_from_payload(point.payload),
            })
            .collect())
    }

    async fn health_probe(&self) -> Result<(), VectorIndexError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorIndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}
