//! Dependency wiring & startup.
//!
//! Resolves the process-wide, immutable-after-start bindings: the
//! embedding provider and vector index (probed once, falling back to
//! mocks on failure — no live re-probing), the relational connection
//! pool, and the striped per-id lock table.

mod locks;

pub use locks::StripedLocks;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, MockEmbeddingProvider, RemoteEmbeddingProvider};
use crate::error::StartupError;
use crate::service::{MemoryService, ProjectService, SessionService, TaskService};
use crate::store::RelationalStore;
use crate::vector::{MockVectorIndex, QdrantVectorIndex, VectorIndex};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// The resolved bindings a running process shares across every request.
/// Built once by [`Dependencies::bootstrap`] and handed to the service
/// layer behind `Arc`s.
pub struct Dependencies {
    pub store: RelationalStore,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub collection: String,
    pub dimension: usize,
    pub locks: Arc<StripedLocks>,
    pub ranking_weights: crate::config::RankingWeights,
}

impl Dependencies {
    /// Startup sequence:
    ///
    /// 1. Open and migrate the relational store — fatal on failure.
    /// 2. Probe the embedding endpoint with a 2s deadline; on failure,
    ///    log a warning and bind the deterministic mock for the
    ///    lifetime of the process.
    /// 3. Probe the vector index the same way.
    /// 4. If the vector index is live and the collection already
    ///    exists, refuse to start if its dimension disagrees with the
    ///    configured one.
    pub async fn bootstrap(config: &Config) -> Result<Self, StartupError> {
        let store = RelationalStore::connect(&config.db_path).await?;

        let embedding: Arc<dyn EmbeddingProvider> = match probe_embedding(config).await {
            Ok(provider) => provider,
            Err(reason) => {
                warn!(reason = %reason, "embedding provider unreachable at startup, falling back to mock");
                Arc::new(MockEmbeddingProvider::new(config.embedding_dimension))
            }
        };

        let vector_index: Arc<dyn VectorIndex> = match probe_vector_index(config).await {
            Ok(index) => index,
            Err(reason) => {
                warn!(reason = %reason, "vector index unreachable at startup, falling back to mock");
                Arc::new(MockVectorIndex::new())
            }
        };

        if let Some(existing) = vector_index
            .collection_dimensions(&config.chromadb_collection)
            .await
            .unwrap_or(None)
        {
            if existing != config.embedding_dimension {
                return Err(StartupError::DimensionMismatch {
                    expected: existing,
                    actual: config.embedding_dimension,
                });
            }
        }

        info!(
            model = embedding.model_name(),
            dimension = config.embedding_dimension,
            collection = %config.chromadb_collection,
            "dependencies resolved"
        );

        Ok(Self {
            store,
            embedding,
            vector_index,
            collection: config.chromadb_collection.clone(),
            dimension: config.embedding_dimension,
            locks: Arc::new(StripedLocks::new()),
            ranking_weights: config.ranking_weights,
        })
    }

    /// Constructs the four public services over these bindings.
    pub fn into_services(self) -> Services {
        let memory = Arc::new(MemoryService::new(
            self.store.clone(),
            self.embedding,
            self.vector_index,
            self.collection,
            self.locks.clone(),
            self.ranking_weights,
        ));
        let project = ProjectService::new(self.store.clone());
        let session = SessionService::new(self.store, self.locks);
        let task = TaskService::new(memory.clone());

        Services {
            memory,
            project,
            session,
            task,
        }
    }
}

/// The service layer handed to the transport (JSON-RPC/CLI).
pub struct Services {
    pub memory: Arc<MemoryService>,
    pub project: ProjectService,
    pub session: SessionService,
    pub task: TaskService,
}

async fn probe_embedding(config: &Config) -> Result<Arc<dyn EmbeddingProvider>, String> {
    let provider = RemoteEmbeddingProvider::new(
        config.ollama_base_url.clone(),
        config.ollama_model.clone(),
        config.embedding_dimension,
    );
    match tokio::time::timeout(HEALTH_PROBE_TIMEOUT, provider.health_probe()).await {
        Ok(Ok(())) => Ok(Arc::new(provider)),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("health probe timed out".to_string()),
    }
}

async fn probe_vector_index(config: &Config) -> Result<Arc<dyn VectorIndex>, String> {
    let index = QdrantVectorIndex::new(&config.chromadb_base_url).map_err(|e| e.to_string())?;
    match tokio::time::timeout(HEALTH_PROBE_TIMEOUT, index.health_probe()).await {
        Ok(Ok(())) => Ok(Arc::new(index)),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("health probe timed out".to_string()),
    }
}
