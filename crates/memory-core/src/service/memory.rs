use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::RankingWeights;
use crate::domain::{join_tags, normalize_tags, Memory, MemoryType};
use crate::embedding::EmbeddingProvider;
use crate::error::{ServiceError, ServiceResult};
use crate::ranking::{compute_facets, rank_candidates, relevance_score, Candidate, Facets, Suggestion};
use crate::store::{MemoryFilter, RelationalStore};
use crate::vector::{with_lazy_collection, Metadata, VectorIndex, VectorRecord};
use crate::wiring::StripedLocks;

/// Over-fetch multiplier applied to the vector search limit to absorb
/// post-filter losses.
const OVER_FETCH_FACTOR: usize = 3;

/// Input to [`MemoryService::create`].
#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub project_id: String,
    pub session_id: Option<String>,
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    pub context: String,
    pub tags: Vec<String>,
}

/// Patch applied by [`MemoryService::update`]; `None` fields are left
/// unchanged. `project_id` and `memory_type` are immutable after
/// creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateMemoryInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub context: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A half-open time window filter for search.
#[derive(Debug, Clone, Default)]
pub struct TimeFilter {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl TimeFilter {
    fn matches(&self, created_at: DateTime<Utc>) -> bool {
        self.after.is_none_or(|after| created_at >= after)
            && self.before.is_none_or(|before| created_at <= before)
    }
}

/// Input to [`MemoryService::search`] / [`MemoryService::faceted_search`].
#[derive(Debug, Clone)]
pub struct SearchInput {
    pub query: String,
    pub project_id: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Vec<String>,
    pub limit: usize,
    pub threshold: f32,
    pub time_filter: Option<TimeFilter>,
    /// Excludes soft-deleted memories unless explicitly requested.
    pub include_archived: bool,
}

/// One search result: the hydrated memory and its similarity to the
/// query.
pub type SearchResult = Candidate;

/// Result of [`MemoryService::faceted_search`].
#[derive(Debug, Clone)]
pub struct FacetedSearchResult {
    pub results: Vec<SearchResult>,
    pub facets: Facets,
}

/// Administrative re-embed report.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub total: usize,
    pub processed: usize,
    pub generated: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

/// CRUD + hybrid search + re-embedding coordination over the dual index.
/// The hard part of the system: every write keeps the relational row and
/// the vector entry consistent per a fixed write-order protocol, and
/// every read blends structural filters with semantic similarity.
pub struct MemoryService {
    store: RelationalStore,
    embedding: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    collection: String,
    locks: Arc<StripedLocks>,
    ranking_weights: RankingWeights,
}

impl MemoryService {
    pub fn new(
        store: RelationalStore,
        embedding: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn VectorIndex>,
        collection: String,
        locks: Arc<StripedLocks>,
        ranking_weights: RankingWeights,
    ) -> Self {
        Self {
            store,
            embedding,
            vector_index,
            collection,
            locks,
            ranking_weights,
        }
    }

    fn build_metadata(memory: &Memory) -> Metadata {
        let mut metadata: Metadata = HashMap::new();
        metadata.insert("project_id".to_string(), memory.project_id.clone());
        metadata.insert("type".to_string(), memory.memory_type.as_str().to_string());
        metadata.insert("title".to_string(), memory.title.clone());
        metadata.insert("tags".to_string(), join_tags(&memory.tags));
        if let Some(session_id) = &memory.session_id {
            metadata.insert("session_id".to_string(), session_id.clone());
        }
        metadata.insert("created_at".to_string(), memory.created_at.to_rfc3339());
        metadata
    }

    async fn embed_and_index(&self, memory: &Memory) -> bool {
        let text = memory.embedding_text();
        let vector = match self.embedding.embed(&text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(memory_id = %memory.id, error = %e, "embedding failed, leaving has_embedding=false");
                return false;
            }
        };

        let record = VectorRecord {
            id: memory.id.clone(),
            vector,
            metadata: Self::build_metadata(memory),
        };

        let result = with_lazy_collection(
            self.vector_index.as_ref(),
            &self.collection,
            self.embedding.dimensions(),
            || {
                let record = record.clone();
                async { self.vector_index.store(&self.collection, record).await }
            },
        )
        .await;

        if let Err(e) = result {
            warn!(memory_id = %memory.id, error = %e, "vector index store failed, leaving has_embedding=false");
            return false;
        }
        true
    }

    async fn reembed_and_replace(&self, memory: &Memory) -> bool {
        let text = memory.embedding_text();
        let vector = match self.embedding.embed(&text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(memory_id = %memory.id, error = %e, "re-embedding failed, leaving has_embedding=false");
                return false;
            }
        };

        let record = VectorRecord {
            id: memory.id.clone(),
            vector,
            metadata: Self::build_metadata(memory),
        };

        let result = with_lazy_collection(
            self.vector_index.as_ref(),
            &self.collection,
            self.embedding.dimensions(),
            || {
                let record = record.clone();
                async { self.vector_index.update(&self.collection, record).await }
            },
        )
        .await;

        if let Err(e) = result {
            warn!(memory_id = %memory.id, error = %e, "vector index update failed, leaving has_embedding=false");
            return false;
        }
        true
    }

    #[instrument(skip(self, input), fields(project_id = %input.project_id, memory_type = %input.memory_type))]
    pub async fn create(&self, input: CreateMemoryInput) -> ServiceResult<Memory> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }
        if input.content.trim().is_empty() {
            return Err(ServiceError::Validation("content must not be empty".into()));
        }
        if self.store.get_project(&input.project_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "project '{}' does not exist",
                input.project_id
            )));
        }
        if let Some(session_id) = &input.session_id {
            if self.store.get_session(session_id).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "session '{session_id}' does not exist"
                )));
            }
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let _guard = self.locks.acquire(&id).await;

        let mut memory = Memory {
            id,
            project_id: input.project_id,
            session_id: input.session_id,
            memory_type: input.memory_type,
            title: input.title,
            content: input.content,
            context: input.context,
            tags: normalize_tags(input.tags),
            has_embedding: false,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };

        // Relational-first: the row exists even if embedding fails below.
        self.store.create_memory(&memory).await?;

        if self.embed_and_index(&memory).await {
            memory.has_embedding = true;
            self.store.set_has_embedding(&memory.id, true).await?;
        }

        info!(memory_id = %memory.id, has_embedding = memory.has_embedding, "memory created");
        Ok(memory)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Memory> {
        self.store
            .get_memory(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("memory '{id}' not found")))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: UpdateMemoryInput) -> ServiceResult<Memory> {
        let _guard = self.locks.acquire(id).await;

        let mut memory = self.get(id).await?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(ServiceError::Validation("title must not be empty".into()));
            }
            memory.title = title;
        }
        if let Some(content) = patch.content {
            if content.trim().is_empty() {
                return Err(ServiceError::Validation("content must not be empty".into()));
            }
            memory.content = content;
        }
        if let Some(context) = patch.context {
            memory.context = context;
        }
        if let Some(tags) = patch.tags {
            memory.tags = normalize_tags(tags);
        }
        memory.updated_at = Utc::now();

        self.store.update_memory(&memory).await?;

        memory.has_embedding = self.reembed_and_replace(&memory).await;
        self.store
            .set_has_embedding(&memory.id, memory.has_embedding)
            .await?;

        info!(memory_id = %memory.id, "memory updated");
        Ok(memory)
    }

    /// Index-first, then relational: if the index delete fails, the
    /// relational row is left intact and the error is surfaced, so an
    /// index entry never outlives its row.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let _guard = self.locks.acquire(id).await;

        let memory = self.get(id).await?;

        if memory.has_embedding {
            self.vector_index.delete(&self.collection, id).await?;
        }
        self.store.delete_memory(&memory.id).await?;
        info!(memory_id = %id, "memory deleted");
        Ok(())
    }

    pub async fn archive(&self, id: &str) -> ServiceResult<Memory> {
        let _guard = self.locks.acquire(id).await;
        let mut memory = self.get(id).await?;
        memory.archived_at = Some(Utc::now());
        self.store.set_archived(id, memory.archived_at).await?;
        Ok(memory)
    }

    pub async fn unarchive(&self, id: &str) -> ServiceResult<Memory> {
        let _guard = self.locks.acquire(id).await;
        let mut memory = self.get(id).await?;
        memory.archived_at = None;
        self.store.set_archived(id, None).await?;
        Ok(memory)
    }

    pub async fn list(&self, filter: MemoryFilter) -> ServiceResult<Vec<Memory>> {
        Ok(self.store.list_memories(&filter).await?)
    }

    /// Hybrid search: embed the query, over-fetch
    /// from the vector index, hydrate from the relational store, then
    /// post-filter and rank. An empty query or a zero limit never calls
    /// the index.
    #[instrument(skip(self, input), fields(project_id = ?input.project_id, limit = input.limit))]
    pub async fn search(&self, input: SearchInput) -> ServiceResult<Vec<SearchResult>> {
        if input.query.trim().is_empty() || input.limit == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.fetch_candidates(&input).await?;
        let mut ranked = rank_candidates(candidates);
        ranked.truncate(input.limit);
        Ok(ranked)
    }

    /// Same pipeline as [`Self::search`], additionally producing facet
    /// counts over the post-filtered, untruncated result set.
    #[instrument(skip(self, input))]
    pub async fn faceted_search(&self, input: SearchInput) -> ServiceResult<FacetedSearchResult> {
        if input.query.trim().is_empty() || input.limit == 0 {
            return Ok(FacetedSearchResult {
                results: Vec::new(),
                facets: Facets::default(),
            });
        }

        let candidates = self.fetch_candidates(&input).await?;
        let facets = compute_facets(&candidates, Utc::now());
        let mut ranked = rank_candidates(candidates);
        ranked.truncate(input.limit);
        Ok(FacetedSearchResult {
            results: ranked,
            facets,
        })
    }

    /// The blended-relevance variant of search: ranks by `relevance` rather than raw similarity.
    #[instrument(skip(self, input))]
    pub async fn search_with_relevance(&self, input: SearchInput) -> ServiceResult<Vec<SearchResult>> {
        if input.query.trim().is_empty() || input.limit == 0 {
            return Ok(Vec::new());
        }

        let query_tags = input.tags.clone();
        let query = input.query.clone();
        let limit = input.limit;
        let now = Utc::now();
        let weights = self.ranking_weights;

        let candidates = self.fetch_candidates(&input).await?;
        let mut scored: Vec<(f64, Candidate)> = candidates
            .into_iter()
            .map(|c| (relevance_score(&c, &query, &query_tags, now, &weights), c))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.memory.created_at.cmp(&a.1.memory.created_at))
                .then_with(|| a.1.memory.id.cmp(&b.1.memory.id))
        });
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    /// Uses the stored item's own embedding as the query vector,
    /// excluding itself from the result set.
    #[instrument(skip(self))]
    pub async fn find_similar(&self, id: &str, limit: usize) -> ServiceResult<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let memory = self.get(id).await?;
        if !memory.has_embedding {
            return Ok(Vec::new());
        }

        let text = memory.embedding_text();
        let vector = self.embedding.embed(&text).await?;

        let hits = self
            .vector_index
            .search(&self.collection, &vector, (limit + 1) * OVER_FETCH_FACTOR, 0.0)
            .await?;
        let ids: Vec<String> = hits
            .iter()
            .map(|h| h.id.clone())
            .filter(|hit_id| hit_id != id)
            .collect();
        let hydrated = self.store.get_memories_by_ids(&ids).await?;

        let similarity_by_id: HashMap<&str, f32> =
            hits.iter().map(|h| (h.id.as_str(), h.similarity)).collect();
        let candidates: Vec<Candidate> = hydrated
            .into_iter()
            .map(|memory| {
                let similarity = similarity_by_id.get(memory.id.as_str()).copied().unwrap_or(0.0);
                Candidate { memory, similarity }
            })
            .collect();

        let mut ranked = rank_candidates(candidates);
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Regenerates missing or stale embeddings and reconciles the index.
    /// Administrative: scoped by `project_id` if given, otherwise
    /// process-wide.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, project_id: Option<&str>) -> ServiceResult<CleanupReport> {
        let filter = MemoryFilter {
            project_id: project_id.map(String::from),
            include_archived: true,
            ..Default::default()
        };
        let memories = self.store.list_memories(&filter).await?;

        let mut report = CleanupReport {
            total: memories.len(),
            ..Default::default()
        };

        for memory in memories {
            report.processed += 1;
            let _guard = self.locks.acquire(&memory.id).await;

            let succeeded = if memory.has_embedding {
                self.reembed_and_replace(&memory).await
            } else {
                self.embed_and_index(&memory).await
            };

            if succeeded {
                self.store.set_has_embedding(&memory.id, true).await?;
                report.generated += 1;
            } else {
                report.errors += 1;
                report
                    .error_messages
                    .push(format!("failed to (re-)embed memory '{}'", memory.id));
            }
        }

        info!(
            total = report.total,
            generated = report.generated,
            errors = report.errors,
            "cleanup complete"
        );
        Ok(report)
    }

    /// Suggestions built from the tag vocabulary and memory titles in
    /// scope, ranked by prefix match then frequency.
    pub async fn suggest(
        &self,
        project_id: Option<&str>,
        partial: &str,
        limit: usize,
    ) -> ServiceResult<Vec<Suggestion>> {
        let filter = MemoryFilter {
            project_id: project_id.map(String::from),
            ..Default::default()
        };
        let memories = self.store.list_memories(&filter).await?;

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        for memory in &memories {
            *vocabulary.entry(memory.title.clone()).or_insert(0) += 1;
            for tag in &memory.tags {
                *vocabulary.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        Ok(crate::ranking::suggest(partial, &vocabulary, limit))
    }

    async fn fetch_candidates(&self, input: &SearchInput) -> ServiceResult<Vec<Candidate>> {
        let query_vector = self.embedding.embed(&input.query).await?;
        let over_fetch_limit = input.limit.saturating_mul(OVER_FETCH_FACTOR).max(input.limit);
        let hits = self
            .vector_index
            .search(&self.collection, &query_vector, over_fetch_limit, input.threshold)
            .await?;

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let hydrated = self.store.get_memories_by_ids(&ids).await?;
        let by_id: HashMap<&str, &Memory> = hydrated.iter().map(|m| (m.id.as_str(), m)).collect();

        let candidates: Vec<Candidate> = hits
            .into_iter()
            .filter_map(|hit| by_id.get(hit.id.as_str()).map(|m| (hit, (*m).clone())))
            .filter(|(_, memory)| {
                input
                    .project_id
                    .as_ref()
                    .is_none_or(|p| &memory.project_id == p)
            })
            .filter(|(_, memory)| {
                input
                    .memory_type
                    .as_ref()
                    .is_none_or(|t| &memory.memory_type == t)
            })
            .filter(|(_, memory)| {
                input
                    .tags
                    .iter()
                    .all(|tag| memory.tags.contains(tag))
            })
            .filter(|(_, memory)| memory.archived_at.is_none() || input.include_archived)
            .filter(|(_, memory)| {
                input
                    .time_filter
                    .as_ref()
                    .is_none_or(|tf| tf.matches(memory.created_at))
            })
            .map(|(hit, memory)| Candidate {
                memory,
                similarity: hit.similarity,
            })
            .collect();

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;
    use crate::embedding::MockEmbeddingProvider;
    use crate::vector::MockVectorIndex;
    use sqlx::sqlite::SqlitePoolOptions;

    const DIM: usize = 16;

    async fn service() -> (MemoryService, Project) {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = RelationalStore::from_pool(pool).await.unwrap();

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: "demo".into(),
            path: format!("/tmp/{}", Uuid::new_v4()),
            description: None,
            language: None,
            framework: None,
            created_at: now,
            updated_at: now,
        };
        store.create_project(&project).await.unwrap();

        let embedding: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(DIM));
        let vector_index: Arc<dyn VectorIndex> = Arc::new(MockVectorIndex::new());
        vector_index.create_collection("test", DIM).await.unwrap();

        let service = MemoryService::new(
            store,
            embedding,
            vector_index,
            "test".to_string(),
            Arc::new(StripedLocks::new()),
            RankingWeights::default(),
        );
        (service, project)
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let (service, project) = service().await;
        let memory = service
            .create(CreateMemoryInput {
                project_id: project.id.clone(),
                session_id: None,
                memory_type: MemoryType::Decision,
                title: "Use JWT".into(),
                content: "Adopt JWT for auth".into(),
                context: "".into(),
                tags: vec!["auth".into(), "security".into()],
            })
            .await
            .unwrap();

        assert!(memory.has_embedding);
        let fetched = service.get(&memory.id).await.unwrap();
        assert_eq!(fetched.title, "Use JWT");
        assert_eq!(fetched.tags, vec!["auth".to_string(), "security".to_string()]);
    }

    #[tokio::test]
    async fn create_rejects_unknown_project() {
        let (service, _project) = service().await;
        let result = service
            .create(CreateMemoryInput {
                project_id: "does-not-exist".into(),
                session_id: None,
                memory_type: MemoryType::Decision,
                title: "t".into(),
                content: "c".into(),
                context: "".into(),
                tags: vec![],
            })
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_and_search_finds_itself_first() {
        let (service, project) = service().await;
        let memory = service
            .create(CreateMemoryInput {
                project_id: project.id.clone(),
                session_id: None,
                memory_type: MemoryType::Decision,
                title: "Use JWT".into(),
                content: "Adopt JWT for auth".into(),
                context: "".into(),
                tags: vec!["auth".into(), "security".into()],
            })
            .await
            .unwrap();

        let results = service
            .search(SearchInput {
                query: "Use JWT".into(),
                project_id: Some(project.id.clone()),
                memory_type: None,
                tags: vec![],
                limit: 5,
                threshold: 0.0,
                time_filter: None,
                include_archived: false,
            })
            .await
            .unwrap();

        assert_eq!(results.first().map(|r| r.memory.id.clone()), Some(memory.id));
    }

    #[tokio::test]
    async fn empty_query_returns_empty_without_calling_index() {
        let (service, project) = service().await;
        let results = service
            .search(SearchInput {
                query: "".into(),
                project_id: Some(project.id),
                memory_type: None,
                tags: vec![],
                limit: 5,
                threshold: 0.0,
                time_filter: None,
                include_archived: false,
            })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_returns_empty() {
        let (service, project) = service().await;
        service
            .create(CreateMemoryInput {
                project_id: project.id.clone(),
                session_id: None,
                memory_type: MemoryType::Decision,
                title: "Use JWT".into(),
                content: "Adopt JWT for auth".into(),
                context: "".into(),
                tags: vec![],
            })
            .await
            .unwrap();

        let results = service
            .search(SearchInput {
                query: "JWT".into(),
                project_id: Some(project.id),
                memory_type: None,
                tags: vec![],
                limit: 0,
                threshold: 0.0,
                time_filter: None,
                include_archived: false,
            })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn delete_then_get_returns_not_found() {
        let (service, project) = service().await;
        let memory = service
            .create(CreateMemoryInput {
                project_id: project.id,
                session_id: None,
                memory_type: MemoryType::Pattern,
                title: "t".into(),
                content: "c".into(),
                context: "".into(),
                tags: vec![],
            })
            .await
            .unwrap();

        service.delete(&memory.id).await.unwrap();
        let result = service.get(&memory.id).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_bumps_updated_at_and_preserves_other_fields() {
        let (service, project) = service().await;
        let memory = service
            .create(CreateMemoryInput {
                project_id: project.id,
                session_id: None,
                memory_type: MemoryType::Pattern,
                title: "t".into(),
                content: "c".into(),
                context: "".into(),
                tags: vec![],
            })
            .await
            .unwrap();

        let updated = service
            .update(
                &memory.id,
                UpdateMemoryInput {
                    title: Some("t2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "t2");
        assert_eq!(updated.content, memory.content);
        assert!(updated.updated_at >= memory.updated_at);
    }
}
