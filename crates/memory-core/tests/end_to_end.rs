//! End-to-end scenarios spanning the Project/Memory/Session/Task
//! services together against the in-memory mock backends, pinning the
//! literal scenarios the dual-store design is meant to satisfy.

use std::sync::Arc;

use memory_core::config::RankingWeights;
use memory_core::domain::{MemoryType, TaskPriority, TaskStatus};
use memory_core::embedding::{EmbeddingProvider, MockEmbeddingProvider};
use memory_core::error::ServiceError;
use memory_core::service::{
    CreateMemoryInput, CreateProjectInput, CreateTaskInput, MemoryService, ProjectService,
    SearchInput, SessionService, TaskService, UpdateTaskInput,
};
use memory_core::store::RelationalStore;
use memory_core::vector::{MockVectorIndex, VectorIndex};
use memory_core::wiring::StripedLocks;
use sqlx::sqlite::SqlitePoolOptions;

const DIM: usize = 16;

async fn fresh_store() -> RelationalStore {
    let pool = SqlitePoolOptions::new()
        .connect("sqlite::memory:")
        .await
        .unwrap();
    RelationalStore::from_pool(pool).await.unwrap()
}

async fn memory_service(store: RelationalStore, dim: usize, collection: &str) -> MemoryService {
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(dim));
    let vector_index: Arc<dyn VectorIndex> = Arc::new(MockVectorIndex::new());
    vector_index.create_collection(collection, dim).await.unwrap();
    MemoryService::new(
        store,
        embedding,
        vector_index,
        collection.to_string(),
        Arc::new(StripedLocks::new()),
        RankingWeights::default(),
    )
}

/// Scenario 1: create a decision memory, then semantic search for it
/// by a related but non-identical query returns it first.
#[tokio::test]
async fn create_then_semantic_search_finds_the_memory_first() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p", Default::default())
        .await
        .unwrap();
    let memory = memory_service(store, DIM, "scenario1").await;

    let created = memory
        .create(CreateMemoryInput {
            project_id: project.id.clone(),
            session_id: None,
            memory_type: MemoryType::Decision,
            title: "Use JWT".to_string(),
            content: "Adopt JWT for auth".to_string(),
            context: String::new(),
            tags: vec!["auth".to_string(), "security".to_string()],
        })
        .await
        .unwrap();
    assert!(created.has_embedding);

    let results = memory
        .search(SearchInput {
            query: "authentication".to_string(),
            project_id: Some(project.id.clone()),
            memory_type: None,
            tags: Vec::new(),
            limit: 5,
            threshold: 0.0,
            time_filter: None,
            include_archived: false,
        })
        .await
        .unwrap();

    assert_eq!(results.first().unwrap().memory.id, created.id);
}

/// Scenario 2 (fallback mock): the mock embedding provider stands in for
/// an unreachable remote endpoint. Creation still succeeds with
/// `hasEmbedding = true`, and searching on the memory's own literal
/// content returns it first.
#[tokio::test]
async fn create_succeeds_against_mock_fallback_and_search_finds_it() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p2", Default::default())
        .await
        .unwrap();
    let memory = memory_service(store, DIM, "scenario2").await;

    let created = memory
        .create(CreateMemoryInput {
            project_id: project.id.clone(),
            session_id: None,
            memory_type: MemoryType::Pattern,
            title: "Retry with backoff".to_string(),
            content: "Exponential backoff for transient failures".to_string(),
            context: String::new(),
            tags: vec![],
        })
        .await
        .unwrap();
    assert!(created.has_embedding);

    let results = memory
        .search(SearchInput {
            query: "Exponential backoff for transient failures".to_string(),
            project_id: Some(project.id.clone()),
            memory_type: None,
            tags: Vec::new(),
            limit: 5,
            threshold: 0.0,
            time_filter: None,
            include_archived: false,
        })
        .await
        .unwrap();

    assert_eq!(results.first().unwrap().memory.id, created.id);
}

/// Scenario 3: at most one active session per project; completing the
/// active one unblocks starting a new one.
#[tokio::test]
async fn single_active_session_invariant() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p3", Default::default())
        .await
        .unwrap();
    let session = SessionService::new(store, Arc::new(StripedLocks::new()));

    let a = session
        .start_session(&project.id, "A".to_string(), vec![])
        .await
        .unwrap();

    let conflict = session.start_session(&project.id, "B".to_string(), vec![]).await;
    assert!(matches!(conflict, Err(ServiceError::Conflict(_))));

    session
        .complete_session(&a.id, Some("done".to_string()), None)
        .await
        .unwrap();

    let b = session.start_session(&project.id, "B".to_string(), vec![]).await;
    assert!(b.is_ok());
}

/// Scenario 4: cleanup regenerates embeddings against a differently
/// dimensioned provider/collection and search works against the new one.
#[tokio::test]
async fn cleanup_reembeds_into_a_new_dimensioned_collection() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p4", Default::default())
        .await
        .unwrap();
    let old_memory = memory_service(store.clone(), 8, "old-collection").await;

    for i in 0..3 {
        old_memory
            .create(CreateMemoryInput {
                project_id: project.id.clone(),
                session_id: None,
                memory_type: MemoryType::Documentation,
                title: format!("doc {i}"),
                content: format!("content body {i}"),
                context: String::new(),
                tags: vec![],
            })
            .await
            .unwrap();
    }

    let new_memory = memory_service(store, 32, "new-collection").await;
    let report = new_memory.cleanup(Some(&project.id)).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.generated, 3);
    assert_eq!(report.errors, 0);

    let results = new_memory
        .search(SearchInput {
            query: "content body 1".to_string(),
            project_id: Some(project.id.clone()),
            memory_type: None,
            tags: Vec::new(),
            limit: 5,
            threshold: 0.0,
            time_filter: None,
            include_archived: false,
        })
        .await
        .unwrap();
    assert!(!results.is_empty());
}

/// Scenario 5: task statistics over a mix of statuses and priorities.
#[tokio::test]
async fn task_statistics_match_the_created_mix() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p5", Default::default())
        .await
        .unwrap();
    let memory = Arc::new(memory_service(store, DIM, "scenario5").await);
    let task_service = TaskService::new(memory.clone());

    let specs = [
        (TaskStatus::Done, TaskPriority::High),
        (TaskStatus::InProgress, TaskPriority::Medium),
        (TaskStatus::Todo, TaskPriority::Low),
        (TaskStatus::Blocked, TaskPriority::Urgent),
    ];

    for (status, priority) in specs {
        let task = task_service
            .create(CreateTaskInput {
                project_id: project.id.clone(),
                title: format!("{:?}", status),
                description: "task body".to_string(),
                tags: vec![],
                priority,
                assignee: None,
                due_date: None,
                estimated_hours: None,
            })
            .await
            .unwrap();
        task_service
            .update(
                &task.id,
                UpdateTaskInput {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let stats = task_service.statistics(&project.id).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.todo, 1);
    assert_eq!(stats.blocked, 1);

    let completion_rate = (stats.done as f64 / stats.total as f64) * 100.0;
    assert!((completion_rate - 25.0).abs() < 1e-9);
}

/// Scenario 6: a failed index delete must not delete the relational row.
#[tokio::test]
async fn delete_ordering_preserves_the_row_when_index_delete_fails() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p6", Default::default())
        .await
        .unwrap();
    let vector_index: Arc<dyn VectorIndex> = Arc::new(MockVectorIndex::new());
    vector_index.create_collection("scenario6", DIM).await.unwrap();
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(DIM));
    let memory = MemoryService::new(
        store,
        embedding,
        vector_index.clone(),
        "scenario6".to_string(),
        Arc::new(StripedLocks::new()),
        RankingWeights::default(),
    );

    let created = memory
        .create(CreateMemoryInput {
            project_id: project.id.clone(),
            session_id: None,
            memory_type: MemoryType::Code,
            title: "snippet".to_string(),
            content: "fn main() {}".to_string(),
            context: String::new(),
            tags: vec![],
        })
        .await
        .unwrap();
    assert!(created.has_embedding);

    // Drop the collection out from under the index to force the
    // index-delete step to fail.
    vector_index.delete_collection("scenario6").await.unwrap();

    let result = memory.delete(&created.id).await;
    assert!(result.is_err());

    // The relational row must still be present: index-first-on-delete
    // means a failed index delete never touches the row.
    let still_there = memory.get(&created.id).await;
    assert!(still_there.is_ok());
}

/// Boundary: empty query returns empty results without reaching the index.
#[tokio::test]
async fn empty_query_returns_empty_without_calling_the_index() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p7", Default::default())
        .await
        .unwrap();
    let memory = memory_service(store, DIM, "scenario7").await;

    let results = memory
        .search(SearchInput {
            query: String::new(),
            project_id: Some(project.id.clone()),
            memory_type: None,
            tags: Vec::new(),
            limit: 5,
            threshold: 0.0,
            time_filter: None,
            include_archived: false,
        })
        .await
        .unwrap();
    assert!(results.is_empty());
}

/// Boundary: limit 0 returns an empty list.
#[tokio::test]
async fn zero_limit_returns_empty_list() {
    let store = fresh_store().await;
    let project = ProjectService::new(store.clone())
        .initialize("/tmp/p8", Default::default())
        .await
        .unwrap();
    let memory = memory_service(store, DIM, "scenario8").await;

    memory
        .create(CreateMemoryInput {
            project_id: project.id.clone(),
            session_id: None,
            memory_type: MemoryType::Decision,
            title: "x".to_string(),
            content: "y".to_string(),
            context: String::new(),
            tags: vec![],
        })
        .await
        .unwrap();

    let results = memory
        .search(SearchInput {
            query: "y".to_string(),
            project_id: Some(project.id.clone()),
            memory_type: None,
            tags: Vec::new(),
            limit: 0,
            threshold: 0.0,
            time_filter: None,
            include_archived: false,
        })
        .await
        .unwrap();
    assert!(results.is_empty());
}
