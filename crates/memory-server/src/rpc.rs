//! Newline-delimited JSON-RPC 2.0 over stdio.
//!
//! One request per line on stdin, one response per line on stdout.
//! stdout is reserved for RPC traffic — all logging goes to stderr via
//! `tracing`. No external MCP SDK: the wire format is an external
//! collaborator as far as `memory-core` is concerned, so the protocol
//! machinery lives entirely in this crate.

use memory_core::domain::MemoryType;
use memory_core::error::ServiceError;
use memory_core::service::{
    CreateMemoryInput, CreateProjectInput, CreateTaskInput, InitializeProjectInput,
    LogProgressInput, SearchInput, TimeFilter, UpdateMemoryInput, UpdateProjectInput,
    UpdateTaskInput,
};
use memory_core::store::{MemoryFilter, SessionFilter};
use memory_core::wiring::Services;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, instrument, warn};

use crate::dto::{
    parse_memory_type, parse_progress_type, parse_session_status, parse_task_priority,
    parse_task_status, CleanupReportDto, FacetedSearchResultDto, MemoryDto, ProjectDto,
    SearchResultDto, SessionDto, SuggestionDto, TaskDto, TaskStatisticsDto,
};

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<&ServiceError> for RpcErrorBody {
    fn from(e: &ServiceError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            details: None,
        }
    }
}

/// Runs the JSON-RPC loop until stdin closes. One request per line.
pub async fn serve_stdio(services: Services) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&services, line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn handle_line(services: &Services, line: &str) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to parse request line");
            return RpcResponse {
                jsonrpc: JSONRPC_VERSION,
                result: None,
                error: Some(RpcErrorBody {
                    code: "VALIDATION".to_string(),
                    message: format!("invalid JSON-RPC request: {e}"),
                    details: None,
                }),
                id: Value::Null,
            };
        }
    };

    match dispatch(services, &request.method, request.params).await {
        Ok(result) => RpcResponse {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id: request.id,
        },
        Err(e) => {
            error!(method = %request.method, error = %e, "request failed");
            RpcResponse {
                jsonrpc: JSONRPC_VERSION,
                result: None,
                error: Some(RpcErrorBody::from(&e)),
                id: request.id,
            }
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ServiceError> {
    serde_json::from_value(params).map_err(|e| ServiceError::Validation(e.to_string()))
}

fn memory_type_or_validation(s: &str) -> Result<MemoryType, ServiceError> {
    parse_memory_type(s).ok_or_else(|| ServiceError::Validation(format!("unknown memory type '{s}'")))
}

#[instrument(skip(services, params))]
async fn dispatch(services: &Services, method: &str, params: Value) -> Result<Value, ServiceError> {
    match method {
        "memory.create" => {
            let p: MemoryCreateParams = parse_params(params)?;
            let memory = services
                .memory
                .create(CreateMemoryInput {
                    project_id: p.project_id,
                    session_id: p.session_id,
                    memory_type: memory_type_or_validation(&p.memory_type)?,
                    title: p.title,
                    content: p.content,
                    context: p.context.unwrap_or_default(),
                    tags: p.tags.unwrap_or_default(),
                })
                .await?;
            Ok(serde_json::to_value(MemoryDto::from(memory)).unwrap())
        }
        "memory.get" => {
            let p: IdParams = parse_params(params)?;
            let memory = services.memory.get(&p.id).await?;
            Ok(serde_json::to_value(MemoryDto::from(memory)).unwrap())
        }
        "memory.update" => {
            let p: MemoryUpdateParams = parse_params(params)?;
            let memory = services
                .memory
                .update(
                    &p.id,
                    UpdateMemoryInput {
                        title: p.title,
                        content: p.content,
                        context: p.context,
                        tags: p.tags,
                    },
                )
                .await?;
            Ok(serde_json::to_value(MemoryDto::from(memory)).unwrap())
        }
        "memory.delete" => {
            let p: IdParams = parse_params(params)?;
            services.memory.delete(&p.id).await?;
            Ok(Value::Null)
        }
        "memory.list" => {
            let p: MemoryListParams = parse_params(params)?;
            let memory_type = p.memory_type.as_deref().map(|s| s.to_string());
            let memories = services
                .memory
                .list(MemoryFilter {
                    project_id: p.project_id,
                    memory_type,
                    session_id: p.session_id,
                    tags: p.tags.unwrap_or_default(),
                    include_archived: p.include_archived.unwrap_or(false),
                })
                .await?;
            let dtos: Vec<MemoryDto> = memories.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "memory.search" => {
            let p: MemorySearchParams = parse_params(params)?;
            let use_relevance = p.use_relevance.unwrap_or(false);
            let input = p.into_search_input()?;
            let results = if use_relevance {
                services.memory.search_with_relevance(input).await?
            } else {
                services.memory.search(input).await?
            };
            let dtos: Vec<SearchResultDto> = results.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "memory.findSimilar" => {
            let p: FindSimilarParams = parse_params(params)?;
            let results = services
                .memory
                .find_similar(&p.id, p.limit.unwrap_or(10))
                .await?;
            let dtos: Vec<SearchResultDto> = results.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "memory.facetedSearch" => {
            let p: MemorySearchParams = parse_params(params)?;
            let input = p.into_search_input()?;
            let result = services.memory.faceted_search(input).await?;
            Ok(serde_json::to_value(FacetedSearchResultDto::from(result)).unwrap())
        }
        "memory.suggest" => {
            let p: SuggestParams = parse_params(params)?;
            let suggestions = services
                .memory
                .suggest(p.project_id.as_deref(), &p.partial, p.limit.unwrap_or(10))
                .await?;
            let dtos: Vec<SuggestionDto> = suggestions.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "memory.archive" => {
            let p: IdParams = parse_params(params)?;
            let memory = services.memory.archive(&p.id).await?;
            Ok(serde_json::to_value(MemoryDto::from(memory)).unwrap())
        }
        "memory.unarchive" => {
            let p: IdParams = parse_params(params)?;
            let memory = services.memory.unarchive(&p.id).await?;
            Ok(serde_json::to_value(MemoryDto::from(memory)).unwrap())
        }
        "memory.cleanup" => {
            let p: CleanupParams = parse_params(params)?;
            let report = services.memory.cleanup(p.project_id.as_deref()).await?;
            Ok(serde_json::to_value(CleanupReportDto::from(report)).unwrap())
        }

        "project.init" => {
            let p: ProjectInitParams = parse_params(params)?;
            let project = services
                .project
                .initialize(
                    &p.path,
                    InitializeProjectInput {
                        description: p.description,
                        language: p.language,
                        framework: p.framework,
                    },
                )
                .await?;
            Ok(serde_json::to_value(ProjectDto::from(project)).unwrap())
        }
        "project.create" => {
            let p: ProjectCreateParams = parse_params(params)?;
            let project = services
                .project
                .create(CreateProjectInput {
                    name: p.name,
                    path: p.path,
                    description: p.description,
                    language: p.language,
                    framework: p.framework,
                })
                .await?;
            Ok(serde_json::to_value(ProjectDto::from(project)).unwrap())
        }
        "project.get" => {
            let p: IdParams = parse_params(params)?;
            let project = services.project.get(&p.id).await?;
            Ok(serde_json::to_value(ProjectDto::from(project)).unwrap())
        }
        "project.getByPath" => {
            let p: PathParams = parse_params(params)?;
            let project = services.project.get_by_path(&p.path).await?;
            Ok(serde_json::to_value(ProjectDto::from(project)).unwrap())
        }
        "project.list" => {
            let projects = services.project.list().await?;
            let dtos: Vec<ProjectDto> = projects.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "project.update" => {
            let p: ProjectUpdateParams = parse_params(params)?;
            let project = services
                .project
                .update(
                    &p.id,
                    UpdateProjectInput {
                        name: p.name,
                        description: p.description,
                        language: p.language,
                        framework: p.framework,
                    },
                )
                .await?;
            Ok(serde_json::to_value(ProjectDto::from(project)).unwrap())
        }
        "project.delete" => {
            let p: IdParams = parse_params(params)?;
            services
                .project
                .delete(&p.id, &services.memory, &services.session)
                .await?;
            Ok(Value::Null)
        }

        "session.start" => {
            let p: SessionStartParams = parse_params(params)?;
            let session = services
                .session
                .start_session(&p.project_id, p.task_description, p.tags.unwrap_or_default())
                .await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.log" => {
            let p: SessionLogParams = parse_params(params)?;
            let progress_type = parse_progress_type(&p.progress_type).ok_or_else(|| {
                ServiceError::Validation(format!("unknown progress type '{}'", p.progress_type))
            })?;
            let session = services
                .session
                .log_progress(
                    &p.id,
                    LogProgressInput {
                        progress_type,
                        message: p.message,
                    },
                )
                .await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.complete" => {
            let p: SessionCompleteParams = parse_params(params)?;
            let session = services
                .session
                .complete_session(&p.id, p.outcome, p.summary)
                .await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.abort" => {
            let p: SessionAbortParams = parse_params(params)?;
            let session = services.session.abort_session(&p.id, p.outcome).await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.pause" => {
            let p: IdParams = parse_params(params)?;
            let session = services.session.pause_session(&p.id).await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.resume" => {
            let p: IdParams = parse_params(params)?;
            let session = services.session.resume_session(&p.id).await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.get" => {
            let p: IdParams = parse_params(params)?;
            let session = services.session.get(&p.id).await?;
            Ok(serde_json::to_value(SessionDto::from(session)).unwrap())
        }
        "session.getActive" => {
            let p: ProjectIdParams = parse_params(params)?;
            let session = services.session.get_active(&p.project_id).await?;
            Ok(serde_json::to_value(session.map(SessionDto::from)).unwrap())
        }
        "session.list" => {
            let p: SessionListParams = parse_params(params)?;
            let status = p
                .status
                .as_deref()
                .map(parse_session_status)
                .transpose()
                .ok_or_else(|| ServiceError::Validation("unknown session status".to_string()))?;
            let sessions = services
                .session
                .list(SessionFilter {
                    project_id: p.project_id,
                    status,
                })
                .await?;
            let dtos: Vec<SessionDto> = sessions.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }

        "task.create" => {
            let p: TaskCreateParams = parse_params(params)?;
            let priority = p
                .priority
                .as_deref()
                .map(|s| {
                    parse_task_priority(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown priority '{s}'")))
                })
                .transpose()?
                .unwrap_or(memory_core::domain::TaskPriority::Medium);
            let task = services
                .task
                .create(CreateTaskInput {
                    project_id: p.project_id,
                    title: p.title,
                    description: p.description,
                    tags: p.tags.unwrap_or_default(),
                    priority,
                    assignee: p.assignee,
                    due_date: p.due_date,
                    estimated_hours: p.estimated_hours,
                })
                .await?;
            Ok(serde_json::to_value(TaskDto::from(task)).unwrap())
        }
        "task.get" => {
            let p: IdParams = parse_params(params)?;
            let task = services.task.get(&p.id).await?;
            Ok(serde_json::to_value(TaskDto::from(task)).unwrap())
        }
        "task.update" => {
            let p: TaskUpdateParams = parse_params(params)?;
            let status = p
                .status
                .as_deref()
                .map(|s| {
                    parse_task_status(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown status '{s}'")))
                })
                .transpose()?;
            let priority = p
                .priority
                .as_deref()
                .map(|s| {
                    parse_task_priority(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown priority '{s}'")))
                })
                .transpose()?;
            let task = services
                .task
                .update(
                    &p.id,
                    UpdateTaskInput {
                        title: p.title,
                        description: p.description,
                        tags: p.tags,
                        status,
                        priority,
                        assignee: p.assignee,
                        due_date: p.due_date,
                        estimated_hours: p.estimated_hours,
                        actual_hours: p.actual_hours,
                    },
                )
                .await?;
            Ok(serde_json::to_value(TaskDto::from(task)).unwrap())
        }
        "task.delete" => {
            let p: IdParams = parse_params(params)?;
            services.task.delete(&p.id).await?;
            Ok(Value::Null)
        }
        "task.list" => {
            let p: ProjectIdParams = parse_params(params)?;
            let tasks = services.task.list(&p.project_id).await?;
            let dtos: Vec<TaskDto> = tasks.into_iter().map(Into::into).collect();
            Ok(serde_json::to_value(dtos).unwrap())
        }
        "task.stats" => {
            let p: ProjectIdParams = parse_params(params)?;
            let stats = services.task.statistics(&p.project_id).await?;
            Ok(serde_json::to_value(TaskStatisticsDto::from(stats)).unwrap())
        }

        _ => Err(ServiceError::Validation(format!("unknown method '{method}'"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdParams {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathParams {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectIdParams {
    project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryCreateParams {
    project_id: String,
    session_id: Option<String>,
    #[serde(rename = "type")]
    memory_type: String,
    title: String,
    content: String,
    context: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryUpdateParams {
    id: String,
    title: Option<String>,
    content: Option<String>,
    context: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryListParams {
    project_id: Option<String>,
    #[serde(rename = "type")]
    memory_type: Option<String>,
    session_id: Option<String>,
    tags: Option<Vec<String>>,
    include_archived: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemorySearchParams {
    query: String,
    project_id: Option<String>,
    #[serde(rename = "type")]
    memory_type: Option<String>,
    tags: Option<Vec<String>>,
    limit: Option<usize>,
    threshold: Option<f32>,
    after: Option<chrono::DateTime<chrono::Utc>>,
    before: Option<chrono::DateTime<chrono::Utc>>,
    include_archived: Option<bool>,
}

impl MemorySearchParams {
    fn into_search_input(&self) -> Result<SearchInput, ServiceError> {
        let memory_type = self
            .memory_type
            .as_deref()
            .map(memory_type_or_validation)
            .transpose()?;
        let time_filter = if self.after.is_some() || self.before.is_some() {
            Some(TimeFilter {
                after: self.after,
                before: self.before,
            })
        } else {
            None
        };
        Ok(SearchInput {
            query: self.query.clone(),
            project_id: self.project_id.clone(),
            memory_type,
            tags: self.tags.clone().unwrap_or_default(),
            limit: self.limit.unwrap_or(10),
            threshold: self.threshold.unwrap_or(0.0),
            time_filter,
            include_archived: self.include_archived.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindSimilarParams {
    id: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestParams {
    partial: String,
    project_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupParams {
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectInitParams {
    path: String,
    description: Option<String>,
    language: Option<String>,
    framework: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectCreateParams {
    name: String,
    path: String,
    description: Option<String>,
    language: Option<String>,
    framework: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectUpdateParams {
    id: String,
    name: Option<String>,
    description: Option<String>,
    language: Option<String>,
    framework: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStartParams {
    project_id: String,
    task_description: String,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionLogParams {
    id: String,
    #[serde(rename = "type")]
    progress_type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCompleteParams {
    id: String,
    outcome: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionAbortParams {
    id: String,
    outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionListParams {
    project_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreateParams {
    project_id: String,
    title: String,
    description: String,
    tags: Option<Vec<String>>,
    priority: Option<String>,
    assignee: Option<String>,
    due_date: Option<chrono::DateTime<chrono::Utc>>,
    estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskUpdateParams {
    id: String,
    title: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    status: Option<String>,
    priority: Option<String>,
    #[serde(default)]
    assignee: Option<Option<String>>,
    #[serde(default)]
    due_date: Option<Option<chrono::DateTime<chrono::Utc>>>,
    #[serde(default)]
    estimated_hours: Option<Option<f64>>,
    #[serde(default)]
    actual_hours: Option<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::config::RankingWeights;
    use memory_core::embedding::MockEmbeddingProvider;
    use memory_core::service::{MemoryService, ProjectService, SessionService, TaskService};
    use memory_core::store::RelationalStore;
    use memory_core::vector::{MockVectorIndex, VectorIndex};
    use memory_core::wiring::StripedLocks;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    const DIM: usize = 16;

    async fn test_services() -> Services {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = RelationalStore::from_pool(pool).await.unwrap();

        let vector_index: Arc<dyn VectorIndex> = Arc::new(MockVectorIndex::new());
        vector_index.create_collection("rpc-tests", DIM).await.unwrap();
        let embedding: Arc<dyn memory_core::embedding::EmbeddingProvider> =
            Arc::new(MockEmbeddingProvider::new(DIM));
        let locks = Arc::new(StripedLocks::new());

        let memory = Arc::new(MemoryService::new(
            store.clone(),
            embedding,
            vector_index,
            "rpc-tests".to_string(),
            locks.clone(),
            RankingWeights::default(),
        ));
        let project = ProjectService::new(store.clone());
        let session = SessionService::new(store, locks);
        let task = TaskService::new(memory.clone());

        Services {
            memory,
            project,
            session,
            task,
        }
    }

    #[tokio::test]
    async fn project_init_then_memory_create_round_trips_over_rpc() {
        let services = test_services().await;

        let project = dispatch(
            &services,
            "project.init",
            json!({"path": "/tmp/rpc-project"}),
        )
        .await
        .unwrap();
        let project_id = project.get("id").unwrap().as_str().unwrap().to_string();

        let memory = dispatch(
            &services,
            "memory.create",
            json!({
                "projectId": project_id,
                "type": "decision",
                "title": "Use JWT",
                "content": "Adopt JWT for auth",
                "tags": ["auth"],
            }),
        )
        .await
        .unwrap();

        let memory_id = memory.get("id").unwrap().as_str().unwrap().to_string();

        let fetched = dispatch(&services, "memory.get", json!({"id": memory_id}))
            .await
            .unwrap();
        assert_eq!(fetched.get("title").unwrap().as_str().unwrap(), "Use JWT");
    }

    #[tokio::test]
    async fn unknown_method_is_a_validation_error() {
        let services = test_services().await;
        let result = dispatch(&services, "memory.teleport", Value::Null).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_memory_type_is_a_validation_error() {
        let services = test_services().await;
        let project = dispatch(&services, "project.init", json!({"path": "/tmp/rpc-bad-type"}))
            .await
            .unwrap();
        let project_id = project.get("id").unwrap().as_str().unwrap().to_string();

        let result = dispatch(
            &services,
            "memory.create",
            json!({
                "projectId": project_id,
                "type": "not_a_real_type",
                "title": "x",
                "content": "y",
            }),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn session_start_conflict_surfaces_as_conflict_error() {
        let services = test_services().await;
        let project = dispatch(&services, "project.init", json!({"path": "/tmp/rpc-session"}))
            .await
            .unwrap();
        let project_id = project.get("id").unwrap().as_str().unwrap().to_string();

        dispatch(
            &services,
            "session.start",
            json!({"projectId": project_id, "taskDescription": "first"}),
        )
        .await
        .unwrap();

        let result = dispatch(
            &services,
            "session.start",
            json!({"projectId": project_id, "taskDescription": "second"}),
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn handle_line_wraps_errors_into_the_rpc_error_shape() {
        let services = test_services().await;
        let response = handle_line(&services, r#"{"method":"memory.teleport","id":1}"#).await;
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, "VALIDATION");
    }

    #[tokio::test]
    async fn malformed_json_line_is_reported_without_panicking() {
        let services = test_services().await;
        let response = handle_line(&services, "{not json").await;
        assert!(response.error.is_some());
        assert_eq!(response.id, Value::Null);
    }
}

