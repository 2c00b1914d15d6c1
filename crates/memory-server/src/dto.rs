//! Wire-format DTOs: the JSON shapes exchanged over the RPC surface and
//! printed by the CLI. Kept separate from `memory-core`'s domain types so
//! the engine never carries a serialization contract it doesn't own —
//! the wire format is this crate's concern, not the core's.

use chrono::{DateTime, Utc};
use memory_core::domain::{
    Memory, MemoryType, ProgressEntry, ProgressType, Project, Session, SessionStatus, Task,
    TaskPriority, TaskStatus,
};
use memory_core::ranking::{Candidate, Facets, Suggestion};
use memory_core::service::{CleanupReport, FacetedSearchResult, TaskStatistics};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: String,
    pub name: String,
    pub path: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectDto {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            path: p.path,
            description: p.description,
            language: p.language,
            framework: p.framework,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDto {
    pub id: String,
    pub project_id: String,
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub title: String,
    pub content: String,
    pub context: String,
    pub tags: Vec<String>,
    pub has_embedding: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Memory> for MemoryDto {
    fn from(m: Memory) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            session_id: m.session_id,
            memory_type: m.memory_type.as_str().to_string(),
            title: m.title,
            content: m.content,
            context: m.context,
            tags: m.tags,
            has_embedding: m.has_embedding,
            archived_at: m.archived_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn parse_memory_type(s: &str) -> Option<MemoryType> {
    MemoryType::parse(s)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultDto {
    pub memory: MemoryDto,
    pub similarity: f32,
}

impl From<Candidate> for SearchResultDto {
    fn from(c: Candidate) -> Self {
        Self {
            memory: c.memory.into(),
            similarity: c.similarity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FacetsDto {
    pub by_type: std::collections::HashMap<String, usize>,
    pub by_tag: std::collections::HashMap<String, usize>,
    pub by_project: std::collections::HashMap<String, usize>,
    pub by_session: std::collections::HashMap<String, usize>,
    pub by_time_bucket: std::collections::HashMap<String, usize>,
}

impl From<Facets> for FacetsDto {
    fn from(f: Facets) -> Self {
        Self {
            by_type: f.by_type,
            by_tag: f.by_tag,
            by_project: f.by_project,
            by_session: f.by_session,
            by_time_bucket: f.by_time_bucket,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetedSearchResultDto {
    pub results: Vec<SearchResultDto>,
    pub facets: FacetsDto,
}

impl From<FacetedSearchResult> for FacetedSearchResultDto {
    fn from(r: FacetedSearchResult) -> Self {
        Self {
            results: r.results.into_iter().map(Into::into).collect(),
            facets: r.facets.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionDto {
    pub text: String,
    pub frequency: usize,
}

impl From<Suggestion> for SuggestionDto {
    fn from(s: Suggestion) -> Self {
        Self {
            text: s.text,
            frequency: s.frequency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReportDto {
    pub total: usize,
    pub processed: usize,
    pub generated: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

impl From<CleanupReport> for CleanupReportDto {
    fn from(r: CleanupReport) -> Self {
        Self {
            total: r.total,
            processed: r.processed,
            generated: r.generated,
            errors: r.errors,
            error_messages: r.error_messages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntryDto {
    #[serde(rename = "type")]
    pub progress_type: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl From<ProgressEntry> for ProgressEntryDto {
    fn from(p: ProgressEntry) -> Self {
        Self {
            progress_type: p.progress_type.as_str().to_string(),
            timestamp: p.timestamp,
            message: p.message,
        }
    }
}

pub fn parse_progress_type(s: &str) -> Option<ProgressType> {
    ProgressType::parse(s)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub id: String,
    pub project_id: String,
    pub task_description: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub progress: Vec<ProgressEntryDto>,
}

impl From<Session> for SessionDto {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            project_id: s.project_id,
            task_description: s.task_description,
            status: s.status.as_str().to_string(),
            start_time: s.start_time,
            end_time: s.end_time,
            outcome: s.outcome,
            summary: s.summary,
            tags: s.tags,
            progress: s.progress.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn parse_session_status(s: &str) -> Option<SessionStatus> {
    SessionStatus::parse(s)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub status: String,
    pub priority: String,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub last_transition_at: DateTime<Utc>,
    pub overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskDto {
    fn from(t: Task) -> Self {
        let overdue = t.is_overdue(Utc::now());
        Self {
            id: t.id,
            project_id: t.project_id,
            title: t.title,
            description: t.description,
            tags: t.tags,
            status: t.fields.status.as_str().to_string(),
            priority: t.fields.priority.as_str().to_string(),
            assignee: t.fields.assignee,
            due_date: t.fields.due_date,
            estimated_hours: t.fields.estimated_hours,
            actual_hours: t.fields.actual_hours,
            last_transition_at: t.fields.last_transition_at,
            overdue,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

pub fn parse_task_status(s: &str) -> Option<TaskStatus> {
    TaskStatus::parse(s)
}

pub fn parse_task_priority(s: &str) -> Option<TaskPriority> {
    TaskPriority::parse(s)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatisticsDto {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub overdue: usize,
    pub by_priority: std::collections::HashMap<String, usize>,
    pub by_assignee: std::collections::HashMap<String, usize>,
    pub total_hours: f64,
    pub average_hours: f64,
    pub completion_rate: f64,
}

impl From<TaskStatistics> for TaskStatisticsDto {
    fn from(s: TaskStatistics) -> Self {
        let completion_rate = if s.total == 0 {
            0.0
        } else {
            (s.done as f64 / s.total as f64) * 100.0
        };
        let by_priority = s
            .by_priority
            .into_iter()
            .map(|(priority, count)| (priority.as_str().to_string(), count))
            .collect();
        Self {
            total: s.total,
            todo: s.todo,
            in_progress: s.in_progress,
            done: s.done,
            blocked: s.blocked,
            overdue: s.overdue,
            by_priority,
            by_assignee: s.by_assignee,
            total_hours: s.total_hours,
            average_hours: s.average_hours,
            completion_rate,
        }
    }
}
