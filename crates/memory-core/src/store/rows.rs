use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::{Memory, MemoryType, Project, ProgressEntry, ProgressType, Session, SessionStatus};
use crate::store::error::StoreError;

#[derive(FromRow)]
pub(super) struct ProjectRow {
    pub id: String,
    pub name: String,
    pub path: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            path: row.path,
            description: row.description,
            language: row.language,
            framework: row.framework,
            created_at: parse_rfc3339(&row.created_at)?,
            updated_at: parse_rfc3339(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
pub(super) struct MemoryRow {
    pub id: String,
    pub project_id: String,
    pub session_id: Option<String>,
    pub memory_type: String,
    pub title: String,
    pub content: String,
    pub context: String,
    pub has_embedding: i64,
    pub archived_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MemoryRow {
    pub fn into_memory(self, tags: Vec<String>) -> Result<Memory, StoreError> {
        Ok(Memory {
            id: self.id,
            project_id: self.project_id,
            session_id: self.session_id,
            memory_type: MemoryType::parse(&self.memory_type).ok_or_else(|| {
                StoreError::Decode(format!("unknown memory_type '{}'", self.memory_type))
            })?,
            title: self.title,
            content: self.content,
            context: self.context,
            tags,
            has_embedding: self.has_embedding != 0,
            archived_at: self.archived_at.as_deref().map(parse_rfc3339).transpose()?,
            created_at: parse_rfc3339(&self.created_at)?,
            updated_at: parse_rfc3339(&self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
pub(super) struct SessionRow {
    pub id: String,
    pub project_id: String,
    pub task_description: String,
    pub status: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub outcome: Option<String>,
    pub summary: Option<String>,
}

impl SessionRow {
    pub fn into_session(
        self,
        tags: Vec<String>,
        progress: Vec<ProgressEntry>,
    ) -> Result<Session, StoreError> {
        Ok(Session {
            id: self.id,
            project_id: self.project_id,
            task_description: self.task_description,
            status: SessionStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Decode(format!("unknown session status '{}'", self.status)))?,
            start_time: parse_rfc3339(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_rfc3339).transpose()?,
            outcome: self.outcome,
            summary: self.summary,
            tags,
            progress,
        })
    }
}

#[derive(FromRow)]
pub(super) struct ProgressRow {
    pub progress_type: String,
    pub timestamp: String,
    pub message: String,
}

impl TryFrom<ProgressRow> for ProgressEntry {
    type Error = StoreError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(ProgressEntry {
            progress_type: ProgressType::parse(&row.progress_type).ok_or_else(|| {
                StoreError::Decode(format!("unknown progress_type '{}'", row.progress_type))
            })?,
            timestamp: parse_rfc3339(&row.timestamp)?,
            message: row.message,
        })
    }
}

pub(super) fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid timestamp '{value}': {e}")))
}
