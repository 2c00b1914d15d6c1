use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "todo" => Self::Todo,
            "in_progress" => Self::InProgress,
            "done" => Self::Done,
            "blocked" => Self::Blocked,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => return None,
        })
    }
}

/// The derived fields of a Task, serialized into a Memory's `context`
/// column as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFields {
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    /// Timestamp of the last status transition.
    pub last_transition_at: DateTime<Utc>,
}

impl TaskFields {
    pub fn to_context(&self) -> String {
        serde_json::to_string(self).expect("TaskFields is always serializable")
    }

    pub fn from_context(context: &str) -> Option<Self> {
        serde_json::from_str(context).ok()
    }
}

/// A read view over a Memory of type `Task`, combining the common Memory
/// fields with the task-specific fields decoded from `context`.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub fields: TaskFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a Task view from its underlying Memory row. Returns `None`
    /// if the memory is not a task or its context cannot be decoded.
    pub fn from_memory(memory: &Memory) -> Option<Self> {
        use super::memory::MemoryType;
        if memory.memory_type != MemoryType::Task {
            return None;
        }
        let fields = TaskFields::from_context(&memory.context)?;
        Some(Self {
            id: memory.id.clone(),
            project_id: memory.project_id.clone(),
            title: memory.title.clone(),
            description: memory.content.clone(),
            tags: memory.tags.clone(),
            fields,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        })
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.fields.due_date {
            Some(due) => due < now && self.fields.status != TaskStatus::Done,
            None => false,
        }
    }
}
