use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::domain::{MemoryType, Task, TaskFields, TaskPriority, TaskStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::store::MemoryFilter;

use super::memory::{CreateMemoryInput, MemoryService, UpdateMemoryInput};

/// Input to [`TaskService::create`].
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

/// Patch applied by [`TaskService::update`]; `None` fields are left
/// unchanged. A `status` change bumps `last_transition_at`.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub estimated_hours: Option<Option<f64>>,
    pub actual_hours: Option<Option<f64>>,
}

/// Aggregate counts for a project's tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskStatistics {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub overdue: usize,
    pub by_priority: HashMap<TaskPriority, usize>,
    /// Keyed by assignee; tasks with no assignee are omitted.
    pub by_assignee: HashMap<String, usize>,
    pub total_hours: f64,
    pub average_hours: f64,
}

/// Tasks are Memories of type `Task`: the common CRUD, search and
/// embedding machinery is inherited from [`MemoryService`], with
/// status/priority/assignee/due-date layered on top as JSON in the
/// Memory's `context` column.
pub struct TaskService {
    memory_service: Arc<MemoryService>,
}

impl TaskService {
    pub fn new(memory_service: Arc<MemoryService>) -> Self {
        Self { memory_service }
    }

    fn to_task(memory: crate::domain::Memory) -> ServiceResult<Task> {
        Task::from_memory(&memory)
            .ok_or_else(|| ServiceError::Store(crate::store::StoreError::Decode(format!(
                "memory '{}' is not a decodable task",
                memory.id
            ))))
    }

    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    pub async fn create(&self, input: CreateTaskInput) -> ServiceResult<Task> {
        let now = Utc::now();
        let fields = TaskFields {
            status: TaskStatus::Todo,
            priority: input.priority,
            assignee: input.assignee,
            due_date: input.due_date,
            estimated_hours: input.estimated_hours,
            actual_hours: None,
            last_transition_at: now,
        };

        let memory = self
            .memory_service
            .create(CreateMemoryInput {
                project_id: input.project_id,
                session_id: None,
                memory_type: MemoryType::Task,
                title: input.title,
                content: input.description,
                context: fields.to_context(),
                tags: input.tags,
            })
            .await?;

        Self::to_task(memory)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Task> {
        let memory = self.memory_service.get(id).await?;
        Self::to_task(memory)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: UpdateTaskInput) -> ServiceResult<Task> {
        let memory = self.memory_service.get(id).await?;
        let mut fields = TaskFields::from_context(&memory.context).ok_or_else(|| {
            ServiceError::Store(crate::store::StoreError::Decode(format!(
                "memory '{id}' is not a decodable task"
            )))
        })?;

        let mut status_changed = false;
        if let Some(status) = patch.status {
            if status != fields.status {
                status_changed = true;
            }
            fields.status = status;
        }
        if let Some(priority) = patch.priority {
            fields.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            fields.assignee = assignee;
        }
        if let Some(due_date) = patch.due_date {
            fields.due_date = due_date;
        }
        if let Some(estimated_hours) = patch.estimated_hours {
            fields.estimated_hours = estimated_hours;
        }
        if let Some(actual_hours) = patch.actual_hours {
            fields.actual_hours = actual_hours;
        }
        if status_changed {
            fields.last_transition_at = Utc::now();
        }

        let memory = self
            .memory_service
            .update(
                id,
                UpdateMemoryInput {
                    title: patch.title,
                    content: patch.description,
                    context: Some(fields.to_context()),
                    tags: patch.tags,
                },
            )
            .await?;

        Self::to_task(memory)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.memory_service.delete(id).await
    }

    pub async fn list(&self, project_id: &str) -> ServiceResult<Vec<Task>> {
        let memories = self
            .memory_service
            .list(MemoryFilter {
                project_id: Some(project_id.to_string()),
                memory_type: Some(MemoryType::Task.as_str().to_string()),
                ..Default::default()
            })
            .await?;

        Ok(memories.into_iter().filter_map(|m| Task::from_memory(&m)).collect())
    }

    pub async fn statistics(&self, project_id: &str) -> ServiceResult<TaskStatistics> {
        let tasks = self.list(project_id).await?;
        let now = Utc::now();

        let mut stats = TaskStatistics {
            total: tasks.len(),
            ..Default::default()
        };
        let mut hours_count = 0usize;
        for task in &tasks {
            match task.fields.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Blocked => stats.blocked += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            *stats.by_priority.entry(task.fields.priority).or_insert(0) += 1;
            if let Some(assignee) = &task.fields.assignee {
                *stats.by_assignee.entry(assignee.clone()).or_insert(0) += 1;
            }
            if let Some(hours) = task.fields.actual_hours {
                stats.total_hours += hours;
                hours_count += 1;
            }
        }
        stats.average_hours = if hours_count == 0 {
            0.0
        } else {
            stats.total_hours / hours_count as f64
        };
        Ok(stats)
    }
}
