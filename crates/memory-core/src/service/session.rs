use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{normalize_tags, ProgressEntry, ProgressType, Session, SessionStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{RelationalStore, SessionFilter};
use crate::wiring::StripedLocks;

/// Input to [`SessionService::log_progress`].
#[derive(Debug, Clone)]
pub struct LogProgressInput {
    pub progress_type: ProgressType,
    pub message: String,
}

/// Work-interval lifecycle for a Project: at most one Active session per
/// project at a time, an append-only progress log, and a terminal
/// outcome (completed/aborted) once the interval closes.
pub struct SessionService {
    store: RelationalStore,
    locks: Arc<StripedLocks>,
}

impl SessionService {
    pub fn new(store: RelationalStore, locks: Arc<StripedLocks>) -> Self {
        Self { store, locks }
    }

    async fn require_project(&self, project_id: &str) -> ServiceResult<()> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("project '{project_id}' not found")))?;
        Ok(())
    }

    /// Starts a new Active session for `project_id`. Serialized per
    /// project (via the project id's stripe) so the check-then-insert for
    /// "at most one active session" can't race with a concurrent start.
    #[instrument(skip(self, tags))]
    pub async fn start_session(
        &self,
        project_id: &str,
        task_description: String,
        tags: Vec<String>,
    ) -> ServiceResult<Session> {
        if task_description.trim().is_empty() {
            return Err(ServiceError::Validation(
                "task_description must not be empty".into(),
            ));
        }
        let _guard = self.locks.acquire(project_id).await;
        self.require_project(project_id).await?;

        if self.store.get_active_session(project_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "project '{project_id}' already has an active session"
            )));
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            task_description,
            status: SessionStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            outcome: None,
            summary: None,
            tags: normalize_tags(tags),
            progress: Vec::new(),
        };

        self.store.create_session(&session).await?;
        info!(session_id = %session.id, project_id, "session started");
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Session> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session '{id}' not found")))
    }

    pub async fn get_active(&self, project_id: &str) -> ServiceResult<Option<Session>> {
        Ok(self.store.get_active_session(project_id).await?)
    }

    pub async fn list(&self, filter: SessionFilter) -> ServiceResult<Vec<Session>> {
        Ok(self.store.list_sessions(&filter).await?)
    }

    pub async fn list_for_project(&self, project_id: &str) -> ServiceResult<Vec<Session>> {
        self.list(SessionFilter {
            project_id: Some(project_id.to_string()),
            status: None,
        })
        .await
    }

    fn ensure_not_terminal(session: &Session) -> ServiceResult<()> {
        if session.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "session '{}' is already {}",
                session.id,
                session.status.as_str()
            )));
        }
        Ok(())
    }

    /// Appends a progress entry. Only valid while the session is Active
    /// or Paused — a terminal session's log is closed.
    #[instrument(skip(self, input))]
    pub async fn log_progress(&self, id: &str, input: LogProgressInput) -> ServiceResult<Session> {
        let session = self.get(id).await?;
        Self::ensure_not_terminal(&session)?;

        self.store
            .append_progress(
                id,
                &ProgressEntry {
                    progress_type: input.progress_type,
                    timestamp: Utc::now(),
                    message: input.message,
                },
            )
            .await?;
        self.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn pause_session(&self, id: &str) -> ServiceResult<Session> {
        let session = self.get(id).await?;
        if session.status != SessionStatus::Active {
            return Err(ServiceError::Conflict(format!(
                "session '{id}' is not active"
            )));
        }
        self.store
            .update_session_status(id, SessionStatus::Paused, None, None, None)
            .await?;
        self.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn resume_session(&self, id: &str) -> ServiceResult<Session> {
        let session = self.get(id).await?;
        if session.status != SessionStatus::Paused {
            return Err(ServiceError::Conflict(format!(
                "session '{id}' is not paused"
            )));
        }
        self.store
            .update_session_status(id, SessionStatus::Active, None, None, None)
            .await?;
        self.get(id).await
    }

    #[instrument(skip(self, outcome, summary))]
    pub async fn complete_session(
        &self,
        id: &str,
        outcome: Option<String>,
        summary: Option<String>,
    ) -> ServiceResult<Session> {
        let session = self.get(id).await?;
        Self::ensure_not_terminal(&session)?;
        self.store
            .update_session_status(
                id,
                SessionStatus::Completed,
                Some(Utc::now()),
                outcome.as_deref(),
                summary.as_deref(),
            )
            .await?;
        info!(session_id = %id, "session completed");
        self.get(id).await
    }

    #[instrument(skip(self, outcome))]
    pub async fn abort_session(&self, id: &str, outcome: Option<String>) -> ServiceResult<Session> {
        let session = self.get(id).await?;
        Self::ensure_not_terminal(&session)?;
        self.store
            .update_session_status(
                id,
                SessionStatus::Aborted,
                Some(Utc::now()),
                outcome.as_deref(),
                None,
            )
            .await?;
        info!(session_id = %id, "session aborted");
        self.get(id).await
    }

    /// Aborts every non-terminal session for a project. Called by project
    /// deletion so no Active/Paused session outlives its parent.
    pub async fn abort_active_sessions_for_project(&self, project_id: &str) -> ServiceResult<()> {
        for session in self.list_for_project(project_id).await? {
            if !session.status.is_terminal() {
                self.abort_session(&session.id, Some("project deleted".into()))
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.get(id).await?;
        self.store.delete_session(id).await?;
        Ok(())
    }
}
