use chrono::Utc;

use crate::domain::{ProgressEntry, Session, SessionStatus};

use super::rows::{ProgressRow, SessionRow};
use super::{RelationalStore, StoreError};

/// Filters accepted by [`RelationalStore::list_sessions`].
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub project_id: Option<String>,
    pub status: Option<SessionStatus>,
}

impl RelationalStore {
    pub async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sessions
                (id, project_id, task_description, status, start_time, end_time, outcome, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.project_id)
        .bind(&session.task_description)
        .bind(session.status.as_str())
        .bind(session.start_time.to_rfc3339())
        .bind(session.end_time.map(|t| t.to_rfc3339()))
        .bind(&session.outcome)
        .bind(&session.summary)
        .execute(&mut *tx)
        .await?;

        for tag in &session.tags {
            sqlx::query("INSERT INTO session_tags (session_id, tag) VALUES (?, ?)")
                .bind(&session.id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        for entry in &session.progress {
            insert_progress(&mut tx, &session.id, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let tags = self.session_tags(id).await?;
                let progress = self.session_progress(id).await?;
                Ok(Some(row.into_session(tags, progress)?))
            }
            None => Ok(None),
        }
    }

    /// The unique active session for `project_id`, if any.
    pub async fn get_active_session(&self, project_id: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE project_id = ? AND status = 'active'",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let tags = self.session_tags(&row.id).await?;
                let progress = self.session_progress(&row.id).await?;
                Ok(Some(row.into_session(tags, progress)?))
            }
            None => Ok(None),
        }
    }

    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        let mut builder = sqlx::QueryBuilder::new("SELECT * FROM sessions");
        let mut has_condition = false;
        let mut push_condition = |builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>, sql: &str| {
            builder.push(if has_condition { " AND " } else { " WHERE " });
            builder.push(sql);
            has_condition = true;
        };

        if let Some(project_id) = &filter.project_id {
            push_condition(&mut builder, "project_id = ");
            builder.push_bind(project_id.clone());
        }
        if let Some(status) = &filter.status {
            push_condition(&mut builder, "status = ");
            builder.push_bind(status.as_str());
        }
        builder.push(" ORDER BY start_time DESC");

        let rows: Vec<SessionRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = self.session_tags(&row.id).await?;
            let progress = self.session_progress(&row.id).await?;
            out.push(row.into_session(tags, progress)?);
        }
        Ok(out)
    }

    /// Transitions a session (complete/abort/pause/resume) by writing its
    /// status, end_time, outcome and summary. Progress is appended
    /// separately through [`Self::append_progress`].
    pub async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        end_time: Option<chrono::DateTime<Utc>>,
        outcome: Option<&str>,
        summary: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sessions SET status = ?, end_time = ?, outcome = ?, summary = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(end_time.map(|t| t.to_rfc3339()))
        .bind(outcome)
        .bind(summary)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn append_progress(
        &self,
        session_id: &str,
        entry: &ProgressEntry,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_progress(&mut tx, session_id, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_tags(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT tag FROM session_tags WHERE session_id = ? ORDER BY tag ASC")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    async fn session_progress(&self, session_id: &str) -> Result<Vec<ProgressEntry>, StoreError> {
        let rows: Vec<ProgressRow> = sqlx::query_as(
            "SELECT progress_type, timestamp, message FROM session_progress
             WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProgressEntry::try_from).collect()
    }
}

async fn insert_progress(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session_id: &str,
    entry: &ProgressEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO session_progress (session_id, progress_type, timestamp, message)
         VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(entry.progress_type.as_str())
    .bind(entry.timestamp.to_rfc3339())
    .bind(&entry.message)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Project, ProgressType};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> RelationalStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        RelationalStore::from_pool(pool).await.unwrap()
    }

    async fn with_project(store: &RelationalStore) -> Project {
        let now = Utc::now();
        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: "demo".into(),
            path: format!("/tmp/{}", uuid::Uuid::new_v4()),
            description: None,
            language: None,
            framework: None,
            created_at: now,
            updated_at: now,
        };
        store.create_project(&project).await.unwrap();
        project
    }

    fn sample_session(project_id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            task_description: "fix the bug".into(),
            status: SessionStatus::Active,
            start_time: now,
            end_time: None,
            outcome: None,
            summary: None,
            tags: vec!["backend".into()],
            progress: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = store().await;
        let project = with_project(&store).await;
        let session = sample_session(&project.id);
        store.create_session(&session).await.unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.task_description, session.task_description);
        assert_eq!(fetched.tags, vec!["backend".to_string()]);
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn only_one_active_session_is_returned() {
        let store = store().await;
        let project = with_project(&store).await;
        let session = sample_session(&project.id);
        store.create_session(&session).await.unwrap();

        let active = store.get_active_session(&project.id).await.unwrap();
        assert_eq!(active.unwrap().id, session.id);
    }

    #[tokio::test]
    async fn append_progress_is_ordered() {
        let store = store().await;
        let project = with_project(&store).await;
        let session = sample_session(&project.id);
        store.create_session(&session).await.unwrap();

        store
            .append_progress(
                &session.id,
                &ProgressEntry {
                    progress_type: ProgressType::Info,
                    timestamp: Utc::now(),
                    message: "first".into(),
                },
            )
            .await
            .unwrap();
        store
            .append_progress(
                &session.id,
                &ProgressEntry {
                    progress_type: ProgressType::Milestone,
                    timestamp: Utc::now(),
                    message: "second".into(),
                },
            )
            .await
            .unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.progress.len(), 2);
        assert_eq!(fetched.progress[0].message, "first");
        assert_eq!(fetched.progress[1].message, "second");
    }

    #[tokio::test]
    async fn update_status_sets_end_time_and_outcome() {
        let store = store().await;
        let project = with_project(&store).await;
        let session = sample_session(&project.id);
        store.create_session(&session).await.unwrap();

        let end_time = Utc::now();
        store
            .update_session_status(
                &session.id,
                SessionStatus::Completed,
                Some(end_time),
                Some("done"),
                None,
            )
            .await
            .unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.outcome.as_deref(), Some("done"));
        assert!(fetched.end_time.is_some());
    }
}
