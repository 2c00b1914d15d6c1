use chrono::{DateTime, Utc};

use crate::domain::Memory;

use super::rows::MemoryRow;
use super::{RelationalStore, StoreError, SQLITE_MAX_VARIABLE_NUMBER};

/// Filters accepted by [`RelationalStore::list_memories`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub project_id: Option<String>,
    pub memory_type: Option<String>,
    pub session_id: Option<String>,
    /// All tags must be present (AND semantics).
    pub tags: Vec<String>,
    pub include_archived: bool,
}

impl RelationalStore {
    pub async fn create_memory(&self, memory: &Memory) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO memories
                (id, project_id, session_id, memory_type, title, content, context, has_embedding, archived_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&memory.id)
        .bind(&memory.project_id)
        .bind(&memory.session_id)
        .bind(memory.memory_type.as_str())
        .bind(&memory.title)
        .bind(&memory.content)
        .bind(&memory.context)
        .bind(memory.has_embedding as i64)
        .bind(memory.archived_at.map(|t| t.to_rfc3339()))
        .bind(memory.created_at.to_rfc3339())
        .bind(memory.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for tag in &memory.tags {
            sqlx::query("INSERT INTO memory_tags (memory_id, tag) VALUES (?, ?)")
                .bind(&memory.id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_memory(&self, id: &str) -> Result<Option<Memory>, StoreError> {
        let row: Option<MemoryRow> = sqlx::query_as("SELECT * FROM memories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let tags = self.tags_for(id).await?;
                Ok(Some(row.into_memory(tags)?))
            }
            None => Ok(None),
        }
    }

    /// Batched `getByIds` honoring SQLite's default bound-parameter
    /// ceiling: hydrates vector search results in one round trip per
    /// chunk rather than one per id.
    pub async fn get_memories_by_ids(&self, ids: &[String]) -> Result<Vec<Memory>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT * FROM memories WHERE id IN ({placeholders})");
            let mut query = sqlx::query_as::<_, MemoryRow>(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            for row in rows {
                let tags = self.tags_for(&row.id).await?;
                out.push(row.into_memory(tags)?);
            }
        }
        Ok(out)
    }

    async fn tags_for(&self, memory_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT tag FROM memory_tags WHERE memory_id = ? ORDER BY tag ASC")
                .bind(memory_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    /// Updates title/content/context/tags/embedding-state. `project_id`
    /// and `memory_type` are immutable after creation.
    pub async fn update_memory(&self, memory: &Memory) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE memories SET title = ?, content = ?, context = ?, has_embedding = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&memory.title)
        .bind(&memory.content)
        .bind(&memory.context)
        .bind(memory.has_embedding as i64)
        .bind(memory.updated_at.to_rfc3339())
        .bind(&memory.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM memory_tags WHERE memory_id = ?")
            .bind(&memory.id)
            .execute(&mut *tx)
            .await?;
        for tag in &memory.tags {
            sqlx::query("INSERT INTO memory_tags (memory_id, tag) VALUES (?, ?)")
                .bind(&memory.id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn set_has_embedding(&self, id: &str, has_embedding: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE memories SET has_embedding = ? WHERE id = ?")
            .bind(has_embedding as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_archived(
        &self,
        id: &str,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE memories SET archived_at = ? WHERE id = ?")
            .bind(archived_at.map(|t| t.to_rfc3339()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_memory(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lists memories matching `filter`. Tag filtering uses an
    /// intersection count (`HAVING COUNT(DISTINCT tag) = N`) so the
    /// query stays a single round trip regardless of how many tags are
    /// requested. Built with `QueryBuilder` so every filter value is
    /// bound, never interpolated into the SQL text.
    pub async fn list_memories(&self, filter: &MemoryFilter) -> Result<Vec<Memory>, StoreError> {
        let mut builder = sqlx::QueryBuilder::new("SELECT m.* FROM memories m");

        if !filter.tags.is_empty() {
            builder.push(" JOIN memory_tags mt ON mt.memory_id = m.id");
        }

        let mut has_condition = false;
        let mut push_condition = |builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>, sql: &str| {
            builder.push(if has_condition { " AND " } else { " WHERE " });
            builder.push(sql);
            has_condition = true;
        };

        if let Some(project_id) = &filter.project_id {
            push_condition(&mut builder, "m.project_id = ");
            builder.push_bind(project_id);
        }
        if let Some(memory_type) = &filter.memory_type {
            push_condition(&mut builder, "m.memory_type = ");
            builder.push_bind(memory_type);
        }
        if let Some(session_id) = &filter.session_id {
            push_condition(&mut builder, "m.session_id = ");
            builder.push_bind(session_id);
        }
        if !filter.include_archived {
            push_condition(&mut builder, "m.archived_at IS NULL");
        }
        if !filter.tags.is_empty() {
            push_condition(&mut builder, "mt.tag IN (");
            let mut separated = builder.separated(", ");
            for tag in &filter.tags {
                separated.push_bind(tag);
            }
            builder.push(")");
        }

        if !filter.tags.is_empty() {
            builder.push(" GROUP BY m.id HAVING COUNT(DISTINCT mt.tag) = ");
            builder.push_bind(filter.tags.len() as i64);
        }
        builder.push(" ORDER BY m.created_at DESC");

        let rows: Vec<MemoryRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = self.tags_for(&row.id).await?;
            out.push(row.into_memory(tags)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoryType, Project};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> RelationalStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        RelationalStore::from_pool(pool).await.unwrap()
    }

    fn sample_memory(project_id: &str, tags: Vec<&str>) -> Memory {
        let now = Utc::now();
        Memory {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            session_id: None,
            memory_type: MemoryType::Decision,
            title: "Use JWT".into(),
            content: "Adopt JWT for auth".into(),
            context: "".into(),
            tags: tags.into_iter().map(String::from).collect(),
            has_embedding: false,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
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

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let store = store().await;
        let project = with_project(&store).await;
        let memory = sample_memory(&project.id, vec!["auth", "security"]);
        store.create_memory(&memory).await.unwrap();

        let fetched = store.get_memory(&memory.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, memory.title);
        assert_eq!(fetched.tags, vec!["auth".to_string(), "security".to_string()]);
        assert!(!fetched.has_embedding);
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let store = store().await;
        let project = with_project(&store).await;
        let memory = sample_memory(&project.id, vec![]);
        store.create_memory(&memory).await.unwrap();
        store.delete_memory(&memory.id).await.unwrap();

        assert!(store.get_memory(&memory.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tag_filter_requires_all_tags_present() {
        let store = store().await;
        let project = with_project(&store).await;
        let both = sample_memory(&project.id, vec!["auth", "security"]);
        let one = sample_memory(&project.id, vec!["auth"]);
        store.create_memory(&both).await.unwrap();
        store.create_memory(&one).await.unwrap();

        let filter = MemoryFilter {
            project_id: Some(project.id.clone()),
            tags: vec!["auth".to_string(), "security".to_string()],
            ..Default::default()
        };
        let results = store.list_memories(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, both.id);
    }

    #[tokio::test]
    async fn archived_memories_excluded_unless_requested() {
        let store = store().await;
        let project = with_project(&store).await;
        let memory = sample_memory(&project.id, vec![]);
        store.create_memory(&memory).await.unwrap();
        store.set_archived(&memory.id, Some(Utc::now())).await.unwrap();

        let visible = store
            .list_memories(&MemoryFilter {
                project_id: Some(project.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(visible.is_empty());

        let including_archived = store
            .list_memories(&MemoryFilter {
                project_id: Some(project.id.clone()),
                include_archived: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(including_archived.len(), 1);
    }

    #[tokio::test]
    async fn get_memories_by_ids_batches_in_chunks() {
        let store = store().await;
        let project = with_project(&store).await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            let memory = sample_memory(&project.id, vec![]);
            store.create_memory(&memory).await.unwrap();
            ids.push(memory.id);
        }

        let fetched = store.get_memories_by_ids(&ids).await.unwrap();
        assert_eq!(fetched.len(), 5);
    }
}
