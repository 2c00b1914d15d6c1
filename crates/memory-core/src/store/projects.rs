use chrono::Utc;

use crate::domain::Project;

use super::rows::ProjectRow;
use super::{RelationalStore, StoreError};

impl RelationalStore {
    pub async fn create_project(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO projects (id, name, path, description, language, framework, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.path)
        .bind(&project.description)
        .bind(&project.language)
        .bind(&project.framework)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Project::try_from).transpose()
    }

    pub async fn get_project_by_path(&self, path: &str) -> Result<Option<Project>, StoreError> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Project::try_from).transpose()
    }

    pub async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let updated_at = Utc::now();
        sqlx::query(
            "UPDATE projects SET name = ?, description = ?, language = ?, framework = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.language)
        .bind(&project.framework)
        .bind(updated_at.to_rfc3339())
        .bind(&project.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes the project row. Cascading memories/sessions is the
    /// Project Service's responsibility (routed through the Memory and
    /// Session services so index cleanup happens first) — this method
    /// only removes the row itself once the caller has done so.
    pub async fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows: Vec<ProjectRow> = sqlx::query_as("SELECT * FROM projects ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Project::try_from).collect()
    }
}
