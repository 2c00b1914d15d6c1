use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::Project;
use crate::error::{ServiceError, ServiceResult};
use crate::store::RelationalStore;

use super::memory::MemoryService;
use super::session::SessionService;

/// Input to [`ProjectService::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateProjectInput {
    pub name: String,
    pub path: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
}

/// Patch applied by [`ProjectService::update`]; `None` fields are left
/// unchanged. `path` is immutable after creation — it is the tenancy key,
/// and changing it out from under existing Memories would sever the
/// path→id resolution callers rely on.
#[derive(Debug, Clone, Default)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
}

/// Input to [`ProjectService::initialize`].
#[derive(Debug, Clone, Default)]
pub struct InitializeProjectInput {
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
}

/// Project lifecycle and path↔id resolution. Every Memory, Session and
/// Task belongs to exactly one Project; deletion cascades through the
/// Memory and Session services so vector-index cleanup happens rather
/// than leaving orphaned index entries.
pub struct ProjectService {
    store: RelationalStore,
}

impl ProjectService {
    pub fn new(store: RelationalStore) -> Self {
        Self { store }
    }

    fn validate_path(path: &str) -> ServiceResult<()> {
        if !Path::new(path).is_absolute() {
            return Err(ServiceError::Validation(format!(
                "project path must be absolute: '{path}'"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(path = %input.path))]
    pub async fn create(&self, input: CreateProjectInput) -> ServiceResult<Project> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::Validation("name must not be empty".into()));
        }
        Self::validate_path(&input.path)?;
        if self.store.get_project_by_path(&input.path).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "a project already exists at path '{}'",
                input.path
            )));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            path: input.path,
            description: input.description,
            language: input.language,
            framework: input.framework,
            created_at: now,
            updated_at: now,
        };

        self.store.create_project(&project).await?;
        info!(project_id = %project.id, "project created");
        Ok(project)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("project '{id}' not found")))
    }

    pub async fn get_by_path(&self, path: &str) -> ServiceResult<Project> {
        self.store
            .get_project_by_path(path)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no project at path '{path}'")))
    }

    pub async fn list(&self) -> ServiceResult<Vec<Project>> {
        Ok(self.store.list_projects().await?)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: UpdateProjectInput) -> ServiceResult<Project> {
        let mut project = self.get(id).await?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(ServiceError::Validation("name must not be empty".into()));
            }
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = Some(description);
        }
        if let Some(language) = patch.language {
            project.language = Some(language);
        }
        if let Some(framework) = patch.framework {
            project.framework = Some(framework);
        }
        project.updated_at = Utc::now();

        self.store.update_project(&project).await?;
        Ok(project)
    }

    /// Idempotent: returns the existing project at `path` if one exists,
    /// otherwise creates one with defaults inferred from the path's
    /// basename.
    #[instrument(skip(self, opts), fields(path = %path))]
    pub async fn initialize(
        &self,
        path: &str,
        opts: InitializeProjectInput,
    ) -> ServiceResult<Project> {
        Self::validate_path(path)?;
        if let Some(existing) = self.store.get_project_by_path(path).await? {
            return Ok(existing);
        }

        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| path.to_string());

        self.create(CreateProjectInput {
            name,
            path: path.to_string(),
            description: opts.description,
            language: opts.language,
            framework: opts.framework,
        })
        .await
    }

    /// Deletes the project, cascading to its memories and sessions
    /// through the Memory and Session services so vector-index cleanup
    /// happens before the relational rows disappear.
    #[instrument(skip(self, memory_service, session_service))]
    pub async fn delete(
        &self,
        id: &str,
        memory_service: &MemoryService,
        session_service: &SessionService,
    ) -> ServiceResult<()> {
        self.get(id).await?;

        let memories = memory_service
            .list(crate::store::MemoryFilter {
                project_id: Some(id.to_string()),
                include_archived: true,
                ..Default::default()
            })
            .await?;
        for memory in memories {
            memory_service.delete(&memory.id).await?;
        }

        let sessions = session_service.list_for_project(id).await?;
        for session in sessions {
            session_service.delete(&session.id).await?;
        }

        self.store.delete_project(id).await?;
        info!(project_id = %id, "project deleted");
        Ok(())
    }
}
