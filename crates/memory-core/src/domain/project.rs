use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tenancy boundary: every Memory, Session and Task belongs to exactly
/// one Project, and search is scoped per project unless explicitly global.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Absolute path; unique across all projects.
    pub path: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
