use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tags::join_tags;

/// The kind of note a [`Memory`] holds. `Task` and `Session` are
/// specializations with derived state layered on top of the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Decision,
    Pattern,
    ErrorSolution,
    Code,
    Documentation,
    Session,
    Task,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Pattern => "pattern",
            Self::ErrorSolution => "error_solution",
            Self::Code => "code",
            Self::Documentation => "documentation",
            Self::Session => "session",
            Self::Task => "task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "decision" => Self::Decision,
            "pattern" => Self::Pattern,
            "error_solution" => Self::ErrorSolution,
            "code" => Self::Code,
            "documentation" => Self::Documentation,
            "session" => Self::Session,
            "task" => Self::Task,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, tagged note owned by a project.
///
/// Decision/Pattern/ErrorSolution carry additional structured fields which
/// the Memory Service serializes into `content`/`context` rather than
/// modeling as separate columns — the relational schema stores one shape
/// per type, keyed by `memory_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    pub project_id: String,
    pub session_id: Option<String>,
    pub memory_type: MemoryType,
    pub title: String,
    pub content: String,
    /// Free-form structured context, serialized JSON for types that need
    /// it (decision rationale/options/outcome, pattern fields, error
    /// fields, task derived state).
    pub context: String,
    pub tags: Vec<String>,
    /// `true` once a corresponding vector index entry exists for this id.
    pub has_embedding: bool,
    /// Set when archived (soft-delete): excluded from search/list by
    /// default, still fetchable by id.
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// The pinned embedding-text composition. Any change here invalidates
    /// previously stored embeddings.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            self.memory_type.as_str(),
            self.title,
            self.content,
            self.context,
            join_tags(&self.tags),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        Memory {
            id: "m1".into(),
            project_id: "p1".into(),
            session_id: None,
            memory_type: MemoryType::Decision,
            title: "Use JWT".into(),
            content: "Adopt JWT for auth".into(),
            context: "".into(),
            tags: vec!["auth".into(), "security".into()],
            has_embedding: false,
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn embedding_text_composition_is_pinned() {
        let memory = sample();
        assert_eq!(
            memory.embedding_text(),
            "decision\nUse JWT\nAdopt JWT for auth\n\nauth,security"
        );
    }

    #[test]
    fn memory_type_round_trips_through_str() {
        for t in [
            MemoryType::Decision,
            MemoryType::Pattern,
            MemoryType::ErrorSolution,
            MemoryType::Code,
            MemoryType::Documentation,
            MemoryType::Session,
            MemoryType::Task,
        ] {
            assert_eq!(MemoryType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn memory_type_parse_rejects_unknown() {
        assert_eq!(MemoryType::parse("bogus"), None);
    }
}
