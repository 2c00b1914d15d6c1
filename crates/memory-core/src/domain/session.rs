use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle state machine:
///
/// ```text
///  (create)─► Active ─(complete)─► Completed
///                │
///                ├─(abort)───────► Aborted
///                │
///                └─(pause)───────► Paused ──(resume)──► Active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Paused,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "active" => Self::Active,
            "completed" => Self::Completed,
            "paused" => Self::Paused,
            "aborted" => Self::Aborted,
            _ => return None,
        })
    }

    /// `true` for the terminal states: `endTime` is set iff status is
    /// one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    Info,
    Milestone,
    Issue,
    Solution,
}

impl ProgressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Milestone => "milestone",
            Self::Issue => "issue",
            Self::Solution => "solution",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "info" => Self::Info,
            "milestone" => Self::Milestone,
            "issue" => Self::Issue,
            "solution" => Self::Solution,
            _ => return None,
        })
    }
}

/// One append-only entry in a session's progress log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub progress_type: ProgressType,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A bounded work interval with an append-only progress log and a
/// terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub task_description: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub progress: Vec<ProgressEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Aborted.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
    }

    #[test]
    fn status_round_trips() {
        for s in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Paused,
            SessionStatus::Aborted,
        ] {
            assert_eq!(SessionStatus::parse(s.as_str()), Some(s));
        }
    }
}
