use thiserror::Error;

/// Errors returned by the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database at '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {version} ({description}) failed: {source}")]
    Migration {
        version: i64,
        description: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database is at schema version {found}, newer than the {supported} this binary supports")]
    UnknownSchemaVersion { found: i64, supported: i64 },

    #[error("no migration to roll back")]
    NothingToRollBack,

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("row could not be decoded: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Query(err)
    }
}
