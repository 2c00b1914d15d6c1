//! Relational Store: persists Projects, Memories, Sessions,
//! and the schema-migration record, backed by SQLite via `sqlx`.

mod error;
mod memories;
mod migrator;
mod projects;
mod rows;
mod sessions;

pub use error::StoreError;
pub use memories::MemoryFilter;
pub use migrator::{embedded_migrations, Migration, Migrator};
pub use sessions::SessionFilter;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Owns the SQLite connection pool and exposes per-entity CRUD as inherent
/// methods (implemented across `projects.rs`/`memories.rs`/`sessions.rs`).
/// One `RelationalStore` per process, opened and migrated once at startup.
#[derive(Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Opens (creating if absent) the SQLite file at `path` and applies
    /// every pending migration. A migration failure aborts startup —
    /// propagated here, not swallowed.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| StoreError::Open {
                path: path.display().to_string(),
                source: e,
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open {
                path: path.display().to_string(),
                source: e,
            })?;

        let store = Self { pool };
        let migrator = Migrator::new(store.pool.clone());
        migrator.run(&embedded_migrations()).await?;
        Ok(store)
    }

    /// Wraps an already-open pool (used by tests with `sqlite::memory:`),
    /// running migrations the same way `connect` does.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        let migrator = Migrator::new(store.pool.clone());
        migrator.run(&embedded_migrations()).await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// SQLite's default compiled-in limit on bound parameters per statement;
/// batch `IN (...)` queries respect this.
pub const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;
