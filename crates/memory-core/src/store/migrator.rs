use sqlx::SqlitePool;
use tracing::info;

use super::error::StoreError;

/// One schema version: forward SQL applied at startup, and (for the most
/// recent version only) a reverse SQL to roll it back.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
}

/// Applies embedded migrations in order, each in its own transaction,
/// recording applied versions in `schema_migrations`.
///
/// Deliberately hand-rolled rather than `sqlx::migrate!`: this requires
/// an explicit `down` step for the most recent migration only, which the
/// built-in migrator has no concept of.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies every migration newer than the current schema version.
    /// Fails fast (and leaves the database at the last successfully
    /// applied version) if a migration newer than any this binary knows
    /// about is already recorded.
    pub async fn run(&self, migrations: &[Migration]) -> Result<usize, StoreError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let highest_known = migrations.iter().map(|m| m.version).max().unwrap_or(0);

        if current > highest_known {
            return Err(StoreError::UnknownSchemaVersion {
                found: current,
                supported: highest_known,
            });
        }

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current)
            .collect();

        for migration in &pending {
            self.apply(migration).await?;
            info!(version = migration.version, description = migration.description, "applied migration");
        }

        Ok(pending.len())
    }

    /// Rolls back the single most recent migration, refusing if it has
    /// no `down_sql` or is not actually the current version.
    pub async fn rollback_latest(&self, migrations: &[Migration]) -> Result<(), StoreError> {
        let current = self.current_version().await?;
        let migration = migrations
            .iter()
            .find(|m| m.version == current)
            .ok_or(StoreError::NothingToRollBack)?;
        let down_sql = migration.down_sql.ok_or(StoreError::NothingToRollBack)?;

        let mut tx = self.pool.begin().await?;
        sqlx::raw_sql(down_sql).execute(&mut *tx).await.map_err(|e| {
            StoreError::Migration {
                version: migration.version,
                description: migration.description.to_string(),
                source: e,
            }
        })?;
        sqlx::query("DELETE FROM schema_migrations WHERE version = ?")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn current_version(&self) -> Result<i64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn ensure_migrations_table(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::raw_sql(migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                description: migration.description.to_string(),
                source: e,
            })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// The migrations this binary knows how to apply, in ascending order.
pub fn embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema: projects, memories, memory_tags, sessions, session_tags, session_progress",
        up_sql: include_str!("../../migrations/001_initial_schema.up.sql"),
        down_sql: Some(include_str!("../../migrations/001_initial_schema.down.sql")),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn runs_all_pending_migrations_once() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(pool);
        let applied = migrator.run(&embedded_migrations()).await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(migrator.current_version().await.unwrap(), 1);

        let applied_again = migrator.run(&embedded_migrations()).await.unwrap();
        assert_eq!(applied_again, 0);
    }

    #[tokio::test]
    async fn rollback_latest_reverts_schema_and_version() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(pool);
        migrator.run(&embedded_migrations()).await.unwrap();

        migrator.rollback_latest(&embedded_migrations()).await.unwrap();
        assert_eq!(migrator.current_version().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refuses_to_start_on_unknown_future_schema_version() {
        let pool = memory_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT, description TEXT);
             INSERT INTO schema_migrations (version, description) VALUES (99, 'from-the-future');",
        )
        .execute(&pool)
        .await
        .unwrap();

        let migrator = Migrator::new(pool);
        let result = migrator.run(&embedded_migrations()).await;
        assert!(matches!(result, Err(StoreError::UnknownSchemaVersion { .. })));
    }
}
