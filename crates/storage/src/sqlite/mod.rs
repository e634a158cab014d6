use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use crate::repository::Storage;

mod certificate_repo;
mod exam_attempt_repo;
mod group_repo;
mod mapping;
mod migrate;
mod notification_repo;
mod progress_repo;

/// One pool shared by every portal repository: lesson progress, exam
/// attempts, learner groups, notifications and certificates.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the portal database at `database_url`.
    ///
    /// Group access rows cascade with their group, so every connection turns
    /// foreign keys on.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the pool cannot be opened or a connection
    /// pragma fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        info!(database_url, "connected to sqlite");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the portal schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Every store over one migrated `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self {
            progress: Arc::new(repo.clone()),
            exam_attempts: Arc::new(repo.clone()),
            groups: Arc::new(repo.clone()),
            notifications: Arc::new(repo.clone()),
            certificates: Arc::new(repo),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_store_shares_one_migrated_database() {
        const URL: &str = "sqlite:file:sqlite_mod_stores?mode=memory&cache=shared";
        let storage = Storage::sqlite(URL).await.unwrap();
        let repo = SqliteRepository::connect(URL).await.unwrap();
        // a second run finds the schema already at the latest version
        repo.migrate().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(repo.pool())
        .await
        .unwrap();
        for table in [
            "certificates",
            "exam_attempts",
            "group_access",
            "learner_groups",
            "lesson_progress",
            "notifications",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
        drop(storage);
    }
}
