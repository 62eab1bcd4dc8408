//! Database initialization and migrations for the coffee-shop backend.
//!
//! Provides `init_db_pool` for creating a connection pool and applying the
//! SQL migrations from the configured directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use app_config::AppConfig;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::fs;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::info;

/// Creates the connection pool and runs migrations.
///
/// # Errors
/// Returns an error if the pool cannot be created, no connection can be
/// obtained, or a migration fails.
pub async fn init_db_pool(cfg: &AppConfig) -> Result<Pool> {
    let pg_config: PgConfig = cfg.db_dsn().parse().context("Failed to parse Postgres DSN")?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(mgr)
        .max_size(cfg.db_pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .context("Failed to create database pool")?;

    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for migrations")?;
    run_migrations(&client, &cfg.migrations_dir).await?;

    Ok(pool)
}

/// `.sql` files of `dir`, sorted by file name.
pub async fn migration_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read migrations directory {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Applies every migration of `migrations_dir` in order.
///
/// Migrations are written to be idempotent, so they run on every start.
pub async fn run_migrations(client: &Client, migrations_dir: &str) -> Result<()> {
    for path in migration_files(migrations_dir).await? {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Applying migration: {}", file_name);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read migration file {file_name}"))?;

        client
            .batch_execute(&content)
            .await
            .with_context(|| format!("Failed to execute migration {file_name}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migration_files_are_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("coffee-migrations-{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        for name in ["0002_seed.sql", "0001_init.sql", "README.md"] {
            fs::write(dir.join(name), "SELECT 1;").await.unwrap();
        }

        let files = migration_files(&dir).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0001_init.sql", "0002_seed.sql"]);

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        assert!(migration_files("definitely/not/here").await.is_err());
    }

    #[tokio::test]
    async fn test_workspace_migrations_exist() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let files = migration_files(dir).await.unwrap();
        assert_eq!(files.len(), 2);
    }
}
