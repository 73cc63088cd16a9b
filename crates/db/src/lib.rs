//! SQLite connection factory and migration runner for the school service.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use school_kernel::settings::DatabaseSettings;
use school_kernel::Migration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use time::OffsetDateTime;

/// Open a connection pool for the configured database, creating the file
/// (and its parent directory) when it does not exist yet.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
        .foreign_keys(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {}", settings.url))?;

    tracing::info!(
        target: "school-db",
        url = %settings.url,
        max_connections = settings.max_connections,
        "database pool ready"
    );

    Ok(pool)
}

/// Open a private in-memory database.
///
/// The pool holds exactly one connection that is never recycled, since an
/// in-memory SQLite database lives and dies with its connection.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("failed to open in-memory database")
}

/// Apply every migration that has not been recorded in `_migrations` yet.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn migrate(pool: &SqlitePool, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            module     TEXT NOT NULL,
            id         TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            PRIMARY KEY (module, id)
        );
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create migrations table")?;

    let mut applied = 0;

    for (module, migration) in migrations {
        let already: Option<(String,)> =
            sqlx::query_as("SELECT id FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .context("failed to read migrations table")?;

        if already.is_some() {
            tracing::debug!(target: "school-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;

        sqlx::query("INSERT INTO _migrations (module, id, applied_at) VALUES (?, ?, ?)")
            .bind(module)
            .bind(migration.id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(target: "school-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "books".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE books (id TEXT PRIMARY KEY); CREATE INDEX books_id ON books (id);",
                },
            ),
            (
                "students".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE students (id TEXT PRIMARY KEY);",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = connect_in_memory().await.unwrap();

        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 2);
        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect_in_memory().await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE oops (",
            },
        )];

        assert!(migrate(&pool, &broken).await.is_err());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn file_database_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("school.db");
        let settings = DatabaseSettings {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseSettings::default()
        };

        let pool = connect(&settings).await.unwrap();
        migrate(&pool, &migrations()).await.unwrap();

        assert!(path.exists());
    }
}
