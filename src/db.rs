use anyhow::{Context, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement, Value};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MIGRATIONS_DIR: &str = "migrations";

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url)
        .await
        .context("failed to connect to the database")?;
    Ok(conn)
}

/// Executes each `.sql` file in `dir` once, in filename order.
///
/// Applied files are recorded in `schema_migrations`. Statements are split on `;`,
/// so migration files must not contain semicolons inside a statement.
pub async fn run_migrations(conn: &DatabaseConnection, dir: impl AsRef<Path>) -> Result<usize> {
    let backend = conn.get_database_backend();
    conn.execute(Statement::from_string(
        backend,
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            filename TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    ))
    .await?;

    let mut entries = fs::read_dir(dir.as_ref())
        .await
        .with_context(|| format!("cannot read {}", dir.as_ref().display()))?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension() == Some(OsStr::new("sql")) {
            files.push(path);
        }
    }
    files.sort();

    let mut applied = 0;
    for file in files {
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let seen = conn
            .query_one(Statement::from_sql_and_values(
                backend,
                "SELECT filename FROM schema_migrations WHERE filename = $1",
                [Value::from(filename.clone())],
            ))
            .await?;
        if seen.is_some() {
            continue;
        }

        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            conn.execute(Statement::from_string(backend, format!("{stmt};")))
                .await
                .with_context(|| format!("migration {filename} failed"))?;
        }

        conn.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO schema_migrations (filename) VALUES ($1)",
            [Value::from(filename.clone())],
        ))
        .await?;
        tracing::info!(migration = %filename, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
