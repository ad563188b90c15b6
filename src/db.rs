use anyhow::{Context, Result};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement,
    TransactionTrait,
};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MIGRATIONS_DIR: &str = "migrations";

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Applies every `*.sql` file in `migrations/` not yet recorded in
/// `schema_migrations`, in filename order. Returns the names applied.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<Vec<String>> {
    run_migrations_from(conn, Path::new(MIGRATIONS_DIR)).await
}

pub async fn run_migrations_from(conn: &DatabaseConnection, dir: &Path) -> Result<Vec<String>> {
    let backend = conn.get_database_backend();
    conn.execute(Statement::from_string(
        backend,
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version VARCHAR(255) PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ))
    .await?;

    let placeholder = match backend {
        DatabaseBackend::Postgres => "$1",
        _ => "?",
    };

    let mut applied = Vec::new();
    for file in migration_files(dir).await? {
        let version = file
            .file_name()
            .and_then(|name| name.to_str())
            .context("migration file name is not valid UTF-8")?
            .to_string();

        let seen = conn
            .query_one(Statement::from_sql_and_values(
                backend,
                format!("SELECT version FROM schema_migrations WHERE version = {placeholder}"),
                [version.clone().into()],
            ))
            .await?;
        if seen.is_some() {
            continue;
        }

        tracing::info!(%version, "applying migration");
        let sql = fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;

        let txn = conn.begin().await?;
        // Postgres prepared statements cannot contain multiple commands.
        for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            txn.execute(Statement::from_string(backend, format!("{stmt};")))
                .await
                .with_context(|| format!("{version}: {stmt}"))?;
        }
        txn.execute(Statement::from_sql_and_values(
            backend,
            format!("INSERT INTO schema_migrations (version) VALUES ({placeholder})"),
            [version.clone().into()],
        ))
        .await?;
        txn.commit().await?;

        applied.push(version);
    }

    Ok(applied)
}

async fn migration_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
