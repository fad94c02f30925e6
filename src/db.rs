use sea_query::{Value, Values};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions,
};
use std::future::Future;
use std::path::Path;
use tokio::runtime::Runtime;

use crate::queries::ddl;

/// Synchronous SQLite database wrapper that owns a runtime for blocking operations.
/// The journal is driven by a single caller, so every call simply blocks on the
/// embedded current-thread runtime.
pub struct SyncDb {
    pool: SqlitePool,
    runtime: Runtime,
}

impl SyncDb {
    /// Open (creating if needed) the database file at `db_path` and make sure
    /// the schema exists
    pub fn connect(db_path: &Path) -> Result<Self, sqlx::Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(sqlx::Error::Io)?;
        let pool = runtime.block_on(async {
            let pool = open_sqlite_pool(db_path).await?;
            init_database_schema(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        })?;
        Ok(Self { pool, runtime })
    }

    /// Block on an async future using the embedded runtime
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Open a file-based connection pool for production use
/// Enables WAL mode and foreign keys, creating the file if it does not exist
pub async fn open_sqlite_pool(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    // One connection: the journal has a single writer
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Create tables and indexes if they do not exist yet
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for sql in ddl::all() {
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

/// Create a database in a fresh temporary directory, for tests
/// Keep the returned TempDir alive for as long as the pool is used
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), sqlx::Error> {
    let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
    let pool = open_sqlite_pool(&dir.path().join("test.sqlite")).await?;
    Ok((pool, dir))
}

/// Bind sea-query values to an sqlx query in placeholder order
pub fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &'q Values,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, sqlx::Error> {
    for value in &values.0 {
        query = match value {
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::BigInt(v) => query.bind(*v),
            Value::Double(v) => query.bind(*v),
            Value::String(v) => query.bind(v.as_ref().map(|s| s.as_str())),
            Value::Bytes(v) => query.bind(v.as_ref().map(|b| b.as_slice())),
            other => {
                return Err(sqlx::Error::Encode(
                    format!("unsupported bind value: {:?}", other).into(),
                ))
            }
        };
    }
    Ok(query)
}
