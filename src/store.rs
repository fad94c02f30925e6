//! Durable local persistence of memories.
//!
//! [`MemoryStore`] is opened once and passed by reference to whoever needs it.
//! It exposes exactly the mutations a journal needs: insert, delete by id and
//! delete everything. Records are never updated in place.

use log::{debug, info, warn};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Theme;
use crate::constants::{generate_db_unique_id, EXPECTED_DB_VERSION};
use crate::db::{self, SyncDb};
use crate::memory::{Memory, MemoryId, MemoryRecord, MemoryRow};
use crate::queries::{memories, metadata};

/// SQLite primary result code for "database or disk is full"
const SQLITE_FULL: i64 = 13;

/// Failures of the persistence layer. None of them are programming errors;
/// callers are expected to report them and carry on.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database cannot be opened, read or written
    #[error("local storage is unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    /// The disk or quota is exhausted
    #[error("local storage is full: {0}")]
    Full(#[source] sqlx::Error),
    #[error("stored memory {id} is malformed: {reason}")]
    InvalidRecord { id: i64, reason: String },
    #[error("database schema version '{found}' does not match expected '{expected}'")]
    SchemaMismatch {
        found: String,
        expected: &'static str,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_storage_full(&err) {
            StoreError::Full(err)
        } else {
            StoreError::Unavailable(err)
        }
    }
}

fn is_storage_full(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            // Extended result codes keep the primary code in the low byte
            .map(|code| code & 0xff == SQLITE_FULL)
            .unwrap_or(false),
        // ENOSPC
        sqlx::Error::Io(io_err) => io_err.raw_os_error() == Some(28),
        _ => false,
    }
}

pub struct MemoryStore {
    db: SyncDb,
    path: PathBuf,
}

impl MemoryStore {
    /// Open the journal database at `path`, creating it (and its parent
    /// directory) if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::from(sqlx::Error::Io(e)))?;
        }

        let db = SyncDb::connect(&path)?;
        let store = Self { db, path };
        store.check_version()?;
        info!("Journal database: {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp a new database with version and unique id, or verify the
    /// version of an existing one
    fn check_version(&self) -> Result<(), StoreError> {
        match self.metadata_value(metadata::KEY_VERSION)? {
            Some(found) if found == EXPECTED_DB_VERSION => {
                if self.unique_id()?.is_none() {
                    let unique_id = generate_db_unique_id();
                    warn!("Journal database has no unique id, assigning {}", unique_id);
                    let sql = metadata::insert(metadata::KEY_UNIQUE_ID, &unique_id);
                    self.db
                        .block_on(sqlx::query(&sql).execute(self.db.pool()))?;
                }
                Ok(())
            }
            Some(found) => Err(StoreError::SchemaMismatch {
                found,
                expected: EXPECTED_DB_VERSION,
            }),
            None => {
                let unique_id = generate_db_unique_id();
                debug!("Initialising new journal database {}", unique_id);
                // Both keys land together or not at all
                self.db.block_on(async {
                    let mut tx = self.db.pool().begin().await?;
                    let sql = metadata::insert(metadata::KEY_VERSION, EXPECTED_DB_VERSION);
                    sqlx::query(&sql).execute(&mut *tx).await?;
                    let sql = metadata::insert(metadata::KEY_UNIQUE_ID, &unique_id);
                    sqlx::query(&sql).execute(&mut *tx).await?;
                    tx.commit().await
                })?;
                Ok(())
            }
        }
    }

    fn metadata_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let sql = metadata::select_by_key(key);
        let value = self.db.block_on(
            sqlx::query_scalar::<_, String>(&sql).fetch_optional(self.db.pool()),
        )?;
        Ok(value)
    }

    /// Random id written once when the database was created
    pub fn unique_id(&self) -> Result<Option<String>, StoreError> {
        self.metadata_value(metadata::KEY_UNIQUE_ID)
    }

    /// Persist a new memory and return the id the database assigned to it
    pub fn insert(&self, memory: &Memory) -> Result<MemoryId, StoreError> {
        let row = MemoryRow::from_memory(memory);
        let (sql, values) = memories::insert(&row);
        let result = self.db.block_on(async {
            let query = db::bind_values(sqlx::query(&sql), &values)?;
            query.execute(self.db.pool()).await
        })?;
        let id = result.last_insert_rowid();
        debug!(
            "Inserted memory {} ({}, {} payload bytes)",
            id,
            row.kind,
            row.payload.as_ref().map_or(0, Vec::len)
        );
        Ok(id)
    }

    /// Every memory, newest first
    pub fn list_all(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        let sql = memories::select_all_newest_first();
        let rows = self
            .db
            .block_on(sqlx::query(&sql).fetch_all(self.db.pool()))?;
        rows.iter().map(decode_row).collect()
    }

    pub fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>, StoreError> {
        let sql = memories::select_by_id(id);
        let row = self
            .db
            .block_on(sqlx::query(&sql).fetch_optional(self.db.pool()))?;
        row.as_ref().map(decode_row).transpose()
    }

    /// Remove the memory with `id`; a missing id is not an error
    pub fn delete_by_id(&self, id: MemoryId) -> Result<(), StoreError> {
        let sql = memories::delete_by_id(id);
        let result = self
            .db
            .block_on(sqlx::query(&sql).execute(self.db.pool()))?;
        if result.rows_affected() == 0 {
            debug!("Delete of memory {} matched nothing", id);
        } else {
            debug!("Deleted memory {}", id);
        }
        Ok(())
    }

    /// Remove every memory, returning how many were deleted
    pub fn clear(&self) -> Result<u64, StoreError> {
        let sql = memories::delete_all();
        let result = self
            .db
            .block_on(sqlx::query(&sql).execute(self.db.pool()))?;
        info!("Cleared {} memories", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let sql = memories::count();
        let count = self
            .db
            .block_on(sqlx::query_scalar::<_, i64>(&sql).fetch_one(self.db.pool()))?;
        Ok(count.max(0) as u64)
    }

    pub fn theme(&self) -> Result<Theme, StoreError> {
        Ok(self
            .metadata_value(metadata::KEY_THEME)?
            .map(|value| Theme::from_stored(&value))
            .unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        let sql = metadata::upsert(metadata::KEY_THEME, theme.as_str());
        self.db
            .block_on(sqlx::query(&sql).execute(self.db.pool()))?;
        Ok(())
    }
}

fn decode_row(row: &SqliteRow) -> Result<MemoryRecord, StoreError> {
    let id: i64 = row.try_get("id")?;
    let memory_row = MemoryRow {
        id: Some(id),
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        kind: row.try_get("type")?,
        created_at: row.try_get("created_at")?,
        notes: row.try_get("notes")?,
        payload: row.try_get("payload")?,
        mime_type: row.try_get("mime_type")?,
        file_name: row.try_get("file_name")?,
        duration_ms: row.try_get("duration_ms")?,
    };
    memory_row
        .into_record()
        .map_err(|reason| StoreError::InvalidRecord { id, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Category;

    #[test]
    fn full_disk_is_classified_separately() {
        let io = sqlx::Error::Io(std::io::Error::from_raw_os_error(28));
        assert!(matches!(StoreError::from(io), StoreError::Full(_)));

        let other = sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(matches!(StoreError::from(other), StoreError::Unavailable(_)));
    }

    #[test]
    fn new_database_is_stamped_with_version_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("journal.sqlite")).unwrap();
        let unique_id = store.unique_id().unwrap().unwrap();
        assert!(unique_id.starts_with("db_"));
        assert_eq!(store.count().unwrap(), 0);

        let id = store
            .insert(&Memory::text("Pie", Category::Recipes, 5, "flour"))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get(id).unwrap().is_some());
        assert!(store.get(id + 1).unwrap().is_none());
    }

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("journal.sqlite");
        MemoryStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
