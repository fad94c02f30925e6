use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Memories, Metadata};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS memories (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     title TEXT NOT NULL,
///     category TEXT NOT NULL,
///     type TEXT NOT NULL,
///     created_at INTEGER NOT NULL,
///     notes TEXT,
///     payload BLOB,
///     mime_type TEXT,
///     file_name TEXT,
///     duration_ms INTEGER
/// )
///
/// AUTOINCREMENT keeps ids of deleted rows from being handed out again.
pub fn create_memories_table() -> String {
    Table::create()
        .table(Memories::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Memories::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Memories::Title).string().not_null())
        .col(ColumnDef::new(Memories::Category).string().not_null())
        .col(ColumnDef::new(Memories::Type).string().not_null())
        .col(
            ColumnDef::new(Memories::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .col(ColumnDef::new(Memories::Notes).string().null())
        .col(ColumnDef::new(Memories::Payload).blob().null())
        .col(ColumnDef::new(Memories::MimeType).string().null())
        .col(ColumnDef::new(Memories::FileName).string().null())
        .col(ColumnDef::new(Memories::DurationMs).big_integer().null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at)
pub fn create_memories_created_at_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_memories_created_at")
        .table(Memories::Table)
        .col(Memories::CreatedAt)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category)
pub fn create_memories_category_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_memories_category")
        .table(Memories::Table)
        .col(Memories::Category)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type)
pub fn create_memories_type_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_memories_type")
        .table(Memories::Table)
        .col(Memories::Type)
        .to_string(SqliteQueryBuilder)
}

/// All schema statements in the order they must run
pub fn all() -> [String; 5] {
    [
        create_metadata_table(),
        create_memories_table(),
        create_memories_created_at_index(),
        create_memories_category_index(),
        create_memories_type_index(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memories_table_uses_autoincrement_ids() {
        let sql = create_memories_table();
        assert!(sql.contains("AUTOINCREMENT"), "{}", sql);
        assert!(sql.contains("\"payload\""), "{}", sql);
    }

    #[test]
    fn indexes_are_idempotent() {
        for sql in [
            create_memories_created_at_index(),
            create_memories_category_index(),
            create_memories_type_index(),
        ] {
            assert!(sql.contains("IF NOT EXISTS"), "{}", sql);
        }
    }
}
