use sea_query::{Expr, Order, Query, SqliteQueryBuilder, Values};

use crate::memory::MemoryRow;
use crate::schema::Memories;

/// Column order shared by every SELECT in this module
const COLUMNS: [Memories; 10] = [
    Memories::Id,
    Memories::Title,
    Memories::Category,
    Memories::Type,
    Memories::CreatedAt,
    Memories::Notes,
    Memories::Payload,
    Memories::MimeType,
    Memories::FileName,
    Memories::DurationMs,
];

/// INSERT INTO memories (title, category, type, created_at, notes, payload, mime_type, file_name, duration_ms)
/// VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
///
/// The id column is never written; SQLite assigns it. Unlike the other
/// statements the values are returned separately for binding, so payloads and
/// free text never get spliced into the SQL.
pub fn insert(row: &MemoryRow) -> (String, Values) {
    Query::insert()
        .into_table(Memories::Table)
        .columns([
            Memories::Title,
            Memories::Category,
            Memories::Type,
            Memories::CreatedAt,
            Memories::Notes,
            Memories::Payload,
            Memories::MimeType,
            Memories::FileName,
            Memories::DurationMs,
        ])
        .values_panic([
            row.title.as_str().into(),
            row.category.as_str().into(),
            row.kind.as_str().into(),
            row.created_at.into(),
            row.notes.clone().into(),
            row.payload.clone().into(),
            row.mime_type.clone().into(),
            row.file_name.clone().into(),
            row.duration_ms.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT ... FROM memories ORDER BY created_at DESC, id DESC
pub fn select_all_newest_first() -> String {
    Query::select()
        .columns(COLUMNS)
        .from(Memories::Table)
        .order_by(Memories::CreatedAt, Order::Desc)
        .order_by(Memories::Id, Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM memories WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    Query::select()
        .columns(COLUMNS)
        .from(Memories::Table)
        .and_where(Expr::col(Memories::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM memories WHERE id = ?
pub fn delete_by_id(id: i64) -> String {
    Query::delete()
        .from_table(Memories::Table)
        .and_where(Expr::col(Memories::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM memories
pub fn delete_all() -> String {
    Query::delete()
        .from_table(Memories::Table)
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(*) FROM memories
pub fn count() -> String {
    Query::select()
        .expr(Expr::col(Memories::Id).count())
        .from(Memories::Table)
        .to_string(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_never_names_the_id_column() {
        let row = MemoryRow {
            title: "Trip".into(),
            category: "Travel".into(),
            kind: "text".into(),
            created_at: 1_700_000_000_000,
            notes: Some("We went to the coast".into()),
            ..Default::default()
        };
        let (sql, values) = insert(&row);
        assert!(!sql.contains("\"id\""), "{}", sql);
        assert!(!sql.contains("coast"), "{}", sql);
        assert_eq!(values.0.len(), 9);
    }

    #[test]
    fn listing_orders_newest_first_with_id_tiebreak() {
        let sql = select_all_newest_first();
        let created = sql.find("\"created_at\" DESC").expect("created_at order");
        let id = sql.find("\"id\" DESC").expect("id order");
        assert!(created < id, "{}", sql);
    }
}
