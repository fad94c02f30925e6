use sea_query::Iden;

/// Metadata table - key-value store for database configuration and preferences
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Memories table - one row per journal entry
#[derive(Iden)]
pub enum Memories {
    Table,
    Id,
    Title,
    Category,
    Type,
    CreatedAt,
    Notes,
    Payload,
    MimeType,
    FileName,
    DurationMs,
}
