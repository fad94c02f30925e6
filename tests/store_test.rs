//! # Memory Store Tests
//!
//! These tests exercise the SQLite-backed memory store end to end: id
//! assignment, ordering, deletion semantics and persistence across reopen.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test store_test
//! ```

use memory_keeper::config::Theme;
use memory_keeper::memory::{
    Blob, Category, MediaKind, MediaOrigin, Memory, MemoryContent, MemoryRecord,
};
use memory_keeper::queries::metadata;
use memory_keeper::store::{MemoryStore, StoreError};

/// Helper to open a store in a fresh temporary directory
/// Keep the returned TempDir alive for as long as the store is used
fn open_test_store() -> (MemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(dir.path().join("journal.sqlite")).unwrap();
    (store, dir)
}

fn audio_memory(title: &str, created_at: i64, bytes: &[u8]) -> Memory {
    Memory {
        title: title.to_string(),
        category: Category::Family,
        created_at,
        notes: Some("recorded at the table".to_string()),
        content: MemoryContent::Media {
            kind: MediaKind::Audio,
            blob: Blob::new("audio/webm", bytes.to_vec()),
            origin: MediaOrigin::Recorded { duration_ms: 3200 },
        },
    }
}

fn photo_memory(title: &str, created_at: i64) -> Memory {
    Memory {
        title: title.to_string(),
        category: Category::Travel,
        created_at,
        notes: None,
        content: MemoryContent::Media {
            kind: MediaKind::Photo,
            blob: Blob::new("image/png", vec![0x89, b'P', b'N', b'G', 0, 0, 0xff]),
            origin: MediaOrigin::Uploaded {
                file_name: "beach.png".to_string(),
            },
        },
    }
}

#[test]
fn test_trip_scenario() {
    let (store, _guard) = open_test_store();
    let t = 1_730_000_000_000i64;
    let memory = Memory::text("Trip", Category::Travel, t, "We went to the coast");

    let id = store.insert(&memory).unwrap();
    assert_eq!(id, 1);

    let all = store.list_all().unwrap();
    assert_eq!(
        all,
        vec![MemoryRecord {
            id: 1,
            memory: memory.clone()
        }]
    );

    store.delete_by_id(1).unwrap();
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_inserted_fields_come_back_exactly() {
    let (store, _guard) = open_test_store();
    let audio = audio_memory("Grandpa's song", 1_000, &[0, 1, 2, 255, b'\'', b'\n']);
    let photo = photo_memory("Beach", 2_000);
    let text = Memory::text(
        "Grandma's \"famous\" pie",
        Category::Recipes,
        3_000,
        "Ingredients\n- 2 apples\n- 1 cup flour\n\nSteps\n1. Preheat oven",
    );

    let audio_id = store.insert(&audio).unwrap();
    let photo_id = store.insert(&photo).unwrap();
    let text_id = store.insert(&text).unwrap();

    assert_eq!(store.get(audio_id).unwrap().unwrap().memory, audio);
    assert_eq!(store.get(photo_id).unwrap().unwrap().memory, photo);
    assert_eq!(store.get(text_id).unwrap().unwrap().memory, text);
}

#[test]
fn test_ids_are_fresh_and_never_reused() {
    let (store, _guard) = open_test_store();
    let first = store.insert(&Memory::text("a", Category::Other, 1, "a")).unwrap();
    let second = store.insert(&Memory::text("b", Category::Other, 2, "b")).unwrap();
    assert_ne!(first, second);

    store.delete_by_id(second).unwrap();
    let third = store.insert(&Memory::text("c", Category::Other, 3, "c")).unwrap();
    assert!(third > second, "id {} reused after delete", third);
}

#[test]
fn test_list_all_is_newest_first() {
    let (store, _guard) = open_test_store();
    // Inserted out of order, with a tie on created_at
    for (title, created_at) in [("b", 200), ("a", 100), ("d", 400), ("c", 200), ("e", 50)] {
        store
            .insert(&Memory::text(title, Category::School, created_at, title))
            .unwrap();
    }

    let all = store.list_all().unwrap();
    let created: Vec<i64> = all.iter().map(|r| r.memory.created_at).collect();
    assert_eq!(created, vec![400, 200, 200, 100, 50]);
    for pair in all.windows(2) {
        assert!(pair[0].memory.created_at >= pair[1].memory.created_at);
    }
    // Ties come back with the later insert first
    assert_eq!(all[1].memory.title, "c");
    assert_eq!(all[2].memory.title, "b");
}

#[test]
fn test_delete_missing_id_is_noop() {
    let (store, _guard) = open_test_store();
    store.insert(&Memory::text("keep", Category::Work, 1, "x")).unwrap();
    let before = store.list_all().unwrap();

    store.delete_by_id(9999).unwrap();
    store.delete_by_id(-1).unwrap();

    assert_eq!(store.list_all().unwrap(), before);
}

#[test]
fn test_delete_removes_exactly_one_record() {
    let (store, _guard) = open_test_store();
    let ids: Vec<i64> = (0..4)
        .map(|i| {
            store
                .insert(&Memory::text(format!("m{}", i), Category::Friends, i, "x"))
                .unwrap()
        })
        .collect();

    store.delete_by_id(ids[2]).unwrap();

    let remaining: Vec<i64> = store.list_all().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![ids[3], ids[1], ids[0]]);
}

#[test]
fn test_clear_removes_everything() {
    let (store, _guard) = open_test_store();
    store.insert(&audio_memory("one", 1, b"1")).unwrap();
    store.insert(&photo_memory("two", 2)).unwrap();

    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.list_all().unwrap().is_empty());
    assert_eq!(store.clear().unwrap(), 0);
}

#[test]
fn test_records_and_theme_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite");

    let unique_id = {
        let store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.theme().unwrap(), Theme::Light);
        store.set_theme(Theme::Dark).unwrap();
        store.insert(&audio_memory("kept", 10, b"abc")).unwrap();
        store.unique_id().unwrap()
    };

    let store = MemoryStore::open(&path).unwrap();
    assert_eq!(store.theme().unwrap(), Theme::Dark);
    assert_eq!(store.unique_id().unwrap(), unique_id);
    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].memory, audio_memory("kept", 10, b"abc"));

    store.set_theme(Theme::Light).unwrap();
    assert_eq!(store.theme().unwrap(), Theme::Light);
}

#[test]
fn test_foreign_schema_version_is_refused() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite");

    rt.block_on(async {
        let pool = memory_keeper::db::open_sqlite_pool(&path).await.unwrap();
        memory_keeper::db::init_database_schema(&pool).await.unwrap();
        let sql = metadata::insert(metadata::KEY_VERSION, "999");
        sqlx::query(&sql).execute(&pool).await.unwrap();
        pool.close().await;
    });

    match MemoryStore::open(&path) {
        Err(StoreError::SchemaMismatch { found, .. }) => assert_eq!(found, "999"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("store opened a database with a foreign schema version"),
    }
}

#[test]
fn test_missing_unique_id_is_assigned_on_open() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite");

    // Version stamped but the unique id never written
    rt.block_on(async {
        let pool = memory_keeper::db::open_sqlite_pool(&path).await.unwrap();
        memory_keeper::db::init_database_schema(&pool).await.unwrap();
        let sql = metadata::insert(metadata::KEY_VERSION, memory_keeper::EXPECTED_DB_VERSION);
        sqlx::query(&sql).execute(&pool).await.unwrap();
        pool.close().await;
    });

    let unique_id = {
        let store = MemoryStore::open(&path).unwrap();
        store.unique_id().unwrap().expect("unique id should be assigned")
    };
    assert!(unique_id.starts_with("db_"));

    // Assigned once, then kept
    let store = MemoryStore::open(&path).unwrap();
    assert_eq!(store.unique_id().unwrap(), Some(unique_id));
}

#[test]
fn test_malformed_rows_surface_as_invalid_record() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite");
    drop(MemoryStore::open(&path).unwrap());

    rt.block_on(async {
        let pool = memory_keeper::db::open_sqlite_pool(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO memories (title, category, type, created_at, payload, mime_type) \
             VALUES ('bad', 'Other', 'text', 1, x'00', 'audio/webm')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    });

    let store = MemoryStore::open(&path).unwrap();
    assert!(matches!(
        store.list_all(),
        Err(StoreError::InvalidRecord { id: 1, .. })
    ));
}

#[test]
fn test_unwritable_location_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the parent directory should be
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    match MemoryStore::open(blocker.join("journal.sqlite")) {
        Err(StoreError::Unavailable(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("store opened beneath a regular file"),
    }
}
