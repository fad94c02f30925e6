//! Entry flows over the memory store: saving a finished recording, an
//! uploaded file, or a text entry, plus the category-filtered listing.

use chrono::Utc;
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::capture::FinishedRecording;
use crate::config::Theme;
use crate::constants::{FALLBACK_MIME, UNTITLED_RECORDING, UNTITLED_TEXT};
use crate::memory::{
    Blob, Category, MediaKind, MediaOrigin, Memory, MemoryContent, MemoryId, MemoryRecord,
    MemoryType,
};
use crate::store::{MemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("cannot save '{file_name}': unsupported file type '{mime_type}' (expected audio, video or image)")]
    UnsupportedUpload {
        file_name: String,
        mime_type: String,
    },
}

/// User-entered fields shared by every entry flow
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub title: String,
    /// None picks the flow's default category
    pub category: Option<Category>,
    pub notes: Option<String>,
}

impl Draft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn in_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn title_or(&self, default: &str) -> String {
        non_blank(&self.title).unwrap_or_else(|| default.to_string())
    }

    fn notes(&self) -> Option<String> {
        self.notes.as_deref().and_then(non_blank)
    }
}

fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }
}

/// Listing view of a memory, without its payload bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemorySummary {
    pub id: MemoryId,
    pub title: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: MemoryType,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub payload_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl From<&MemoryRecord> for MemorySummary {
    fn from(record: &MemoryRecord) -> Self {
        let memory = &record.memory;
        Self {
            id: record.id,
            title: memory.title.clone(),
            category: memory.category,
            kind: memory.memory_type(),
            created_at: memory.created_at,
            notes: memory.notes.clone(),
            mime_type: memory.payload().map(|b| b.mime_type.clone()),
            payload_bytes: memory.payload().map_or(0, Blob::len),
            file_name: memory.file_name().map(str::to_string),
            duration_ms: memory.duration_ms(),
        }
    }
}

/// Guess a MIME type from a file extension, for uploads that arrive untyped
pub fn guess_mime_type(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let mime = match extension.as_str() {
        "webm" => "video/webm",
        "weba" => "audio/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "ogv" => "video/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}

fn system_clock() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct Journal {
    store: MemoryStore,
    clock: Box<dyn Fn() -> i64 + Send>,
}

impl Journal {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            clock: Box::new(system_clock),
        }
    }

    /// Replace the epoch-millisecond clock used to stamp new entries
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn save_recording(
        &self,
        draft: &Draft,
        recording: FinishedRecording,
    ) -> Result<MemoryId, JournalError> {
        let memory = Memory {
            title: draft.title_or(UNTITLED_RECORDING),
            category: draft.category.unwrap_or(Category::Other),
            created_at: (self.clock)(),
            notes: draft.notes(),
            content: MemoryContent::Media {
                kind: recording.mode.media_kind(),
                blob: recording.blob,
                origin: MediaOrigin::Recorded {
                    duration_ms: recording.duration_ms,
                },
            },
        };
        let id = self.store.insert(&memory)?;
        info!("Saved recording '{}' as memory {}", memory.title, id);
        Ok(id)
    }

    /// Save an uploaded file. A missing or blank `mime_type` is guessed from
    /// the file name.
    pub fn save_upload(
        &self,
        draft: &Draft,
        file_name: &str,
        mime_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<MemoryId, JournalError> {
        let mime_type = mime_type
            .and_then(non_blank)
            .or_else(|| guess_mime_type(file_name).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        let kind =
            MediaKind::from_mime(&mime_type).ok_or_else(|| JournalError::UnsupportedUpload {
                file_name: file_name.to_string(),
                mime_type: mime_type.clone(),
            })?;

        let memory = Memory {
            title: draft.title_or(file_name),
            category: draft.category.unwrap_or(Category::Other),
            created_at: (self.clock)(),
            notes: draft.notes(),
            content: MemoryContent::Media {
                kind,
                blob: Blob::new(mime_type, data),
                origin: MediaOrigin::Uploaded {
                    file_name: file_name.to_string(),
                },
            },
        };
        let id = self.store.insert(&memory)?;
        info!("Saved upload '{}' as memory {}", file_name, id);
        Ok(id)
    }

    /// Save a text entry. Returns None without touching the store when both
    /// title and body are blank.
    pub fn save_text(&self, draft: &Draft, body: &str) -> Result<Option<MemoryId>, JournalError> {
        if draft.title.trim().is_empty() && body.trim().is_empty() {
            return Ok(None);
        }
        let memory = Memory {
            title: draft.title_or(UNTITLED_TEXT),
            category: draft.category.unwrap_or(Category::Recipes),
            created_at: (self.clock)(),
            notes: non_blank(body),
            content: MemoryContent::Text,
        };
        let id = self.store.insert(&memory)?;
        info!("Saved text entry '{}' as memory {}", memory.title, id);
        Ok(Some(id))
    }

    pub fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>, JournalError> {
        Ok(self.store.get(id)?)
    }

    /// Memories matching `filter`, newest first
    pub fn memories(&self, filter: CategoryFilter) -> Result<Vec<MemoryRecord>, JournalError> {
        let mut records = self.store.list_all()?;
        records.retain(|record| filter.matches(record.memory.category));
        Ok(records)
    }

    /// Distinct categories in use, in order of their newest memory
    pub fn categories_present(&self) -> Result<Vec<Category>, JournalError> {
        let mut seen = HashSet::new();
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(|record| record.memory.category)
            .filter(|category| seen.insert(*category))
            .collect())
    }

    pub fn delete(&self, id: MemoryId) -> Result<(), JournalError> {
        self.store.delete_by_id(id)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<u64, JournalError> {
        Ok(self.store.clear()?)
    }

    pub fn theme(&self) -> Result<Theme, JournalError> {
        Ok(self.store.theme()?)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), JournalError> {
        self.store.set_theme(theme)?;
        Ok(())
    }
}
