//! Journal entry types.
//!
//! A [`Memory`] is the only persisted entity. Which optional fields a memory
//! carries is decided by its [`MemoryContent`]: text entries have no payload,
//! media entries always have one, and a media payload either came from a timed
//! recording or from an uploaded file.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier of a persisted memory
pub type MemoryId = i64;

/// Closed set of tags used to classify memories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Early Childhood")]
    EarlyChildhood,
    School,
    Friends,
    Family,
    #[serde(rename = "Funny Stories")]
    FunnyStories,
    Work,
    Travel,
    Hobbies,
    #[serde(rename = "Life Lessons")]
    LifeLessons,
    Recipes,
    Other,
}

impl Category {
    /// Every category, in the order they are offered to the user
    pub const ALL: [Category; 11] = [
        Category::EarlyChildhood,
        Category::School,
        Category::Friends,
        Category::Family,
        Category::FunnyStories,
        Category::Work,
        Category::Travel,
        Category::Hobbies,
        Category::LifeLessons,
        Category::Recipes,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EarlyChildhood => "Early Childhood",
            Category::School => "School",
            Category::Friends => "Friends",
            Category::Family => "Family",
            Category::FunnyStories => "Funny Stories",
            Category::Work => "Work",
            Category::Travel => "Travel",
            Category::Hobbies => "Hobbies",
            Category::LifeLessons => "Life Lessons",
            Category::Recipes => "Recipes",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Stored `type` column of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Audio,
    Video,
    Photo,
    Text,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Audio => "audio",
            MemoryType::Video => "video",
            MemoryType::Photo => "photo",
            MemoryType::Text => "text",
        }
    }

    /// Human readable label used in listings
    pub fn label(&self) -> &'static str {
        match self {
            MemoryType::Audio => "Audio",
            MemoryType::Video => "Video",
            MemoryType::Photo => "Photo",
            MemoryType::Text => "Note",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MemoryType::Audio),
            "video" => Ok(MemoryType::Video),
            "photo" => Ok(MemoryType::Photo),
            "text" => Ok(MemoryType::Text),
            other => Err(format!("unknown memory type '{}'", other)),
        }
    }
}

/// Kinds of memory that carry a binary payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Photo,
}

impl MediaKind {
    /// Classify a MIME type by its top-level type (`audio/*`, `video/*`, `image/*`)
    pub fn from_mime(mime_type: &str) -> Option<MediaKind> {
        let top = mime_type.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            "image" => Some(MediaKind::Photo),
            _ => None,
        }
    }

    pub fn memory_type(&self) -> MemoryType {
        match self {
            MediaKind::Audio => MemoryType::Audio,
            MediaKind::Video => MemoryType::Video,
            MediaKind::Photo => MemoryType::Photo,
        }
    }
}

/// Immutable binary payload tagged with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Where a media payload came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOrigin {
    /// Captured by a timed recording session
    Recorded { duration_ms: u64 },
    /// Uploaded from an existing file
    Uploaded { file_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryContent {
    /// Text-only entry; the body lives in `Memory::notes`
    Text,
    Media {
        kind: MediaKind,
        blob: Blob,
        origin: MediaOrigin,
    },
}

/// A journal entry as created by the caller, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub title: String,
    pub category: Category,
    /// Epoch milliseconds, fixed at creation
    pub created_at: i64,
    pub notes: Option<String>,
    pub content: MemoryContent,
}

impl Memory {
    pub fn text(
        title: impl Into<String>,
        category: Category,
        created_at: i64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            category,
            created_at,
            notes: Some(body.into()),
            content: MemoryContent::Text,
        }
    }

    pub fn memory_type(&self) -> MemoryType {
        match &self.content {
            MemoryContent::Text => MemoryType::Text,
            MemoryContent::Media { kind, .. } => kind.memory_type(),
        }
    }

    pub fn payload(&self) -> Option<&Blob> {
        match &self.content {
            MemoryContent::Text => None,
            MemoryContent::Media { blob, .. } => Some(blob),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.content {
            MemoryContent::Media {
                origin: MediaOrigin::Uploaded { file_name },
                ..
            } => Some(file_name),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match &self.content {
            MemoryContent::Media {
                origin: MediaOrigin::Recorded { duration_ms },
                ..
            } => Some(*duration_ms),
            _ => None,
        }
    }
}

/// A persisted memory together with its store-assigned id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub memory: Memory,
}

/// Flat column view of a memory, as stored in the `memories` table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryRow {
    pub id: Option<i64>,
    pub title: String,
    pub category: String,
    pub kind: String,
    pub created_at: i64,
    pub notes: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub duration_ms: Option<i64>,
}

impl MemoryRow {
    pub fn from_memory(memory: &Memory) -> Self {
        let blob = memory.payload();
        Self {
            id: None,
            title: memory.title.clone(),
            category: memory.category.as_str().to_string(),
            kind: memory.memory_type().as_str().to_string(),
            created_at: memory.created_at,
            notes: memory.notes.clone(),
            payload: blob.map(|b| b.data.clone()),
            mime_type: blob.map(|b| b.mime_type.clone()),
            file_name: memory.file_name().map(str::to_string),
            // Durations beyond i64::MAX ms are not representable in SQLite; clamp
            duration_ms: memory
                .duration_ms()
                .map(|d| i64::try_from(d).unwrap_or(i64::MAX)),
        }
    }

    /// Rebuild the typed record, rejecting column combinations the content
    /// union cannot express
    pub fn into_record(self) -> Result<MemoryRecord, String> {
        let id = self.id.ok_or("row has no id")?;
        let category: Category = self.category.parse()?;
        let kind: MemoryType = self.kind.parse()?;

        let content = match kind {
            MemoryType::Text => {
                if self.payload.is_some() {
                    return Err("text memory carries a payload".to_string());
                }
                if self.file_name.is_some() || self.duration_ms.is_some() {
                    return Err("text memory carries media fields".to_string());
                }
                MemoryContent::Text
            }
            MemoryType::Audio | MemoryType::Video | MemoryType::Photo => {
                let kind = match kind {
                    MemoryType::Audio => MediaKind::Audio,
                    MemoryType::Video => MediaKind::Video,
                    _ => MediaKind::Photo,
                };
                let data = self
                    .payload
                    .ok_or_else(|| format!("{} memory has no payload", self.kind))?;
                let mime_type = self
                    .mime_type
                    .ok_or_else(|| format!("{} memory has no mime type", self.kind))?;
                let origin = match (self.duration_ms, self.file_name) {
                    (Some(duration_ms), None) => MediaOrigin::Recorded {
                        duration_ms: u64::try_from(duration_ms)
                            .map_err(|_| format!("negative duration {}", duration_ms))?,
                    },
                    (None, Some(file_name)) => MediaOrigin::Uploaded { file_name },
                    (Some(_), Some(_)) => {
                        return Err("media memory has both a duration and a file name".to_string())
                    }
                    (None, None) => {
                        return Err("media memory has neither a duration nor a file name".to_string())
                    }
                };
                MemoryContent::Media {
                    kind,
                    blob: Blob::new(mime_type, data),
                    origin,
                }
            }
        };

        Ok(MemoryRecord {
            id,
            memory: Memory {
                title: self.title,
                category,
                created_at: self.created_at,
                notes: self.notes,
                content,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_strings_parse_back() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("Sports".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_as_display_string() {
        let json = serde_json::to_string(&Category::FunnyStories).unwrap();
        assert_eq!(json, "\"Funny Stories\"");
    }

    #[test]
    fn media_kind_from_mime_prefix() {
        assert_eq!(MediaKind::from_mime("audio/webm"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("image/jpeg"), Some(MediaKind::Photo));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn text_row_with_payload_is_rejected() {
        let row = MemoryRow {
            id: Some(3),
            title: "Trip".into(),
            category: "Travel".into(),
            kind: "text".into(),
            created_at: 1,
            payload: Some(vec![1, 2]),
            mime_type: Some("audio/webm".into()),
            ..Default::default()
        };
        assert!(row.into_record().is_err());
    }

    #[test]
    fn recorded_row_round_trips_through_content() {
        let memory = Memory {
            title: "Song".into(),
            category: Category::Family,
            created_at: 42,
            notes: None,
            content: MemoryContent::Media {
                kind: MediaKind::Audio,
                blob: Blob::new("audio/webm", vec![9, 8, 7]),
                origin: MediaOrigin::Recorded { duration_ms: 1500 },
            },
        };
        let mut row = MemoryRow::from_memory(&memory);
        assert_eq!(row.kind, "audio");
        assert_eq!(row.duration_ms, Some(1500));
        assert_eq!(row.file_name, None);

        row.id = Some(7);
        let record = row.into_record().unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.memory, memory);
    }

    #[test]
    fn media_row_needs_exactly_one_origin() {
        let base = MemoryRow {
            id: Some(1),
            title: "Pic".into(),
            category: "Other".into(),
            kind: "photo".into(),
            created_at: 1,
            payload: Some(vec![0]),
            mime_type: Some("image/png".into()),
            ..Default::default()
        };
        assert!(base.clone().into_record().is_err());

        let both = MemoryRow {
            file_name: Some("a.png".into()),
            duration_ms: Some(10),
            ..base.clone()
        };
        assert!(both.into_record().is_err());

        let uploaded = MemoryRow {
            file_name: Some("a.png".into()),
            ..base
        };
        let record = uploaded.into_record().unwrap();
        assert_eq!(record.memory.file_name(), Some("a.png"));
        assert_eq!(record.memory.memory_type(), MemoryType::Photo);
    }
}
