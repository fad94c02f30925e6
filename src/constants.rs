use rand::Rng;

/// Expected database schema version
/// Databases written with a different version are refused on open
pub const EXPECTED_DB_VERSION: &str = "1";

/// Database file stem used when the config does not name one
pub const DEFAULT_DATABASE_NAME: &str = "life-memory-keeper";

/// Sampling interval of the elapsed-time readout while recording
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;

/// MIME type of finalized audio recordings
pub const AUDIO_RECORDING_MIME: &str = "audio/webm";
/// MIME type of finalized video recordings
pub const VIDEO_RECORDING_MIME: &str = "video/webm";
/// MIME type given to uploads whose type cannot be determined
pub const FALLBACK_MIME: &str = "application/octet-stream";

pub const UNTITLED_RECORDING: &str = "Untitled memory";
pub const UNTITLED_TEXT: &str = "Untitled";

/// Generate a unique database ID
/// Written once into metadata when a journal database is created
pub fn generate_db_unique_id() -> String {
    format!(
        "db_{}",
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(12)
            .map(char::from)
            .collect::<String>()
    )
}
