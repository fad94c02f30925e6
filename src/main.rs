use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, never, select, Receiver};
use fs2::FileExt;
use log::{error, info};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use memory_keeper::capture::{CaptureError, CaptureSession};
use memory_keeper::config::{JournalConfig, Theme};
use memory_keeper::device::{CaptureMode, FileDevices};
use memory_keeper::journal::{CategoryFilter, Draft, Journal, JournalError, MemorySummary};
use memory_keeper::memory::{Category, MemoryContent, MemoryId};
use memory_keeper::store::{MemoryStore, StoreError};

/// How long to wait for the recorder to hand back its data after a stop
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep audio, video, photo and text memories on this device")]
struct Args {
    /// Path to config file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the journal database (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record audio or video from a capture source (file or named pipe)
    Record {
        /// What to capture
        #[arg(short, long, value_enum, default_value = "audio")]
        mode: CaptureMode,

        /// Capture source to read from
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(long, value_enum)]
        category: Option<Category>,

        #[arg(long)]
        notes: Option<String>,

        /// Stop after this many seconds instead of waiting for Enter
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Save an existing audio, video or image file
    Upload {
        file: PathBuf,

        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(long, value_enum)]
        category: Option<Category>,

        #[arg(long)]
        notes: Option<String>,

        /// MIME type of the file (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Save a text entry, such as a recipe
    Text {
        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(long, value_enum)]
        category: Option<Category>,

        /// Entry body
        #[arg(short, long)]
        body: String,
    },
    /// List memories, newest first
    List {
        /// Only show this category
        #[arg(long, value_enum)]
        category: Option<Category>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the categories currently in use
    Categories,
    /// Write a memory's media (or text body) to a file
    Export {
        id: MemoryId,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete a memory permanently
    Delete { id: MemoryId },
    /// Delete every memory on this device
    Clear {
        /// Confirm that all memories should be deleted
        #[arg(long)]
        yes: bool,
    },
    /// Show or set the light/dark theme preference
    Theme {
        #[arg(value_enum)]
        theme: Option<Theme>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => JournalConfig::load(path)?,
        None => JournalConfig::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    let store = match MemoryStore::open(config.database_path()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", storage_notice(&e));
            return Err(e.into());
        }
    };
    let journal = Journal::new(store);
    info!("Theme: {}", journal.theme()?);

    let result = match args.command {
        Command::Record {
            mode,
            input,
            title,
            category,
            notes,
            duration,
        } => {
            let draft = Draft {
                title,
                category,
                notes,
            };
            record(&journal, &config, mode, &input, &draft, duration)
        }
        Command::Upload {
            file,
            title,
            category,
            notes,
            mime,
        } => {
            let draft = Draft {
                title,
                category,
                notes,
            };
            upload(&journal, &file, &draft, mime.as_deref())
        }
        Command::Text {
            title,
            category,
            body,
        } => {
            let draft = Draft {
                title,
                category,
                notes: None,
            };
            match journal.save_text(&draft, &body) {
                Ok(Some(id)) => {
                    println!("Saved! Your entry is memory {} on this device.", id);
                    Ok(())
                }
                Ok(None) => {
                    println!("Nothing to save: title and body are both empty.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::List { category, json } => list(&journal, category, json),
        Command::Categories => journal
            .categories_present()
            .map(|categories| {
                for category in categories {
                    println!("{}", category);
                }
            })
            .map_err(Into::into),
        Command::Export { id, output } => export(&journal, id, &output),
        Command::Delete { id } => journal
            .delete(id)
            .map(|()| println!("Deleted. Memory {} removed from this device.", id))
            .map_err(Into::into),
        Command::Clear { yes } => {
            if !yes {
                Err("refusing to delete all memories without --yes".into())
            } else {
                journal
                    .clear()
                    .map(|count| {
                        println!(
                            "Data cleared. {} memories deleted from {}.",
                            count,
                            journal.store().path().display()
                        )
                    })
                    .map_err(Into::into)
            }
        }
        Command::Theme { theme } => match theme {
            Some(theme) => journal
                .set_theme(theme)
                .map(|()| println!("{} mode enabled", capitalize(theme.as_str())))
                .map_err(Into::into),
            None => journal
                .theme()
                .map(|theme| println!("{}", theme))
                .map_err(Into::into),
        },
    };

    if let Err(e) = &result {
        error!("{}", e);
        if let Some(JournalError::Storage(store_err)) = e.downcast_ref::<JournalError>() {
            eprintln!("{}", storage_notice(store_err));
        }
    }
    result
}

/// User-facing message for a storage failure
fn storage_notice(err: &StoreError) -> String {
    match err {
        StoreError::Full(_) => {
            "Storage is full. Free up some space on this device and try again.".to_string()
        }
        StoreError::Unavailable(_) => {
            "Local storage is unavailable. Check that the data directory is writable.".to_string()
        }
        other => format!("Storage problem: {}", other),
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn record(
    journal: &Journal,
    config: &JournalConfig,
    mode: CaptureMode,
    input: &Path,
    draft: &Draft,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Acquire exclusive lock to prevent two recorders on the same journal
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .map_err(|e| format!("Failed to create data directory '{}': {}", data_dir.display(), e))?;
    let lock_path = data_dir.join("record.lock");
    let lock_file = File::create(&lock_path)
        .map_err(|e| format!("Failed to create lock file '{}': {}", lock_path.display(), e))?;
    lock_file.try_lock_exclusive().map_err(|_| {
        format!(
            "Another instance is already recording. Lock file: {}",
            lock_path.display()
        )
    })?;

    let devices = FileDevices::new().with_source(mode, input);
    let mut session = CaptureSession::with_tick_interval(devices, config.tick_interval());
    if let Err(e) = session.start(mode) {
        if let CaptureError::AccessDenied(_) = e {
            eprintln!("Permission needed: please allow access to {}.", input.display());
        }
        return Err(e.into());
    }

    let enter_rx: Receiver<()> = match duration {
        Some(_) => never(),
        None => {
            println!("Recording... press Enter to stop and save");
            let (tx, rx) = bounded(1);
            thread::spawn(move || {
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
                let _ = tx.send(());
            });
            rx
        }
    };
    let limit = duration.map(Duration::from_secs);
    let started = Instant::now();
    let refresh = config.tick_interval().max(Duration::from_millis(100));

    let finished = loop {
        if let Some(finished) = session.poll() {
            println!();
            info!("Capture source ended before stop");
            break finished;
        }

        let mut stop_now = limit.is_some_and(|limit| started.elapsed() >= limit);
        if !stop_now {
            select! {
                recv(enter_rx) -> _ => stop_now = true,
                default(refresh) => {},
            }
        }

        if stop_now {
            session.stop();
            if let Some(finished) = session.wait(FINALIZE_TIMEOUT) {
                break finished;
            }
            // Keep what the source delivered before it stalled
            match session.finish_now() {
                Some(finished) => {
                    println!("\nRecorder did not finish in time; saving what was captured.");
                    break finished;
                }
                None => return Err("recorder did not finish in time; nothing was saved".into()),
            }
        }

        let kind = session.mode().map_or("", |mode| match mode {
            CaptureMode::Audio => "audio",
            CaptureMode::Video => "video",
        });
        print!("\rRecording {}... {}s", kind, (session.elapsed_ms() + 500) / 1000);
        std::io::stdout().flush().ok();
    };

    let id = journal.save_recording(draft, finished)?;
    println!("\nSaved! Your memory was saved on this device as memory {}.", id);
    Ok(())
}

fn upload(
    journal: &Journal,
    file: &Path,
    draft: &Draft,
    mime: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("'{}' is not a file name", file.display()))?
        .to_string();
    let data = fs::read(file).map_err(|e| format!("Failed to read '{}': {}", file.display(), e))?;

    let id = journal.save_upload(draft, &file_name, mime, data)?;
    println!("Uploaded! Your memory is saved on this device as memory {}.", id);
    Ok(())
}

fn list(
    journal: &Journal,
    category: Option<Category>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = category.map_or(CategoryFilter::All, CategoryFilter::Only);
    let summaries: Vec<MemorySummary> = journal
        .memories(filter)?
        .iter()
        .map(MemorySummary::from)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No memories yet.");
        return Ok(());
    }
    for summary in &summaries {
        let created = DateTime::<Utc>::from_timestamp_millis(summary.created_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| summary.created_at.to_string());
        println!(
            "{:>5}  {}  {:<5}  {:<15}  {}",
            summary.id,
            created,
            summary.kind.label(),
            summary.category,
            summary.title
        );
        if let Some(notes) = &summary.notes {
            println!("       {}", notes.lines().next().unwrap_or_default());
        }
    }
    Ok(())
}

fn export(journal: &Journal, id: MemoryId, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let record = journal
        .get(id)?
        .ok_or_else(|| format!("memory {} does not exist", id))?;
    let bytes = match &record.memory.content {
        MemoryContent::Media { blob, .. } => blob.data.clone(),
        MemoryContent::Text => record
            .memory
            .notes
            .clone()
            .unwrap_or_default()
            .into_bytes(),
    };
    fs::write(output, &bytes)
        .map_err(|e| format!("Failed to write '{}': {}", output.display(), e))?;
    println!("Exported memory {} ({} bytes) to {}", id, bytes.len(), output.display());
    Ok(())
}
