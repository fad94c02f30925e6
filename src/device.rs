//! Platform seam for capture devices.
//!
//! A [`MediaDevices`] implementation hands out exclusive [`MediaStream`]s.
//! Once its recorder is started a stream pushes [`RecorderEvent`]s into a
//! channel: data chunks in arrival order, then exactly one `Stopped` after a
//! stop request (or when the source runs dry).

use clap::ValueEnum;
use crossbeam_channel::Sender;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::constants::{AUDIO_RECORDING_MIME, VIDEO_RECORDING_MIME};
use crate::memory::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Microphone only
    Audio,
    /// Microphone and camera
    Video,
}

impl CaptureMode {
    pub fn mime_type(&self) -> &'static str {
        match self {
            CaptureMode::Audio => AUDIO_RECORDING_MIME,
            CaptureMode::Video => VIDEO_RECORDING_MIME,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            CaptureMode::Audio => MediaKind::Audio,
            CaptureMode::Video => MediaKind::Video,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Data(Vec<u8>),
    Stopped,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no capture device: {0}")]
    NotFound(String),
    #[error("recorder failed to start: {0}")]
    Recorder(String),
}

/// Source of exclusive capture streams
pub trait MediaDevices {
    type Stream: MediaStream;

    /// Request access to the microphone, plus the camera for video
    fn open(&mut self, mode: CaptureMode) -> Result<Self::Stream, DeviceError>;
}

/// An exclusively held device stream
pub trait MediaStream {
    /// Start delivering recorder events into `events`
    fn start_recorder(
        &mut self,
        mime_type: &str,
        events: Sender<RecorderEvent>,
    ) -> Result<(), DeviceError>;

    /// Ask the recorder to finish; completion arrives as `RecorderEvent::Stopped`
    fn request_stop(&mut self);

    /// Release the underlying device
    fn stop_tracks(&mut self);
}

/// Devices backed by files or FIFOs, e.g. the output of `arecord` or `ffmpeg`
/// written to a named pipe
#[derive(Debug, Clone)]
pub struct FileDevices {
    audio: Option<PathBuf>,
    video: Option<PathBuf>,
    chunk_size: usize,
}

impl FileDevices {
    pub fn new() -> Self {
        Self {
            audio: None,
            video: None,
            chunk_size: 8192,
        }
    }

    pub fn with_source(mut self, mode: CaptureMode, path: impl Into<PathBuf>) -> Self {
        match mode {
            CaptureMode::Audio => self.audio = Some(path.into()),
            CaptureMode::Video => self.video = Some(path.into()),
        }
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for FileDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDevices for FileDevices {
    type Stream = FileStream;

    fn open(&mut self, mode: CaptureMode) -> Result<FileStream, DeviceError> {
        let path = match mode {
            CaptureMode::Audio => self.audio.as_ref(),
            CaptureMode::Video => self.video.as_ref(),
        }
        .ok_or_else(|| DeviceError::NotFound(format!("no {:?} source configured", mode)))?;

        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                DeviceError::PermissionDenied(format!("{}: {}", path.display(), e))
            }
            _ => DeviceError::NotFound(format!("{}: {}", path.display(), e)),
        })?;
        debug!("Opened capture source {}", path.display());

        Ok(FileStream {
            file: Some(file),
            chunk_size: self.chunk_size,
            stop_flag: Arc::new(AtomicBool::new(false)),
            reader: None,
        })
    }
}

pub struct FileStream {
    file: Option<File>,
    chunk_size: usize,
    stop_flag: Arc<AtomicBool>,
    reader: Option<JoinHandle<u64>>,
}

impl MediaStream for FileStream {
    fn start_recorder(
        &mut self,
        _mime_type: &str,
        events: Sender<RecorderEvent>,
    ) -> Result<(), DeviceError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| DeviceError::Recorder("stream already recording".to_string()))?;
        let stop_flag = Arc::clone(&self.stop_flag);
        let chunk_size = self.chunk_size;

        let handle = thread::Builder::new()
            .name("capture-reader".to_string())
            .spawn(move || {
                let mut chunk = vec![0u8; chunk_size];
                let mut bytes_read = 0u64;

                while !stop_flag.load(Ordering::Relaxed) {
                    match file.read(&mut chunk) {
                        Ok(0) => {
                            debug!("Capture source ended");
                            break;
                        }
                        Ok(n) => {
                            bytes_read += n as u64;
                            if events.send(RecorderEvent::Data(chunk[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("Capture read error: {}", e);
                            break;
                        }
                    }
                }

                let _ = events.send(RecorderEvent::Stopped);
                bytes_read
            })
            .map_err(|e| DeviceError::Recorder(e.to_string()))?;

        self.reader = Some(handle);
        Ok(())
    }

    fn request_stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    fn stop_tracks(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.file = None;
        // A reader blocked on an idle FIFO only notices the flag on its next
        // read, so it is detached rather than joined
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                if let Ok(bytes) = handle.join() {
                    debug!("Capture reader released after {} bytes", bytes);
                }
            }
        }
    }
}
