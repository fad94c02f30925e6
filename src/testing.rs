//! Scriptable capture devices for tests and demos.
//!
//! [`StubDevices`] grants or denies access on demand, emits a fixed set of
//! chunks as soon as the recorder starts, and counts every device call in a
//! shared [`StubLog`] so tests can assert on resource handling.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::device::{CaptureMode, DeviceError, MediaDevices, MediaStream, RecorderEvent};

#[derive(Debug, Default)]
pub struct StubLog {
    opened: AtomicUsize,
    stop_requests: AtomicUsize,
    stop_tracks: AtomicUsize,
}

impl StubLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn stop_tracks(&self) -> usize {
        self.stop_tracks.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct StubDevices {
    deny: bool,
    fail_recorder: bool,
    finish_on_stop: bool,
    chunks_on_start: Vec<Vec<u8>>,
    chunks_on_stop: Vec<Vec<u8>>,
    log: Arc<StubLog>,
}

impl StubDevices {
    /// Devices that grant access and emit `chunks_on_start` right away
    pub fn granting(chunks_on_start: Vec<Vec<u8>>) -> Self {
        Self {
            deny: false,
            fail_recorder: false,
            finish_on_stop: true,
            chunks_on_start,
            chunks_on_stop: Vec::new(),
            log: Arc::new(StubLog::default()),
        }
    }

    /// Devices whose access request is always refused
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::granting(Vec::new())
        }
    }

    /// Emit `chunk` when stop is requested, before signalling completion
    pub fn flushing_on_stop(mut self, chunk: Vec<u8>) -> Self {
        self.chunks_on_stop.push(chunk);
        self
    }

    /// Never signal completion after a stop request
    pub fn never_finishing(mut self) -> Self {
        self.finish_on_stop = false;
        self
    }

    /// Grant access but fail to start the recorder
    pub fn failing_recorder(mut self) -> Self {
        self.fail_recorder = true;
        self
    }

    pub fn log(&self) -> Arc<StubLog> {
        Arc::clone(&self.log)
    }
}

impl MediaDevices for StubDevices {
    type Stream = StubStream;

    fn open(&mut self, mode: CaptureMode) -> Result<StubStream, DeviceError> {
        if self.deny {
            return Err(DeviceError::PermissionDenied(format!(
                "{:?} access refused",
                mode
            )));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(StubStream {
            devices: self.clone(),
            events: None,
        })
    }
}

pub struct StubStream {
    devices: StubDevices,
    events: Option<Sender<RecorderEvent>>,
}

impl MediaStream for StubStream {
    fn start_recorder(
        &mut self,
        _mime_type: &str,
        events: Sender<RecorderEvent>,
    ) -> Result<(), DeviceError> {
        if self.devices.fail_recorder {
            return Err(DeviceError::Recorder("stub recorder refused".to_string()));
        }
        for chunk in &self.devices.chunks_on_start {
            let _ = events.send(RecorderEvent::Data(chunk.clone()));
        }
        self.events = Some(events);
        Ok(())
    }

    fn request_stop(&mut self) {
        self.devices.log.stop_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = &self.events {
            for chunk in &self.devices.chunks_on_stop {
                let _ = events.send(RecorderEvent::Data(chunk.clone()));
            }
            if self.devices.finish_on_stop {
                let _ = events.send(RecorderEvent::Stopped);
            }
        }
    }

    fn stop_tracks(&mut self) {
        self.devices.log.stop_tracks.fetch_add(1, Ordering::SeqCst);
        self.events = None;
    }
}
