//! Capture session state machine.
//!
//! ```text
//! Idle -> RequestingAccess -> Recording -> Finalizing -> Idle
//!               \-> Idle (access denied)
//! ```
//!
//! `start` and `stop` return immediately. Completion is an explicit event
//! obtained from [`CaptureSession::poll`] or [`CaptureSession::wait`], which
//! yields the finalized [`FinishedRecording`]. The device stream is released
//! exactly once: on completion, on [`CaptureSession::cancel`], or when the
//! session is dropped mid-recording.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, info, warn};
use std::fmt;
use std::mem;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::constants::DEFAULT_TICK_INTERVAL_MS;
use crate::device::{CaptureMode, DeviceError, MediaDevices, MediaStream, RecorderEvent};
use crate::elapsed::ElapsedCounter;
use crate::memory::Blob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    RequestingAccess,
    Recording,
    Finalizing,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::RequestingAccess => "requesting access",
            CaptureState::Recording => "recording",
            CaptureState::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Permission refused or no device; the session is idle again and
    /// `start` may be retried
    #[error("device access denied: {0}")]
    AccessDenied(#[source] DeviceError),
    #[error("capture session is busy ({0})")]
    Busy(CaptureState),
}

/// Result of a completed capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    pub mode: CaptureMode,
    pub blob: Blob,
    pub duration_ms: u64,
}

struct ActiveCapture<S: MediaStream> {
    mode: CaptureMode,
    stream: S,
    released: bool,
    events: Receiver<RecorderEvent>,
    chunks: Vec<Vec<u8>>,
    buffered_bytes: usize,
    counter: ElapsedCounter,
    stop_requested_at: Option<Instant>,
}

impl<S: MediaStream> ActiveCapture<S> {
    /// Drain recorder events into the chunk buffer. With a deadline this
    /// blocks until the deadline for the completion signal. Returns true once
    /// the recorder has stopped.
    fn pump(&mut self, deadline: Option<Instant>) -> bool {
        loop {
            let event = match deadline {
                None => match self.events.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => return false,
                    Err(TryRecvError::Disconnected) => return true,
                },
                Some(deadline) => match self.events.recv_deadline(deadline) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => return false,
                    Err(RecvTimeoutError::Disconnected) => return true,
                },
            };
            match event {
                RecorderEvent::Data(bytes) => {
                    if !bytes.is_empty() {
                        self.buffered_bytes += bytes.len();
                        self.chunks.push(bytes);
                    }
                }
                RecorderEvent::Stopped => return true,
            }
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.stream.stop_tracks();
            self.released = true;
            debug!("Released {:?} capture stream", self.mode);
        }
    }

    fn finalize(mut self) -> FinishedRecording {
        self.release();
        let total_ms = self.counter.stop();
        let duration_ms = match self.stop_requested_at {
            Some(at) => {
                u64::try_from(at.duration_since(self.counter.started()).as_millis())
                    .unwrap_or(total_ms)
            }
            None => total_ms,
        };
        let chunks = mem::take(&mut self.chunks);
        let blob = Blob::new(self.mode.mime_type(), chunks.concat());
        info!(
            "Finalized {:?} recording: {} chunks, {} bytes, {} ms",
            self.mode,
            chunks.len(),
            blob.len(),
            duration_ms
        );
        FinishedRecording {
            mode: self.mode,
            blob,
            duration_ms,
        }
    }
}

impl<S: MediaStream> Drop for ActiveCapture<S> {
    fn drop(&mut self) {
        self.release();
    }
}

enum Phase<S: MediaStream> {
    Idle,
    RequestingAccess,
    Recording(ActiveCapture<S>),
    Finalizing(ActiveCapture<S>),
}

/// One recording interaction with a device stream. Assumes a single caller.
pub struct CaptureSession<D: MediaDevices> {
    devices: D,
    phase: Phase<D::Stream>,
    tick_interval: Duration,
}

impl<D: MediaDevices> CaptureSession<D> {
    pub fn new(devices: D) -> Self {
        Self::with_tick_interval(devices, Duration::from_millis(DEFAULT_TICK_INTERVAL_MS))
    }

    pub fn with_tick_interval(devices: D, tick_interval: Duration) -> Self {
        Self {
            devices,
            phase: Phase::Idle,
            tick_interval,
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::RequestingAccess => CaptureState::RequestingAccess,
            Phase::Recording(_) => CaptureState::Recording,
            Phase::Finalizing(_) => CaptureState::Finalizing,
        }
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    /// Sampled elapsed time of the current recording, 0 when idle
    pub fn elapsed_ms(&self) -> u64 {
        self.active().map_or(0, |active| active.counter.elapsed_ms())
    }

    /// Bytes buffered so far from the current recording
    pub fn buffered_bytes(&self) -> usize {
        self.active().map_or(0, |active| active.buffered_bytes)
    }

    pub fn mode(&self) -> Option<CaptureMode> {
        self.active().map(|active| active.mode)
    }

    fn active(&self) -> Option<&ActiveCapture<D::Stream>> {
        match &self.phase {
            Phase::Recording(active) | Phase::Finalizing(active) => Some(active),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Option<&mut ActiveCapture<D::Stream>> {
        match &mut self.phase {
            Phase::Recording(active) | Phase::Finalizing(active) => Some(active),
            _ => None,
        }
    }

    fn take_active(&mut self) -> Option<ActiveCapture<D::Stream>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(active) | Phase::Finalizing(active) => Some(active),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Acquire the device for `mode` and begin recording
    pub fn start(&mut self, mode: CaptureMode) -> Result<(), CaptureError> {
        let state = self.state();
        if state != CaptureState::Idle {
            return Err(CaptureError::Busy(state));
        }

        self.phase = Phase::RequestingAccess;
        let mut stream = match self.devices.open(mode) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Capture access denied for {:?}: {}", mode, e);
                self.phase = Phase::Idle;
                return Err(CaptureError::AccessDenied(e));
            }
        };

        let (tx, rx) = unbounded();
        if let Err(e) = stream.start_recorder(mode.mime_type(), tx) {
            warn!("Recorder failed to start for {:?}: {}", mode, e);
            stream.stop_tracks();
            self.phase = Phase::Idle;
            return Err(CaptureError::AccessDenied(e));
        }

        info!("Recording {:?} ({})", mode, mode.mime_type());
        self.phase = Phase::Recording(ActiveCapture {
            mode,
            stream,
            released: false,
            events: rx,
            chunks: Vec::new(),
            buffered_bytes: 0,
            counter: ElapsedCounter::start(self.tick_interval),
            stop_requested_at: None,
        });
        Ok(())
    }

    /// Ask the recorder to finalize. Returns false (and does nothing) unless
    /// the session is recording.
    pub fn stop(&mut self) -> bool {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(mut active) => {
                active.stop_requested_at = Some(Instant::now());
                active.stream.request_stop();
                debug!("Stop requested for {:?} recording", active.mode);
                self.phase = Phase::Finalizing(active);
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// Non-blocking check for the completion event
    pub fn poll(&mut self) -> Option<FinishedRecording> {
        let finished = self.active_mut()?.pump(None);
        if finished {
            self.take_active().map(ActiveCapture::finalize)
        } else {
            None
        }
    }

    /// Block up to `timeout` for the completion event
    pub fn wait(&mut self, timeout: Duration) -> Option<FinishedRecording> {
        let deadline = Instant::now() + timeout;
        let finished = self.active_mut()?.pump(Some(deadline));
        if finished {
            self.take_active().map(ActiveCapture::finalize)
        } else {
            None
        }
    }

    /// Finalize with whatever has been buffered so far, without waiting for
    /// the recorder's completion signal. None when nothing is active.
    pub fn finish_now(&mut self) -> Option<FinishedRecording> {
        let active = self.active_mut()?;
        if !active.pump(None) {
            warn!(
                "Recorder for {:?} did not finish; keeping {} bytes buffered so far",
                active.mode, active.buffered_bytes
            );
        }
        self.take_active().map(ActiveCapture::finalize)
    }

    /// Abandon the current recording, releasing the stream and discarding
    /// buffered data. Returns whether anything was active.
    pub fn cancel(&mut self) -> bool {
        match self.take_active() {
            Some(mut active) => {
                info!("Cancelled {:?} recording", active.mode);
                active.release();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubDevices;

    #[test]
    fn stop_outside_recording_is_a_noop() {
        let devices = StubDevices::granting(vec![]);
        let mut session = CaptureSession::new(devices);
        assert!(!session.stop());
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.poll().is_none());
    }

    #[test]
    fn start_while_recording_is_busy() {
        let devices = StubDevices::granting(vec![b"a".to_vec()]);
        let log = devices.log();
        let mut session = CaptureSession::new(devices);
        session.start(CaptureMode::Audio).unwrap();
        assert!(matches!(
            session.start(CaptureMode::Video),
            Err(CaptureError::Busy(CaptureState::Recording))
        ));
        assert_eq!(log.opened(), 1);
    }

    #[test]
    fn second_stop_while_finalizing_is_ignored() {
        let devices = StubDevices::granting(vec![]).never_finishing();
        let mut session = CaptureSession::new(devices);
        session.start(CaptureMode::Audio).unwrap();
        assert!(session.stop());
        assert_eq!(session.state(), CaptureState::Finalizing);
        assert!(!session.stop());
        assert_eq!(session.state(), CaptureState::Finalizing);
    }

    #[test]
    fn wait_times_out_while_recorder_is_still_finalizing() {
        let devices = StubDevices::granting(vec![b"x".to_vec()]).never_finishing();
        let log = devices.log();
        let mut session = CaptureSession::new(devices);
        session.start(CaptureMode::Audio).unwrap();
        session.stop();
        assert!(session.wait(Duration::from_millis(30)).is_none());
        assert_eq!(session.state(), CaptureState::Finalizing);
        assert_eq!(session.buffered_bytes(), 1);
        assert_eq!(log.stop_tracks(), 0);

        assert!(session.cancel());
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(log.stop_tracks(), 1);
        assert!(!session.cancel());
    }

    #[test]
    fn finish_now_keeps_chunks_from_a_stalled_recorder() {
        let devices = StubDevices::granting(vec![b"kept".to_vec()]).never_finishing();
        let log = devices.log();
        let mut session = CaptureSession::new(devices);
        assert!(session.finish_now().is_none());

        session.start(CaptureMode::Video).unwrap();
        session.stop();
        assert!(session.wait(Duration::from_millis(30)).is_none());

        let finished = session.finish_now().unwrap();
        assert_eq!(finished.mode, CaptureMode::Video);
        assert_eq!(finished.blob.data, b"kept".to_vec());
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(log.stop_tracks(), 1);
        assert!(session.finish_now().is_none());
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let devices = StubDevices::granting(vec![b"ab".to_vec(), Vec::new(), b"c".to_vec()]);
        let mut session = CaptureSession::new(devices);
        session.start(CaptureMode::Audio).unwrap();
        session.stop();
        let finished = session.wait(Duration::from_secs(1)).unwrap();
        assert_eq!(finished.blob.data, b"abc".to_vec());
    }

    #[test]
    fn recorder_start_failure_releases_stream() {
        let devices = StubDevices::granting(vec![]).failing_recorder();
        let log = devices.log();
        let mut session = CaptureSession::new(devices);
        assert!(matches!(
            session.start(CaptureMode::Video),
            Err(CaptureError::AccessDenied(DeviceError::Recorder(_)))
        ));
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(log.stop_tracks(), 1);
    }
}
