use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Monotonic elapsed-time counter sampled on a background ticker thread.
///
/// `elapsed_ms` is the readout shown while recording and only moves when the
/// ticker fires, so it lags the true elapsed time by up to one interval.
pub struct ElapsedCounter {
    started: Instant,
    sampled_ms: Arc<AtomicU64>,
    stopped_ms: Option<u64>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedCounter {
    pub fn start(interval: Duration) -> Self {
        let started = Instant::now();
        let sampled_ms = Arc::new(AtomicU64::new(0));
        let sampled_clone = Arc::clone(&sampled_ms);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("elapsed-counter".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            sampled_clone.store(millis_since(started), Ordering::Relaxed);
                        }
                        // Sender dropped
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .ok();

        Self {
            started,
            sampled_ms,
            stopped_ms: None,
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Last sampled value in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.sampled_ms.load(Ordering::Relaxed)
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Stop the ticker and return the exact elapsed time; later calls return
    /// the same value
    pub fn stop(&mut self) -> u64 {
        if let Some(elapsed) = self.stopped_ms {
            return elapsed;
        }
        self.stop_tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let elapsed = millis_since(self.started);
        self.sampled_ms.store(elapsed, Ordering::Relaxed);
        self.stopped_ms = Some(elapsed);
        elapsed
    }
}

impl Drop for ElapsedCounter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn millis_since(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
