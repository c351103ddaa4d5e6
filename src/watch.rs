//! Watch runtime: drains the vault's raw event stream into bursts.
//!
//! A burst opens on the first event and closes after a quiet window with
//! no further events, or when the max window elapses, whichever comes
//! first. Closing hands the burst to the library; the loop then waits for
//! the next first event. Dispatch failures inside a burst are logged and
//! the loop keeps running.

use crate::error::LibraryError;
use crate::events::VaultEvent;
use crate::library::Library;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

pub struct WatchRuntime {
    library: Arc<Library>,
    quiet_window: Duration,
    max_window: Duration,
    running: AtomicBool,
}

impl WatchRuntime {
    pub fn new(library: Arc<Library>) -> Self {
        let config = library.config();
        Self {
            quiet_window: Duration::from_millis(config.quiet_window_ms),
            max_window: Duration::from_millis(config.max_window_ms),
            library,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a stop; takes effect at the next burst boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drain `events` until the stream closes or `stop` is called. A
    /// burst in flight when the stream closes is still flushed.
    pub async fn run(&self, mut events: UnboundedReceiver<VaultEvent>) -> Result<(), LibraryError> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            quiet_ms = self.quiet_window.as_millis() as u64,
            max_ms = self.max_window.as_millis() as u64,
            "Watch runtime started"
        );

        while self.running.load(Ordering::SeqCst) {
            let Some(first) = events.recv().await else {
                break;
            };
            let mut closed = false;
            let burst = self.collect_burst(first, &mut events, &mut closed).await;
            self.flush(burst).await?;
            if closed {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Watch runtime stopped");
        Ok(())
    }

    async fn collect_burst(
        &self,
        first: VaultEvent,
        events: &mut UnboundedReceiver<VaultEvent>,
        closed: &mut bool,
    ) -> Vec<VaultEvent> {
        let opened = Instant::now();
        let mut burst = vec![first];
        loop {
            let elapsed = opened.elapsed();
            if elapsed >= self.max_window {
                debug!(events = burst.len(), "Burst hit the max window");
                break;
            }
            let wait = self.quiet_window.min(self.max_window - elapsed);
            match timeout(wait, events.recv()).await {
                Ok(Some(event)) => burst.push(event),
                Ok(None) => {
                    *closed = true;
                    break;
                }
                // Quiet window elapsed without a new event.
                Err(_) => break,
            }
        }
        burst
    }

    async fn flush(&self, burst: Vec<VaultEvent>) -> Result<(), LibraryError> {
        match self.library.handle_burst(burst).await {
            Ok(summary) => {
                debug!(?summary, "Flushed burst");
                Ok(())
            }
            Err(LibraryError::Dispatch(failures)) => {
                warn!(failures = failures.len(), "Burst dispatch had failures");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }
}
