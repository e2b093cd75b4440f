//! Fixed-delay timer driving `Synchronizer::periodic_tick`
//!
//! The application shell owns one poller per session. Ticks never overlap:
//! the next tick is scheduled after the previous one has finished.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::synchronizer::Synchronizer;

/// Builder for the periodic tick task
pub struct Poller {
    sync: Synchronizer,
    interval: Duration,
    max_ticks: Option<u64>,
}

impl Poller {
    /// Poll at the synchronizer's configured interval.
    pub fn new(sync: Synchronizer) -> Self {
        let interval = sync.config().poll_interval;
        Self {
            sync,
            interval,
            max_ticks: None,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop on its own after `ticks` ticks.
    pub fn max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Spawn the tick loop on the current tokio runtime.
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(run(
            self.sync,
            self.interval.max(Duration::from_millis(1)),
            self.max_ticks,
            cancel.clone(),
            ticks.clone(),
        ));
        PollerHandle {
            cancel,
            ticks,
            task,
        }
    }
}

async fn run(
    sync: Synchronizer,
    period: Duration,
    max_ticks: Option<u64>,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
) {
    info!(?period, "Poller started");
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Poller cancelled");
                break;
            }
            _ = ticker.tick() => {
                if !sync.is_active() {
                    info!("Session over; poller exiting");
                    break;
                }
                sync.periodic_tick().await;
                let done = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                if max_ticks.is_some_and(|max| done >= max) {
                    debug!(ticks = done, "Poller reached tick limit");
                    break;
                }
            }
        }
    }
    info!(ticks = ticks.load(Ordering::SeqCst), "Poller stopped");
}

/// Handle to a running poller
pub struct PollerHandle {
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Token that stops the poller when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel and wait for the loop to exit. A tick already running finishes
    /// first. Returns the number of completed ticks.
    pub async fn stop(self) -> u64 {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to exit on its own. Returns the number of completed ticks.
    pub async fn join(self) -> u64 {
        let _ = self.task.await;
        self.ticks.load(Ordering::SeqCst)
    }
}
