//! # Sync Scheduler
//!
//! Timing for content synchronization: the cancellable periodic timer and the
//! gate that spaces out forced syncs.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Cancellable periodic task
///
/// Cancelling (or dropping) the handle stops future ticks. A tick already
/// running finishes first.
#[derive(Debug)]
pub struct PeriodicHandle {
    handle: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
    interval: Duration,
}

impl PeriodicHandle {
    /// Run `tick` every `interval`; the first run is one interval from now
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {}
                }
                tick().await;
            }
        });

        Self {
            handle: Some(handle),
            stop,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop ticking without waiting for a running tick
    pub fn cancel(&mut self) {
        self.stop.send_replace(true);
        if self.handle.take().is_some() {
            tracing::debug!(interval = ?self.interval, "Periodic task cancelled");
        }
    }

    /// Stop ticking and wait for a running tick to finish
    pub async fn shutdown(&mut self) {
        self.stop.send_replace(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Periodic task ended abnormally");
            }
            tracing::debug!(interval = ?self.interval, "Periodic task stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Minimum spacing between forced syncs
#[derive(Debug)]
pub struct ForcedSyncGate {
    last_forced: Mutex<Option<Instant>>,
    min_gap: Duration,
}

impl ForcedSyncGate {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            last_forced: Mutex::new(None),
            min_gap,
        }
    }

    /// Claim the gate; false if the previous forced sync was too recent
    pub async fn try_acquire(&self) -> bool {
        let mut last_forced = self.last_forced.lock().await;
        let now = Instant::now();
        match *last_forced {
            Some(at) if now.duration_since(at) < self.min_gap => false,
            _ => {
                *last_forced = Some(now);
                true
            }
        }
    }

    /// Time until the gate opens again
    pub async fn time_until_open(&self) -> Duration {
        match *self.last_forced.lock().await {
            Some(at) => self.min_gap.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}
