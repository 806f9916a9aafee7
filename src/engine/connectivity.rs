//! # Connectivity Monitor
//!
//! Turns the platform's raw online/offline reports into one debounced
//! boolean and a stream of edge events.
//!
//! A report is committed only after the raw signal has held for the debounce
//! window; an edge is emitted only when the committed value actually changes.
//! A connection that flaps online → offline → online inside the window
//! therefore produces no edge at all.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Committed connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    BecameOnline,
    BecameOffline,
}

#[derive(Debug)]
struct MonitorInner {
    raw_tx: watch::Sender<bool>,
    committed_rx: watch::Receiver<bool>,
    edges: broadcast::Sender<ConnectivityEdge>,
}

/// Debounced online/offline signal
///
/// Cheap to clone; all clones observe the same state. Must be created inside
/// a Tokio runtime. The debounce task ends when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    /// Create a monitor starting in the given state
    pub fn new(initially_online: bool, debounce: Duration) -> Self {
        let (raw_tx, raw_rx) = watch::channel(initially_online);
        let (committed_tx, committed_rx) = watch::channel(initially_online);
        let (edges, _) = broadcast::channel(16);

        tokio::spawn(debounce_loop(raw_rx, committed_tx, edges.clone(), debounce));

        Self {
            inner: Arc::new(MonitorInner {
                raw_tx,
                committed_rx,
                edges,
            }),
        }
    }

    /// Committed connectivity state
    pub fn is_online(&self) -> bool {
        *self.inner.committed_rx.borrow()
    }

    /// Feed a raw platform report
    pub fn report(&self, online: bool) {
        self.inner.raw_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Receive committed edges
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEdge> {
        self.inner.edges.subscribe()
    }

    /// Watch the committed value
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.committed_rx.clone()
    }
}

async fn debounce_loop(
    mut raw_rx: watch::Receiver<bool>,
    committed_tx: watch::Sender<bool>,
    edges: broadcast::Sender<ConnectivityEdge>,
    debounce: Duration,
) {
    loop {
        if raw_rx.changed().await.is_err() {
            return;
        }

        // Restart the window on every further change until the signal holds.
        loop {
            tokio::select! {
                changed = raw_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let value = *raw_rx.borrow_and_update();
        if value == *committed_tx.borrow() {
            tracing::debug!(online = value, "Connectivity flapped back to committed state");
            continue;
        }

        committed_tx.send_replace(value);
        let edge = if value {
            ConnectivityEdge::BecameOnline
        } else {
            ConnectivityEdge::BecameOffline
        };
        tracing::info!(?edge, "Connectivity changed");
        let _ = edges.send(edge);
    }
}
