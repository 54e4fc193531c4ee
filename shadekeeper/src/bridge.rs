//! Streaming progress snapshots to asynchronous observers.
//!
//! Install sessions run on blocking worker threads and publish their
//! progress into shared status values. A [`ProgressBridge`] samples such a
//! status at a fixed interval and forwards each snapshot over an `mpsc`
//! channel until the session reaches a terminal state. Sampling only reads;
//! it never changes session state.
//!
//! ```ignore
//! let handle = session.start(request)?;
//! let mut rx = ProgressBridge::new(handle.status()).spawn(CancellationToken::new());
//! while let Some(progress) = rx.recv().await {
//!     println!("{}/{}", progress.downloaded_bytes, progress.total_bytes);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::manager::{FrameworkProgress, FrameworkStatus, DEFAULT_PROGRESS_INTERVAL};
use crate::package::{PackageProgress, PackageStatus};

/// Channel capacity; a slow observer drops nothing, it just delays sampling.
const CHANNEL_CAPACITY: usize = 16;

/// A status value that can be sampled for progress.
pub trait ProgressSource: Send + Sync + 'static {
    /// The snapshot type sent to observers.
    type Snapshot: Clone + Send + 'static;

    /// Take a snapshot.
    fn snapshot(&self) -> Self::Snapshot;

    /// Whether the session behind this status has stopped.
    fn is_terminal(&self) -> bool;
}

impl ProgressSource for FrameworkStatus {
    type Snapshot = FrameworkProgress;

    fn snapshot(&self) -> FrameworkProgress {
        FrameworkStatus::snapshot(self)
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

impl ProgressSource for PackageStatus {
    type Snapshot = PackageProgress;

    fn snapshot(&self) -> PackageProgress {
        PackageStatus::snapshot(self)
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

/// Periodic sampler forwarding snapshots of a [`ProgressSource`].
pub struct ProgressBridge<S: ProgressSource> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: ProgressSource> ProgressBridge<S> {
    /// Create a bridge sampling at [`DEFAULT_PROGRESS_INTERVAL`].
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set the sampling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the sampler on the current runtime and return the receiving end.
    ///
    /// The channel closes after the terminal snapshot, when `cancellation`
    /// fires, or when the receiver is dropped.
    pub fn spawn(self, cancellation: CancellationToken) -> mpsc::Receiver<S::Snapshot> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(self.run(tx, cancellation));
        rx
    }

    /// Sample until the source is terminal, then send one final snapshot.
    pub async fn run(self, tx: mpsc::Sender<S::Snapshot>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    tracing::debug!("Progress bridge stopped by observer");
                    break;
                }

                _ = ticker.tick() => {
                    // Read terminal first so the snapshot sent is never older
                    // than the decision to stop.
                    let terminal = self.source.is_terminal();
                    if tx.send(self.source.snapshot()).await.is_err() {
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
            }
        }
    }
}
