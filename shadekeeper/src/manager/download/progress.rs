//! Download throughput sampling.
//!
//! A dedicated reporter thread samples a byte counter at a fixed interval
//! and publishes the delta since the previous sample, so the reported speed
//! drops to zero when a transfer stalls even though no chunk arrives to
//! trigger an update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity at which the reporter thread checks for shutdown.
const POLL_GRANULARITY: Duration = Duration::from_millis(50);

/// Background throughput sampler.
///
/// Spawns a thread that calls `sample` once per interval and passes the
/// byte delta (bytes per interval) to `publish`. Stops when dropped.
pub struct ThroughputMeter {
    handle: Option<JoinHandle<()>>,
    done: Arc<AtomicBool>,
}

impl ThroughputMeter {
    /// Start a new throughput meter.
    ///
    /// # Arguments
    ///
    /// * `sample` - Returns the cumulative byte counter
    /// * `publish` - Receives the delta since the previous sample
    /// * `interval` - Sampling interval
    pub fn start<S, P>(sample: S, publish: P, interval: Duration) -> Self
    where
        S: Fn() -> u64 + Send + 'static,
        P: Fn(u64) + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = Arc::clone(&done);

        let handle = thread::spawn(move || {
            let mut last_bytes = sample();
            let mut last_tick = Instant::now();

            while !done_clone.load(Ordering::SeqCst) {
                thread::sleep(POLL_GRANULARITY);
                if last_tick.elapsed() < interval {
                    continue;
                }

                let bytes = sample();
                publish(bytes.saturating_sub(last_bytes));
                last_bytes = bytes;
                last_tick = Instant::now();
            }

            publish(0);
        });

        Self {
            handle: Some(handle),
            done,
        }
    }

    /// Start a meter with the default one-second interval.
    pub fn start_default<S, P>(sample: S, publish: P) -> Self
    where
        S: Fn() -> u64 + Send + 'static,
        P: Fn(u64) + Send + 'static,
    {
        Self::start(sample, publish, Duration::from_secs(1))
    }

    /// Stop the meter and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for ThroughputMeter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
