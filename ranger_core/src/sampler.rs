//! Background range sampling.
//!
//! Spawns a thread that owns the [`RangeSession`], drives `next_range`, and
//! publishes samples through a bounded channel; tracks the last-ok timestamp
//! for stall detection. Owning the session on the thread is also the
//! serialization guarantee: the device never sees interleaved trigger/read
//! cycles from two callers.
//!
//! Safety: each `RangeSampler` spawns exactly one thread, shut down when the
//! sampler is dropped.

use crate::sample::RangeSample;
use crate::session::RangeSession;
use crossbeam_channel as xch;
use ranger_traits::{Clock, RegisterBus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct RangeSampler {
    rx: xch::Receiver<RangeSample>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl RangeSampler {
    /// Take ownership of the session and sample it from a dedicated thread.
    ///
    /// `next_range` already paces itself against the session's clock, so the
    /// loop adds no extra sleeps; a timeout or transport error is logged and
    /// the loop keeps going — the consumer watchdogs via
    /// [`stalled_for`](Self::stalled_for).
    pub fn spawn<B, C>(mut session: RangeSession<B>, clock: C) -> Self
    where
        B: RegisterBus + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match session.next_range() {
                    Ok(sample) => {
                        match tx.try_send(sample) {
                            Ok(()) => {}
                            // Consumer is behind; drop the sample rather
                            // than block with the shutdown flag unchecked.
                            Err(xch::TrySendError::Full(_)) => {}
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!(
                                    "sampler consumer disconnected, exiting thread"
                                );
                                break;
                            }
                        }
                        let now = clock.ms_since(epoch);
                        last_ok_clone.store(now, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "background range read failed");
                        // Back off so a persistent failure cannot spin the
                        // bus hot.
                        clock.sleep(Duration::from_millis(5));
                    }
                }
            }
            let _ = session.stop();
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent sample, if any arrived since the last call.
    pub fn latest(&self) -> Option<RangeSample> {
        self.rx.try_iter().last()
    }

    /// Milliseconds since the last successful sample, given the caller's
    /// notion of "now" relative to this sampler's epoch.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Convenience helper: compute the stall using this sampler's epoch and
    /// a real monotonic clock.
    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = {
            let dur = Instant::now().saturating_duration_since(self.epoch);
            let ms = dur.as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
}

impl Drop for RangeSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits immediately if it is between reads, or after the
        // current next_range completes (bounded by the session's poll
        // budget, ~150 ms worst case).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("sampler thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "sampler thread panicked during shutdown");
                }
            }
        }
    }
}
