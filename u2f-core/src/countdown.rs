//! Countdown shown while a device ceremony is outstanding.
//!
//! The displayed value is an integer percentage of the budget still left.
//! Each tick re-reads the clock instead of counting ticks, so a late wake-up
//! shows the correct value instead of drifting.

use std::time::Duration;

/// Percentage of `total` remaining after `elapsed`, truncated toward zero.
///
/// Returns 0 once the budget is exhausted or when `total` is zero.
pub fn percent_remaining(elapsed: Duration, total: Duration) -> u8 {
    let total_ms = total.as_millis();
    let elapsed_ms = elapsed.as_millis();
    if total_ms == 0 || elapsed_ms >= total_ms {
        return 0;
    }
    let percent = (total_ms - elapsed_ms) * 100 / total_ms;
    percent.min(100) as u8
}

#[cfg(feature = "runtime")]
pub use timer::CountdownTimer;

#[cfg(feature = "runtime")]
mod timer {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;
    use tracing::{debug, warn};

    use super::percent_remaining;

    /// Self-rescheduling countdown owned by one controller.
    ///
    /// At most one tick sequence is pending at a time. Starting again or
    /// cancelling aborts the previous sequence before it can publish.
    #[derive(Debug)]
    pub struct CountdownTimer {
        tick: Duration,
        percent: Arc<watch::Sender<u8>>,
        pending: Option<JoinHandle<()>>,
    }

    impl CountdownTimer {
        pub fn new(tick: Duration) -> Self {
            let (percent, _) = watch::channel(0);
            Self {
                tick,
                percent: Arc::new(percent),
                pending: None,
            }
        }

        /// Receiver that observes every published percentage.
        pub fn subscribe(&self) -> watch::Receiver<u8> {
            self.percent.subscribe()
        }

        /// Currently displayed percentage (0 when idle).
        pub fn percent(&self) -> u8 {
            *self.percent.borrow()
        }

        pub fn is_running(&self) -> bool {
            self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
        }

        /// Start counting down a budget of `total` that began at `start`.
        ///
        /// Must be called from within a tokio runtime.
        pub fn start(&mut self, start: Instant, total: Duration) {
            self.abort_pending();

            if total.is_zero() {
                warn!("Countdown started with an empty budget");
                self.percent.send_replace(0);
                return;
            }

            if self.percent() == 0 {
                self.percent.send_replace(100);
            }

            let tick = self.tick;
            let percent = Arc::clone(&self.percent);
            debug!(total_ms = total.as_millis() as u64, "Countdown started");

            self.pending = Some(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(tick).await;
                    let left = percent_remaining(start.elapsed(), total);
                    percent.send_replace(left);
                    if left == 0 {
                        debug!("Countdown expired");
                        break;
                    }
                }
            }));
        }

        /// Stop the countdown and reset the display to 0.
        pub fn cancel(&mut self) {
            self.abort_pending();
            self.percent.send_replace(0);
        }

        fn abort_pending(&mut self) {
            if let Some(handle) = self.pending.take() {
                handle.abort();
            }
        }
    }

    impl Drop for CountdownTimer {
        fn drop(&mut self) {
            self.abort_pending();
        }
    }

}
