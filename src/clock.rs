//! Wall time and cancellable timers, abstracted so tests can control time.
use std::sync::mpsc::{RecvTimeoutError, SyncSender};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Handle to a scheduled task. Dropping the handle also cancels the task.
pub trait Cancellable: Send {
    /// Cancel the scheduled task. Cancelling an already-fired or already-cancelled task is a
    /// no-op.
    fn cancel(&self);
}

/// Source of wall time and one-shot timers.
///
/// Everything in this crate that needs "now" or "later" goes through a `Clock`, so tests can
/// substitute a virtual implementation and advance time deterministically.
pub trait Clock: Send + Sync {
    /// Current wall time as epoch milliseconds.
    fn now_millis(&self) -> i64;

    /// Format an epoch-milliseconds timestamp as an ISO 8601 string in UTC.
    fn iso_time(&self, millis: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|time| time.format("%Y-%m-%dT%H:%M:%S%z").to_string())
            .unwrap_or_default()
    }

    /// Run `task` after `delay`, returning a handle that can cancel it before it fires.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn Cancellable>;
}

/// [`Clock`] backed by the system clock and one thread per scheduled task.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn Cancellable> {
        // Using `sync_channel` here as it makes the cancel handle `Sync` (shareable between
        // threads). Buffer size of 1 is enough: we only ever send one cancel command, and
        // `try_send` ignores the case where a cancel was already delivered.
        let (cancel_sender, cancel_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let spawned = std::thread::Builder::new()
            .name("beacon-timer".to_owned())
            .spawn(move || match cancel_receiver.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => task(),
                // A cancel command, or the handle was dropped. Either way, don't fire.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });

        if let Err(err) = spawned {
            log::error!(target: "beacon", "failed to spawn timer thread: {err}");
        }

        Box::new(TimerHandle {
            cancel_sender,
        })
    }
}

struct TimerHandle {
    cancel_sender: SyncSender<()>,
}

impl Cancellable for TimerHandle {
    fn cancel(&self) {
        // Error means the timer thread already exited (fired or cancelled), or a cancel command
        // is already buffered. Nothing useful to do in either case.
        let _ = self.cancel_sender.try_send(());
    }
}
