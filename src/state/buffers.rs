//! Short-lived in-memory event buffers.
//!
//! These exist to support request-body correlation and late-registering observers; they are
//! never a source of truth for delivery.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::{Cancellable, Clock};
use crate::model::Event;

/// Fixed-capacity ring of the most recently recorded events, oldest dropped on overflow.
///
/// Reads do not clear the buffer, so multiple consumers can observe the same history.
pub struct RecentEventBuffer {
    capacity: usize,
    buffer: Mutex<VecDeque<Event>>,
}

impl RecentEventBuffer {
    /// Create a buffer bounded to the `capacity` most recent entries.
    pub fn new(capacity: usize) -> RecentEventBuffer {
        RecentEventBuffer {
            capacity,
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event, dropping the oldest entry if the buffer is full.
    pub fn push(&self, event: Event) {
        let mut buffer = self.lock();
        buffer.push_back(event);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Buffered events in chronological order (oldest first). Does not clear the buffer.
    pub fn events(&self) -> Vec<Event> {
        self.lock().iter().cloned().collect()
    }

    /// Drop all buffered events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.buffer
            .lock()
            .expect("thread holding buffer lock should not panic")
    }
}

/// Unbounded buffer whose entries each expire independently, a fixed duration after
/// insertion. Each entry schedules its own removal on the injected clock.
///
/// Consuming reads clear the buffer; this buffer hands events that arrived before any
/// observer was registered over to the first consumer.
#[derive(Clone)]
pub struct WindowedEventBuffer {
    inner: Arc<WindowedInner>,
}

struct WindowedInner {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<Vec<WindowedEntry>>,
}

struct WindowedEntry {
    event: Event,
    expiration: Box<dyn Cancellable>,
}

impl WindowedEventBuffer {
    /// Create a buffer whose entries live for `ttl` after insertion.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> WindowedEventBuffer {
        WindowedEventBuffer {
            inner: Arc::new(WindowedInner {
                ttl,
                clock,
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append an event and schedule its expiry.
    pub fn push(&self, event: Event) {
        let inner = Arc::clone(&self.inner);
        let expired = event.clone();
        let expiration = self.inner.clock.schedule(
            self.inner.ttl,
            Box::new(move || {
                let mut entries = inner.lock();
                if let Some(position) = entries.iter().position(|entry| entry.event == expired) {
                    entries.remove(position);
                }
            }),
        );

        self.inner.lock().push(WindowedEntry { event, expiration });
    }

    /// Unexpired events in insertion order. Does not clear the buffer.
    pub fn events(&self) -> Vec<Event> {
        self.inner
            .lock()
            .iter()
            .map(|entry| entry.event.clone())
            .collect()
    }

    /// Take all unexpired events, clearing the buffer and cancelling their expiry timers.
    pub fn consume(&self) -> Vec<Event> {
        self.inner
            .lock()
            .drain(..)
            .map(|entry| {
                entry.expiration.cancel();
                entry.event
            })
            .collect()
    }

    /// Drop all entries and cancel their expiry timers.
    pub fn clear(&self) {
        for entry in self.inner.lock().drain(..) {
            entry.expiration.cancel();
        }
    }

    /// Whether the buffer currently holds no events.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl WindowedInner {
    fn lock(&self) -> MutexGuard<'_, Vec<WindowedEntry>> {
        self.entries
            .lock()
            .expect("thread holding buffer lock should not panic")
    }
}
