//! Recording sink for tests.
//!
//! Captures every host event and raw chunk so tests can assert on what a
//! listener delivered, without a channel or an async runtime.  Events are
//! produced on connection threads, so tests wait for them with
//! [`RecordingSink::wait_for_events`].

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::application::{EventSink, HostEvent, RawSink};

#[derive(Default)]
struct Recorded {
    events: Vec<HostEvent>,
    raw: Vec<Vec<u8>>,
}

/// An [`EventSink`] and [`RawSink`] that records everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    recorded: Mutex<Recorded>,
    changed: Condvar,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in arrival order.
    pub fn events(&self) -> Vec<HostEvent> {
        self.recorded.lock().events.clone()
    }

    /// Only the control events, as `(name, count)` pairs.
    pub fn control_events(&self) -> Vec<(&'static str, u32)> {
        self.recorded
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Control { name, count } => Some((*name, *count)),
                _ => None,
            })
            .collect()
    }

    /// All raw chunks received so far.
    pub fn raw_chunks(&self) -> Vec<Vec<u8>> {
        self.recorded.lock().raw.clone()
    }

    /// Blocks until at least `n` events have been recorded or `timeout`
    /// elapses, then returns the events recorded so far.
    pub fn wait_for_events(&self, n: usize, timeout: Duration) -> Vec<HostEvent> {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.recorded.lock();
        while recorded.events.len() < n {
            if self.changed.wait_until(&mut recorded, deadline).timed_out() {
                break;
            }
        }
        recorded.events.clone()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        let mut recorded = self.recorded.lock();
        recorded.events.clear();
        recorded.raw.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: HostEvent) {
        self.recorded.lock().events.push(event);
        self.changed.notify_all();
    }
}

impl RawSink for RecordingSink {
    fn raw(&self, chunk: &[u8]) {
        self.recorded.lock().raw.push(chunk.to_vec());
        self.changed.notify_all();
    }
}
