//! Channel-backed sinks.
//!
//! Connection threads must never block on the host.  A [`ChannelSink`]
//! posts each event into an unbounded Tokio channel and returns
//! immediately; the host drains the receiver on its own task.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::application::{EventSink, HostEvent, RawSink};

/// Forwards host events (or raw chunks) into an unbounded channel.
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: UnboundedSender<T>,
}

impl<T> ChannelSink<T> {
    /// Creates a sink and the receiver that drains it.
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for ChannelSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl EventSink for ChannelSink<HostEvent> {
    fn emit(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped, discarding event");
        }
    }
}

impl RawSink for ChannelSink<Vec<u8>> {
    fn raw(&self, chunk: &[u8]) {
        if self.tx.send(chunk.to_vec()).is_err() {
            trace!("raw receiver dropped, discarding chunk");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sink, mut rx) = ChannelSink::<HostEvent>::new();
        sink.emit(HostEvent::Control {
            name: "Knob CCW",
            count: 3,
        });
        sink.emit(HostEvent::Control {
            name: "Knob CW",
            count: 1,
        });

        assert_eq!(rx.try_recv().unwrap().name(), "Knob CCW");
        assert_eq!(rx.try_recv().unwrap().name(), "Knob CW");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_raw_chunks_are_copied() {
        let (sink, mut rx) = ChannelSink::<Vec<u8>>::new();
        sink.raw(&[34, 99, 162]);
        assert_eq!(rx.try_recv().unwrap(), vec![34, 99, 162]);
    }

    #[test]
    fn test_emit_after_receiver_dropped_does_not_panic() {
        let (sink, rx) = ChannelSink::<HostEvent>::new();
        drop(rx);
        assert!(sink.is_closed());
        sink.emit(HostEvent::Control {
            name: "Dial CW",
            count: 1,
        });
    }
}
