//! The event contract between the server and its embedding host.
//!
//! The host receives two kinds of events through its event callback:
//!
//! - control events: `(name, count)`, e.g. `("Knob CW", 3)`;
//! - lifecycle events: `("connect" | "disconnect", {ip, port})`.
//!
//! An optional raw callback additionally receives every received chunk
//! verbatim.  Both callbacks are invoked from connection threads, so the
//! sinks must be `Send + Sync` and must not block: a sink is expected to
//! post the event somewhere (a channel, a queue) and return.
//!
//! Any `Fn(HostEvent)` closure is an [`EventSink`] and any `Fn(&[u8])`
//! closure is a [`RawSink`].

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use serde::Serialize;
use tourbox_core::ControlEvent;

/// Address of a connected Console peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeerInfo {
    pub ip: IpAddr,
    pub port: u16,
}

impl From<SocketAddr> for PeerInfo {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

/// An event delivered to the host's event callback.
///
/// Serialises as a flat JSON object tagged by `event`:
///
/// ```json
/// {"event":"control","name":"Knob CW","count":3}
/// {"event":"connect","ip":"127.0.0.1","port":51234}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A decoded run of one control.
    Control { name: &'static str, count: u32 },
    /// A Console connection was accepted.
    Connect(PeerInfo),
    /// A Console connection ended (peer closed, receive error or teardown).
    Disconnect(PeerInfo),
}

impl HostEvent {
    /// The event name as the host sees it: the control name, `"connect"`
    /// or `"disconnect"`.
    pub fn name(&self) -> &str {
        match self {
            HostEvent::Control { name, .. } => name,
            HostEvent::Connect(_) => "connect",
            HostEvent::Disconnect(_) => "disconnect",
        }
    }

    /// Run length of a control event.
    pub fn count(&self) -> Option<u32> {
        match self {
            HostEvent::Control { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// Peer of a lifecycle event.
    pub fn peer(&self) -> Option<PeerInfo> {
        match self {
            HostEvent::Connect(peer) | HostEvent::Disconnect(peer) => Some(*peer),
            HostEvent::Control { .. } => None,
        }
    }
}

impl From<ControlEvent> for HostEvent {
    fn from(event: ControlEvent) -> Self {
        HostEvent::Control {
            name: event.name,
            count: event.count,
        }
    }
}

/// Receives host events.  Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: HostEvent);
}

impl<F> EventSink for F
where
    F: Fn(HostEvent) + Send + Sync,
{
    fn emit(&self, event: HostEvent) {
        self(event)
    }
}

/// Receives every received chunk verbatim.  Implementations must not block.
pub trait RawSink: Send + Sync {
    fn raw(&self, chunk: &[u8]);
}

impl<F> RawSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn raw(&self, chunk: &[u8]) {
        self(chunk)
    }
}

/// The callback pair owned by one listener.
///
/// Cloning shares the underlying sinks.  The listener and each of its
/// connection threads hold their own clone, so stopping a listener releases
/// its references while connections still in flight keep theirs until they
/// exit.
#[derive(Clone)]
pub struct HostCallbacks {
    events: Arc<dyn EventSink>,
    raw: Option<Arc<dyn RawSink>>,
}

impl HostCallbacks {
    /// Callbacks with an event sink and no raw-data callback.
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events, raw: None }
    }

    /// Adds a raw-data callback.
    pub fn with_raw(mut self, raw: Arc<dyn RawSink>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Delivers `event` to the event sink on the calling thread.
    pub fn emit(&self, event: HostEvent) {
        self.events.emit(event);
    }

    /// Forwards `chunk` to the raw callback, if one is configured.
    pub fn emit_raw(&self, chunk: &[u8]) {
        if let Some(raw) = &self.raw {
            raw.raw(chunk);
        }
    }

    pub fn has_raw(&self) -> bool {
        self.raw.is_some()
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("raw", &self.has_raw())
            .finish_non_exhaustive()
    }
}
