//! Application layer: the contract between the server and its host.
//!
//! Defines what the host receives ([`events::HostEvent`]) and how it
//! receives it ([`events::EventSink`], [`events::RawSink`]).  No sockets or
//! threads live here; the infrastructure layer produces the events.

pub mod events;

pub use events::{EventSink, HostCallbacks, HostEvent, PeerInfo, RawSink};
