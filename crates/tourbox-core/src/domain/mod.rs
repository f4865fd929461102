//! Decoding logic and shared button state.
//!
//! Nothing here opens a socket or spawns a thread, so every rule about how
//! bytes become events can be tested with plain slices.

/// Held/released state shared by all connections of a listener.
pub mod registry;

/// Chunk grouping and per-run dispatch.
pub mod decoder;
