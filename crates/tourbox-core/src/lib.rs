//! # tourbox-core
//!
//! Protocol and state engine for the TourBox Console byte stream.
//!
//! The Console helper opens a TCP connection and sends one byte per control
//! action: knob ticks, button presses, button releases.  This crate turns
//! those bytes into named events and tracks which buttons are held.  It does
//! no I/O; the `tourbox-server` crate owns the sockets and threads.
//!
//! - **`control`** – the static table mapping byte codes to named controls
//!   and pairing each press with its release.
//! - **`protocol`** – run-length grouping of received chunks and the
//!   [`ControlEvent`] type.
//! - **`domain`** – the [`ButtonRegistry`] and the [`InputDecoder`] that
//!   applies runs to it.

pub mod control;
pub mod domain;
pub mod protocol;

pub use control::{Control, ControlKind, ControlTable, CONTROLS};
pub use domain::decoder::InputDecoder;
pub use domain::registry::ButtonRegistry;
pub use protocol::{group_runs, ControlEvent, ProtocolError, Run};
