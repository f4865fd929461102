//! Wire-level handling of the Console byte stream.
//!
//! The stream has no framing: every byte is one control code.  This module
//! groups bytes into runs and defines the event type the decoder emits.

pub mod event;
pub mod runs;

pub use event::ControlEvent;
pub use runs::{group_runs, Run, Runs};

use thiserror::Error;

/// Errors raised when a run cannot be turned into a control event.
///
/// The streaming decoder never surfaces these: unknown bytes are dropped
/// silently.  They exist for callers that want a strict answer, such as
/// [`crate::domain::decoder::InputDecoder::resolve`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte is not in the control table.
    #[error("unknown control code: {0} (0x{0:02X})")]
    UnknownControl(u8),

    /// A run with a repetition count of zero.
    #[error("run of code {0} has zero length")]
    EmptyRun(u8),
}
