//! Turns received chunks into control events and keeps the registry current.
//!
//! This is the socket-independent half of a Console connection.  The network
//! layer reads bytes and hands each chunk to [`InputDecoder::decode`]; the
//! decoder groups the chunk into runs and, for every run:
//!
//! 1. Resolves the byte through the [`ControlTable`].  Unknown bytes are
//!    dropped without an event or a registry change.
//! 2. Press: marks the press code held, then emits.
//! 3. Release: finds the press paired with this release and clears its held
//!    flag if it is set, then emits.  A release is emitted even when its
//!    press was never seen.
//! 4. Rotation: emits without touching the registry.
//!
//! The registry write for a run always happens before that run's event is
//! emitted, so a host that queries the registry from its event handler sees
//! the new state.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::control::{Control, ControlKind, ControlTable};
use crate::domain::registry::ButtonRegistry;
use crate::protocol::{group_runs, ControlEvent, ProtocolError, Run};

/// Decoder bound to one control table and one shared registry.
///
/// Holds no per-connection state of its own: everything that outlives a
/// run lives in the registry.
#[derive(Debug, Clone)]
pub struct InputDecoder {
    table: &'static ControlTable,
    registry: Arc<ButtonRegistry>,
}

impl InputDecoder {
    /// Creates a decoder over the standard TourBox table.
    pub fn new(registry: Arc<ButtonRegistry>) -> Self {
        Self::with_table(ControlTable::standard(), registry)
    }

    /// Creates a decoder over a custom table.
    pub fn with_table(table: &'static ControlTable, registry: Arc<ButtonRegistry>) -> Self {
        Self { table, registry }
    }

    /// The registry this decoder writes to.
    pub fn registry(&self) -> &Arc<ButtonRegistry> {
        &self.registry
    }

    /// Decodes one received chunk, calling `emit` once per recognised run in
    /// arrival order.  Returns the number of events emitted.
    pub fn decode<F>(&self, chunk: &[u8], mut emit: F) -> usize
    where
        F: FnMut(ControlEvent),
    {
        let mut emitted = 0;
        for run in group_runs(chunk) {
            if let Some(event) = self.dispatch(run) {
                emit(event);
                emitted += 1;
            }
        }
        emitted
    }

    /// Applies one run to the registry and returns its event, or `None`
    /// for an unknown byte.
    pub fn dispatch(&self, run: Run) -> Option<ControlEvent> {
        let Some(control) = self.table.lookup_by_byte(run.code) else {
            trace!(code = run.code, count = run.count, "Unknown ({})", run.code);
            return None;
        };

        match control.kind {
            ControlKind::Press { .. } => {
                self.registry.set(control.code, true);
                debug!(count = run.count, "{} - held", control.name);
            }
            ControlKind::Release => {
                if let Some(press) = self.table.press_for_release(control.code) {
                    if self.registry.release_if_held(press) {
                        debug!(
                            count = run.count,
                            "{} - released (cleared press code {press})",
                            control.name
                        );
                    }
                }
            }
            ControlKind::Rotate => {}
        }

        debug!("action: {} x{}", control.name, run.count);
        Some(ControlEvent::new(control, run.count))
    }

    /// Resolves a run without touching the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownControl`] for bytes outside the table
    /// and [`ProtocolError::EmptyRun`] for a zero count.
    pub fn resolve(&self, run: Run) -> Result<Control, ProtocolError> {
        if run.count == 0 {
            return Err(ProtocolError::EmptyRun(run.code));
        }
        self.table
            .lookup_by_byte(run.code)
            .ok_or(ProtocolError::UnknownControl(run.code))
    }
}
