//! Semantic control events produced by the decoder.

use serde::Serialize;

use crate::control::{Control, ControlKind};

/// One decoded run: a named control and how many times it repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlEvent {
    /// The wire byte of the control.
    pub code: u8,
    /// The control's table name, e.g. `"Knob CW"`.
    pub name: &'static str,
    /// Rotation, press or release.
    #[serde(skip)]
    pub kind: ControlKind,
    /// Run length of the byte inside its chunk.
    pub count: u32,
}

impl ControlEvent {
    /// Builds the event for `count` repetitions of `control`.
    pub fn new(control: Control, count: u32) -> Self {
        Self {
            code: control.code,
            name: control.name,
            kind: control.kind,
            count,
        }
    }
}
