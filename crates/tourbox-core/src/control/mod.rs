//! The TourBox control table.
//!
//! The Console streams one byte per control action.  Each byte value names
//! exactly one physical action on the device (a knob tick, a button going
//! down, a button coming back up).  This module is the single source of
//! truth for turning those bytes into named controls.
//!
//! # Control classes
//!
//! | Class     | Example        | Held state                              |
//! |-----------|----------------|-----------------------------------------|
//! | rotation  | `Knob CW`      | none; one code per tick                 |
//! | press     | `C1 Press`     | sets the held bit for its own code      |
//! | release   | `C1 Release`   | clears the held bit of its paired press |
//!
//! Press and release codes of the same button differ only in the high bit
//! (`C1 Press` is 34 = `0x22`, `C1 Release` is 162 = `0xA2`), but the table
//! records the pairing explicitly rather than relying on that pattern.
//!
//! The table is plain data built at compile time.  It carries no callbacks;
//! whoever decodes a control decides what to do with it.

use serde::Serialize;

/// What kind of action a control code represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ControlKind {
    /// A rotation tick (knob, dial, scroll wheel).  Never held.
    Rotate,
    /// A button going down.  `release_code` is the byte the Console sends
    /// when the same button comes back up.
    Press { release_code: u8 },
    /// A button coming back up.
    Release,
}

/// One entry of the control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Control {
    /// The byte value the Console sends for this control.
    pub code: u8,
    /// Human-readable name, e.g. `"Knob CW"` or `"C1 Press"`.
    pub name: &'static str,
    /// Rotation, press or release.
    pub kind: ControlKind,
}

impl Control {
    const fn rotate(code: u8, name: &'static str) -> Self {
        Self {
            code,
            name,
            kind: ControlKind::Rotate,
        }
    }

    const fn press(code: u8, name: &'static str, release_code: u8) -> Self {
        Self {
            code,
            name,
            kind: ControlKind::Press { release_code },
        }
    }

    const fn release(code: u8, name: &'static str) -> Self {
        Self {
            code,
            name,
            kind: ControlKind::Release,
        }
    }

    /// Returns `true` for press controls.
    pub fn is_press(&self) -> bool {
        matches!(self.kind, ControlKind::Press { .. })
    }

    /// Returns `true` for release controls.
    pub fn is_release(&self) -> bool {
        matches!(self.kind, ControlKind::Release)
    }

    /// Returns `true` for rotation controls.
    pub fn is_rotation(&self) -> bool {
        matches!(self.kind, ControlKind::Rotate)
    }

    /// The paired release code, defined only for press controls.
    pub fn release_code(&self) -> Option<u8> {
        match self.kind {
            ControlKind::Press { release_code } => Some(release_code),
            _ => None,
        }
    }
}

/// Every control the TourBox Console is known to send.
pub const CONTROLS: [Control; 34] = [
    // Rotation controls
    Control::rotate(132, "Knob CCW"),
    Control::rotate(196, "Knob CW"),
    Control::rotate(137, "Scroll Down"),
    Control::rotate(201, "Scroll Up"),
    Control::rotate(143, "Dial CCW"),
    Control::rotate(207, "Dial CW"),
    // Knob and dial buttons
    Control::press(55, "Knob Press", 183),
    Control::release(183, "Knob Release"),
    Control::press(56, "Dial Press", 184),
    Control::release(184, "Dial Release"),
    // Directional pad
    Control::press(16, "Up Press", 144),
    Control::release(144, "Up Release"),
    Control::press(17, "Down Press", 145),
    Control::release(145, "Down Release"),
    Control::press(18, "Left Press", 146),
    Control::release(146, "Left Release"),
    Control::press(19, "Right Press", 147),
    Control::release(147, "Right Release"),
    // Side buttons
    Control::press(0, "Tall Press", 128),
    Control::release(128, "Tall Release"),
    Control::press(1, "Side Press", 129),
    Control::release(129, "Side Release"),
    Control::press(2, "Top Press", 130),
    Control::release(130, "Top Release"),
    Control::press(3, "Short Press", 131),
    Control::release(131, "Short Release"),
    // Tour, C1, C2 and scroll-wheel click
    Control::press(42, "Tour Press", 170),
    Control::release(170, "Tour Release"),
    Control::press(34, "C1 Press", 162),
    Control::release(162, "C1 Release"),
    Control::press(35, "C2 Press", 163),
    Control::release(163, "C2 Release"),
    Control::press(10, "Scroll Press", 138),
    Control::release(138, "Scroll Release"),
];

static STANDARD: ControlTable = ControlTable::from_controls(&CONTROLS);

/// Byte-indexed lookup table over a set of [`Control`]s.
///
/// Immutable once built, so a single instance is shared by every decoder
/// and by the host query path without locking.
#[derive(Debug, Clone)]
pub struct ControlTable {
    by_code: [Option<Control>; 256],
}

impl ControlTable {
    /// Builds a table from a list of controls.  Later entries win if two
    /// controls share a code.
    pub const fn from_controls(controls: &[Control]) -> Self {
        let mut by_code = [None; 256];
        let mut i = 0;
        while i < controls.len() {
            by_code[controls[i].code as usize] = Some(controls[i]);
            i += 1;
        }
        Self { by_code }
    }

    /// The table of every known TourBox control ([`CONTROLS`]).
    pub fn standard() -> &'static ControlTable {
        &STANDARD
    }

    /// Resolves a wire byte to its control, or `None` for unknown bytes.
    pub fn lookup_by_byte(&self, code: u8) -> Option<Control> {
        self.by_code[code as usize]
    }

    /// Resolves a control name to its byte code.
    ///
    /// If `name` is not found verbatim, `"<name> Press"` is tried, so a
    /// physical button can be queried by its short name (`"C1"` resolves to
    /// the `"C1 Press"` code).
    pub fn lookup_by_name(&self, name: &str) -> Option<u8> {
        self.find_name(name)
            .or_else(|| self.find_name(&format!("{name} Press")))
    }

    /// Finds the press code whose paired release is `release_code`.
    pub fn press_for_release(&self, release_code: u8) -> Option<u8> {
        self.controls()
            .find(|c| c.release_code() == Some(release_code))
            .map(|c| c.code)
    }

    /// Iterates over all controls in ascending code order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> + '_ {
        self.by_code.iter().flatten()
    }

    /// Iterates over the codes of all press controls.
    pub fn press_codes(&self) -> impl Iterator<Item = u8> + '_ {
        self.controls().filter(|c| c.is_press()).map(|c| c.code)
    }

    /// Number of known controls.
    pub fn len(&self) -> usize {
        self.controls().count()
    }

    /// Returns `true` if the table holds no controls.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_name(&self, name: &str) -> Option<u8> {
        self.controls().find(|c| c.name == name).map(|c| c.code)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
