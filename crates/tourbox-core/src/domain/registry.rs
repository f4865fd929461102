//! Shared held/released state of every press control.
//!
//! The registry maps a press code to a "held" flag.  Decoders write to it as
//! press and release runs arrive; the host reads it to ask whether a button
//! is currently down.  One registry is shared by every connection of a
//! listener, so two Console connections see a single view of what is held.
//!
//! All access goes through one mutex.  The lock is held only for the map
//! operation itself, never across socket I/O or host callbacks.
//!
//! # Sharing state between threads (for beginners)
//!
//! Each connection runs on its own thread, yet all of them must update the
//! same map.  The listener wraps the registry in an `Arc` (a reference
//! counted pointer that many threads can hold) and every decoder keeps a
//! clone of it.  The `Mutex` inside lets only one thread touch the map at a
//! time, so methods take `&self` and still mutate safely.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Thread-safe map from press code to held flag.
///
/// A code that was never written reads as not held.
#[derive(Debug, Default)]
pub struct ButtonRegistry {
    states: Mutex<HashMap<u8, bool>>,
}

impl ButtonRegistry {
    /// Creates a registry with every control released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally records the held flag of `press_code`.
    ///
    /// Callers pass press codes only; the decoder guarantees this.
    pub fn set(&self, press_code: u8, held: bool) {
        self.states.lock().insert(press_code, held);
    }

    /// Returns whether `press_code` is held.  Missing keys are `false`.
    pub fn is_held(&self, press_code: u8) -> bool {
        self.states.lock().get(&press_code).copied().unwrap_or(false)
    }

    /// Clears the held flag of `press_code` if it is currently set.
    ///
    /// Returns `true` if the flag was cleared.  The check and the write
    /// happen under one lock acquisition, so a concurrent press is never
    /// overwritten by a release that observed the older state.
    pub fn release_if_held(&self, press_code: u8) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(&press_code) {
            Some(held) if *held => {
                *held = false;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of every code currently held, in ascending order.
    pub fn held_codes(&self) -> Vec<u8> {
        let mut codes: Vec<u8> = self
            .states
            .lock()
            .iter()
            .filter(|&(_, &held)| held)
            .map(|(&code, _)| code)
            .collect();
        codes.sort_unstable();
        codes
    }

    /// Returns `true` if any of `registries` reports `press_code` as held.
    ///
    /// Used by the host when several listeners are running and the question
    /// is "is this button down anywhere".
    pub fn any_held<'a, I>(registries: I, press_code: u8) -> bool
    where
        I: IntoIterator<Item = &'a ButtonRegistry>,
    {
        registries.into_iter().any(|r| r.is_held(press_code))
    }
}
