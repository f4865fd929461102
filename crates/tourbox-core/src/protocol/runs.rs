//! Run-length grouping of received bytes.
//!
//! The Console repeats a rotation byte to communicate velocity: a fast turn
//! of the knob arrives as `196 196 196 196`.  Grouping collapses each run of
//! identical bytes into one [`Run`] with a repetition count, so the host gets
//! one `("Knob CW", 4)` event instead of four single ticks.
//!
//! Runs never span chunk boundaries.  Every chunk handed to [`group_runs`] is
//! grouped on its own, so `[196, 196]` followed by `[196]` yields `(196, 2)`
//! and then `(196, 1)`.  Whether the Console ever splits one burst across two
//! TCP segments is not known; the boundary is kept where the socket put it.

/// A maximal run of one byte value inside a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// The repeated byte.
    pub code: u8,
    /// How many times it repeated.  Always at least 1.
    pub count: u32,
}

/// Iterator over the runs of a chunk, returned by [`group_runs`].
#[derive(Debug, Clone)]
pub struct Runs<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        let (&code, _) = self.rest.split_first()?;
        let len = self
            .rest
            .iter()
            .position(|&b| b != code)
            .unwrap_or(self.rest.len());
        self.rest = &self.rest[len..];
        Some(Run {
            code,
            count: u32::try_from(len).unwrap_or(u32::MAX),
        })
    }
}

/// Splits `chunk` into runs of identical consecutive bytes, in order.
///
/// ```rust
/// use tourbox_core::protocol::runs::{group_runs, Run};
///
/// let runs: Vec<Run> = group_runs(&[7, 7, 9, 9, 9, 7]).collect();
/// assert_eq!(
///     runs,
///     vec![
///         Run { code: 7, count: 2 },
///         Run { code: 9, count: 3 },
///         Run { code: 7, count: 1 },
///     ]
/// );
/// ```
pub fn group_runs(chunk: &[u8]) -> Runs<'_> {
    Runs { rest: chunk }
}
