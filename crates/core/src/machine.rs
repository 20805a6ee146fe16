//! The emulated machine as seen by the reverse engine.

use crate::event::{StateChange, StateChangeListener};
use crate::snapshot::Snapshotable;
use crate::time::EmuTime;

/// A machine that can be driven by [`Motherboard`](crate::motherboard::Motherboard).
///
/// Emulation between two sync points is entirely the machine's business;
/// the reverse engine only needs to freeze/thaw it, feed it events and know
/// what time it is.
pub trait Machine<E: StateChange>: Snapshotable + StateChangeListener<E> {
    /// Current emulated time.
    fn current_time(&self) -> EmuTime;

    /// Emulate up to `time` without any external input.
    /// Never called with a time earlier than [`current_time`](Self::current_time).
    fn advance_to(&mut self, time: EmuTime);
}
