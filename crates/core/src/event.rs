//! State-change events and the roles that consume them.
//!
//! A state change is one deterministic input to the emulated machine (key
//! press, joystick move, disk insert, ...). Its payload is irrelevant to the
//! reverse engine; only its timestamp and its position in the log matter.
//! Events are immutable once created and are shared as `Rc<E>` between the
//! event log and whoever is replaying them.

use crate::time::EmuTime;
use std::rc::Rc;

/// A timestamped deterministic input.
pub trait StateChange {
    /// Emulated time at which the input happened.
    fn time(&self) -> EmuTime;
}

/// Anything that reacts to a state change (the emulated devices).
pub trait StateChangeListener<E> {
    fn signal_state_change(&mut self, event: &E);
}

/// The recording side of the state-change distribution path.
///
/// The distributor calls [`stop_replay`](Self::stop_replay) before handing
/// a live event to [`record`](Self::record) whenever a replay is running, so
/// a recorder never sees live input while it is still replaying.
pub trait StateChangeRecorder<E> {
    fn is_replaying(&self) -> bool;

    /// Abort a running replay at `time`; everything after it is discarded.
    fn stop_replay(&mut self, time: EmuTime);

    /// Append a live event. Returns `false` if the event was not recorded.
    fn record(&mut self, event: Rc<E>) -> bool;
}
