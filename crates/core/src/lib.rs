//! # reverse-core
//!
//! Reverse/replay engine for emulators: rewind a running machine to any
//! earlier point of emulated time, then either resume live on a new timeline
//! or replay the recorded inputs deterministically.
//!
//! ## Architecture
//!
//! - [`history`] — Snapshot chunks keyed by capture order, plus the event log
//! - [`recorder`] — Appends every live state change to the log while collecting
//! - [`scheduler`] — Virtual-time sync points and the periodic snapshot trigger
//! - [`retention`] — Geometric thinning of old snapshots to bound memory
//! - [`manager`] — [`ReverseManager`]: the collect / replay state machine
//! - [`command`] — `reverse start|stop|status|goto|goback|...` command surface
//! - [`motherboard`] — [`Motherboard`]: host loop owning a machine and its engine
//!
//! The emulated machine itself is out of scope; it plugs in through the
//! [`Machine`] trait (emulate, capture/restore an opaque [`SnapshotBlob`],
//! receive [`StateChange`] events).
//!
//! ## Determinism
//!
//! Snapshot cadence is measured in emulated time, never wall-clock time, and
//! everything runs on the emulation thread as callbacks at sync points. Given
//! the same snapshot and the same event log, replay reproduces the original
//! run exactly.

pub mod time;
pub mod error;
pub mod config;
pub mod event;
pub mod snapshot;
pub mod machine;
pub mod history;
pub mod scheduler;
pub mod retention;
pub mod manager;
pub mod recorder;
pub mod command;
pub mod motherboard;

#[cfg(test)]
pub(crate) mod testing;

pub use command::ReverseCommand;
pub use config::ReverseConfig;
pub use error::{ReverseError, SnapshotError};
pub use event::{StateChange, StateChangeListener, StateChangeRecorder};
pub use machine::Machine;
pub use manager::{ReplayStop, ReverseManager, ReverseMode, ReverseStatus, Target};
pub use motherboard::Motherboard;
pub use snapshot::{SnapshotBlob, Snapshotable};
pub use time::{EmuDuration, EmuTime, TICKS_PER_SECOND};

/// Emulated seconds between two snapshots
pub const DEFAULT_SNAPSHOT_PERIOD_SECS: f64 = 1.0;
/// Retention tier width: about this many of the newest snapshots are all kept
pub const DEFAULT_TIER_WIDTH: u32 = 25;
