//! Cooperative virtual-time scheduling.
//!
//! Nothing here runs on its own. A [`Scheduler`] is a table of sync points;
//! the host's main loop asks for the earliest one, emulates up to it and then
//! calls back into the owner. Re-arming a one-shot callback is just setting a
//! new sync point.

use crate::time::{EmuDuration, EmuTime};
use std::collections::BTreeSet;

/// Reasons the reverse engine wants control at a given instant.
///
/// Declaration order is firing order within one instant: a replayed input
/// is delivered before a replay stop at the same time, and snapshots come
/// last so they include every input of their instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncKind {
    InputEvent,
    ReplayStop,
    Snapshot,
}

/// Ordered set of pending sync points.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    points: BTreeSet<(EmuTime, K)>,
}

impl<K: Ord + Copy> Scheduler<K> {
    pub fn new() -> Self {
        Scheduler { points: BTreeSet::new() }
    }

    pub fn set_sync_point(&mut self, time: EmuTime, kind: K) {
        self.points.insert((time, kind));
    }

    /// Remove every pending sync point of `kind`.
    pub fn remove_sync_points(&mut self, kind: K) {
        self.points.retain(|&(_, k)| k != kind);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Time of the earliest pending sync point.
    pub fn next_sync_point(&self) -> Option<EmuTime> {
        self.points.iter().next().map(|&(t, _)| t)
    }

    /// Remove and return the earliest sync point at or before `time`.
    pub fn pop_due(&mut self, time: EmuTime) -> Option<(EmuTime, K)> {
        let first = *self.points.iter().next()?;
        if first.0 > time {
            return None;
        }
        self.points.remove(&first);
        Some(first)
    }

    pub fn is_pending(&self, kind: K) -> bool {
        self.points.iter().any(|&(_, k)| k == kind)
    }

    pub fn len(&self) -> usize { self.points.len() }

    pub fn is_empty(&self) -> bool { self.points.is_empty() }
}

impl<K: Ord + Copy> Default for Scheduler<K> {
    fn default() -> Self { Self::new() }
}

/// Fixed-cadence snapshot trigger, measured in emulated time.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotScheduler {
    pub period: EmuDuration,
}

impl SnapshotScheduler {
    pub fn new(period: EmuDuration) -> Self {
        assert!(period > EmuDuration::ZERO, "snapshot period must be non-zero");
        SnapshotScheduler { period }
    }

    /// (Re-)arm the snapshot callback one period after `time`. Near the end
    /// of the master clock the callback lands on the last tick.
    pub fn arm(&self, sched: &mut Scheduler<SyncKind>, time: EmuTime) {
        sched.remove_sync_points(SyncKind::Snapshot);
        sched.set_sync_point(time.saturating_add(self.period), SyncKind::Snapshot);
    }

    pub fn cancel(&self, sched: &mut Scheduler<SyncKind>) {
        sched.remove_sync_points(SyncKind::Snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ticks: u64) -> EmuTime { EmuTime::from_ticks(ticks) }

    #[test]
    fn test_fire_order() {
        let mut s = Scheduler::new();
        s.set_sync_point(t(20), SyncKind::Snapshot);
        s.set_sync_point(t(10), SyncKind::Snapshot);
        s.set_sync_point(t(10), SyncKind::ReplayStop);
        s.set_sync_point(t(10), SyncKind::InputEvent);
        assert_eq!(s.next_sync_point(), Some(t(10)));
        assert_eq!(s.pop_due(t(15)), Some((t(10), SyncKind::InputEvent)));
        assert_eq!(s.pop_due(t(15)), Some((t(10), SyncKind::ReplayStop)));
        assert_eq!(s.pop_due(t(15)), Some((t(10), SyncKind::Snapshot)));
        assert_eq!(s.pop_due(t(15)), None);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_remove_kind() {
        let mut s = Scheduler::new();
        s.set_sync_point(t(5), SyncKind::InputEvent);
        s.set_sync_point(t(7), SyncKind::Snapshot);
        s.remove_sync_points(SyncKind::InputEvent);
        assert!(!s.is_pending(SyncKind::InputEvent));
        assert_eq!(s.next_sync_point(), Some(t(7)));
    }

    #[test]
    fn test_snapshot_rearm() {
        let mut s = Scheduler::new();
        let snap = SnapshotScheduler::new(EmuDuration::from_ticks(10));
        snap.arm(&mut s, t(0));
        snap.arm(&mut s, t(3));
        assert_eq!(s.len(), 1);
        assert_eq!(s.next_sync_point(), Some(t(13)));
        snap.cancel(&mut s);
        assert!(s.is_empty());
    }

    #[test]
    fn test_arm_at_end_of_clock() {
        let mut s = Scheduler::new();
        let snap = SnapshotScheduler::new(EmuDuration::from_ticks(10));
        snap.arm(&mut s, t(u64::MAX - 4));
        assert_eq!(s.next_sync_point(), Some(t(u64::MAX)));
    }
}
