//! Replay engine: the collect / replay state machine.
//!
//! ```text
//!            start()                go_to()
//!   Idle ─────────────▶ Collecting ─────────▶ Replaying
//!    ▲                    ▲   │                  │
//!    │      stop()        │   │  stop_replay()   │
//!    └────────────────────┼───┘◀─────────────────┘
//!                         └── (target reached / live input / truncate)
//! ```
//!
//! While collecting, every live event is appended to the log and a snapshot
//! chunk is taken once per period of emulated time. Going back restores the
//! newest chunk at or before the target and replays the logged events from
//! that chunk's event index until the stop condition is met. At that point
//! the tail of the old timeline is cut off and collection continues from the
//! divergence point.

use crate::config::ReverseConfig;
use crate::error::ReverseError;
use crate::event::{StateChange, StateChangeRecorder};
use crate::history::ReverseHistory;
use crate::machine::Machine;
use crate::retention::RetentionPolicy;
use crate::scheduler::{Scheduler, SnapshotScheduler, SyncKind};
use crate::time::EmuTime;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info};

/// Engine mode, derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseMode {
    Idle,
    Collecting,
    Replaying,
}

impl fmt::Display for ReverseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReverseMode::Idle => "idle",
            ReverseMode::Collecting => "collecting",
            ReverseMode::Replaying => "replaying",
        })
    }
}

/// Resolved rewind request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Absolute emulated time.
    Time(EmuTime),
    /// Undo the last `n` events before the replay cursor.
    ///
    /// This counts back from the cursor, not forward `n` events from the
    /// restored snapshot: `goback 3 events` lands just before the third most
    /// recent input wherever the nearest snapshot happens to be.
    EventsBack(usize),
}

/// When a running replay hands control back to live input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStop {
    /// Once the clock reaches this time (events at exactly this time are
    /// still replayed).
    Time(EmuTime),
    /// Once this many events of the log have been consumed.
    EventIndex(usize),
}

impl fmt::Display for ReplayStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayStop::Time(t) => write!(f, "{}", t),
            ReplayStop::EventIndex(i) => write!(f, "event {}", i),
        }
    }
}

/// Snapshot of the engine's state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseStatus {
    pub mode: ReverseMode,
    pub chunks: usize,
    pub first_snapshot: Option<EmuTime>,
    pub last_snapshot: Option<EmuTime>,
    pub current_time: EmuTime,
    /// Newest point covered by the history: the live clock, the last event
    /// or the last snapshot, whichever is latest. While replaying this is
    /// the end of the timeline being replayed, not the replay cursor.
    pub collected_until: EmuTime,
    pub events: usize,
    pub replay_index: usize,
    pub replay_stop: Option<ReplayStop>,
    pub memory_usage: usize,
}

impl fmt::Display for ReverseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mode: {}", self.mode)?;
        if self.mode == ReverseMode::Idle {
            return Ok(());
        }
        if let Some(first) = self.first_snapshot {
            let until = self.collected_until;
            writeln!(f, "collected: {} .. {} ({})", first, until, until.since(first))?;
        }
        if let Some(last) = self.last_snapshot {
            writeln!(f, "snapshots: {} (latest at {})", self.chunks, last)?;
        }
        writeln!(f, "events: {}", self.events)?;
        if let Some(stop) = self.replay_stop {
            writeln!(f, "replay position: event {} of {}, until {}", self.replay_index, self.events, stop)?;
        }
        writeln!(f, "memory: {} KB", self.memory_usage / 1024)
    }
}

/// The reverse engine for one emulated machine.
pub struct ReverseManager<E> {
    snapshots: SnapshotScheduler,
    retention: RetentionPolicy,
    pub(crate) sync: Scheduler<SyncKind>,
    pub(crate) history: ReverseHistory<E>,
    /// 0 = not collecting, otherwise key of the next chunk to capture
    pub(crate) collect_count: u32,
    /// Next event to replay; equals the log length while not replaying
    pub(crate) replay_index: usize,
    pub(crate) replay_stop: Option<ReplayStop>,
}

impl<E: StateChange> ReverseManager<E> {
    pub fn new(config: &ReverseConfig) -> Result<Self, ReverseError> {
        config.validate()?;
        let period = config
            .snapshot_period()
            .ok_or_else(|| ReverseError::Config("invalid snapshot period".into()))?;
        Ok(ReverseManager {
            snapshots: SnapshotScheduler::new(period),
            retention: RetentionPolicy::new(config.tier_width),
            sync: Scheduler::new(),
            history: ReverseHistory::new(),
            collect_count: 0,
            replay_index: 0,
            replay_stop: None,
        })
    }

    pub fn is_collecting(&self) -> bool { self.collect_count != 0 }

    pub fn is_replaying(&self) -> bool { self.replay_stop.is_some() }

    pub fn mode(&self) -> ReverseMode {
        if self.is_replaying() {
            ReverseMode::Replaying
        } else if self.is_collecting() {
            ReverseMode::Collecting
        } else {
            ReverseMode::Idle
        }
    }

    pub fn history(&self) -> &ReverseHistory<E> { &self.history }

    pub fn replay_index(&self) -> usize { self.replay_index }

    pub fn replay_stop(&self) -> Option<ReplayStop> { self.replay_stop }

    /// Time at which the engine next wants [`execute_until`](Self::execute_until) called.
    pub fn next_sync_point(&self) -> Option<EmuTime> {
        self.sync.next_sync_point()
    }

    /// Start collecting. The first snapshot is taken right away.
    /// Returns `false` if already collecting.
    pub fn start<M: Machine<E>>(&mut self, machine: &M) -> Result<bool, ReverseError> {
        if self.is_collecting() {
            return Ok(false);
        }
        debug_assert!(self.history.is_empty());
        self.collect_count = 1;
        self.replay_index = 0;
        let now = machine.current_time();
        if let Err(e) = self.take_snapshot(now, machine) {
            self.stop();
            return Err(e);
        }
        info!(time = %now, period = %self.snapshots.period, "reverse collection started");
        Ok(true)
    }

    /// Stop collecting and drop all history. Returns `false` if idle.
    pub fn stop(&mut self) -> bool {
        if !self.is_collecting() {
            return false;
        }
        self.snapshots.cancel(&mut self.sync);
        self.sync.clear();
        self.history.clear();
        self.collect_count = 0;
        self.replay_index = 0;
        self.replay_stop = None;
        info!("reverse collection stopped, history discarded");
        true
    }

    /// Rewind to `target`, resolved against the machine's live clock.
    ///
    /// Returns the time of the restored snapshot, or `None` if the target is
    /// not in the past (nothing to do).
    pub fn go_to<M: Machine<E>>(&mut self, target: Target, machine: &mut M) -> Result<Option<EmuTime>, ReverseError> {
        if !self.is_collecting() {
            return Err(ReverseError::NotCollecting);
        }
        let now = machine.current_time();
        let oldest = self.history.first_chunk().map_or(now, |(_, c)| c.time);
        let (key, stop) = match target {
            Target::Time(t) => {
                if t >= now {
                    return Ok(None);
                }
                let (key, _) = self
                    .history
                    .find_chunk_at_or_before(t)
                    .ok_or(ReverseError::BeforeHistory { target: t, oldest })?;
                (key, ReplayStop::Time(t))
            }
            Target::EventsBack(n) => {
                if n == 0 {
                    return Ok(None);
                }
                let available = self.replay_index;
                let index = available
                    .checked_sub(n)
                    .ok_or(ReverseError::NotEnoughEvents { requested: n, available })?;
                let (key, _) = self
                    .history
                    .find_chunk_at_or_before_event(index)
                    .ok_or(ReverseError::NotEnoughEvents { requested: n, available })?;
                (key, ReplayStop::EventIndex(index))
            }
        };
        self.go_to_snapshot(key, stop, machine).map(Some)
    }

    /// Restore chunk `key` and start replaying towards `stop`.
    fn go_to_snapshot<M: Machine<E>>(&mut self, key: u32, stop: ReplayStop, machine: &mut M) -> Result<EmuTime, ReverseError> {
        let chunk = &self.history.chunks[&key];
        machine.restore(&chunk.snapshot)?;
        let (time, event_count) = (chunk.time, chunk.event_count);
        assert_eq!(machine.current_time(), time, "restored clock does not match snapshot time");

        self.replay_index = event_count;
        self.replay_stop = Some(stop);
        self.sync.remove_sync_points(SyncKind::InputEvent);
        self.sync.remove_sync_points(SyncKind::ReplayStop);
        self.snapshots.arm(&mut self.sync, time);
        if let ReplayStop::Time(t) = stop {
            self.sync.set_sync_point(t, SyncKind::ReplayStop);
        }
        info!(chunk = key, time = %time, replay_index = event_count, until = %stop, "rewound to snapshot");

        if self.replay_stop_reached() {
            self.stop_replay(time);
        } else {
            self.schedule_next_event();
        }
        Ok(time)
    }

    /// Callback for every sync point at or before `time`. The host has
    /// already emulated up to `time`.
    pub fn execute_until<M: Machine<E>>(&mut self, time: EmuTime, machine: &mut M) -> Result<(), ReverseError> {
        while let Some((t, kind)) = self.sync.pop_due(time) {
            match kind {
                SyncKind::InputEvent => self.replay_events(t, machine),
                SyncKind::ReplayStop => {
                    if let Some(ReplayStop::Time(_)) = self.replay_stop {
                        self.stop_replay(t);
                    }
                }
                SyncKind::Snapshot => {
                    if self.is_replaying() {
                        // the old timeline already has its chunks
                        self.snapshots.arm(&mut self.sync, t);
                    } else if let Err(e) = self.take_snapshot(t, machine) {
                        error!(time = %t, error = %e, "snapshot capture failed, reverse stopped");
                        self.stop();
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    fn take_snapshot<M: Machine<E>>(&mut self, time: EmuTime, machine: &M) -> Result<(), ReverseError> {
        let blob = machine.capture()?;
        let size = blob.len();
        let event_count = self.history.events.len();
        self.history.capture_chunk(self.collect_count, time, blob, event_count);
        let dropped = self.retention.drop_old_snapshots(&mut self.history.chunks, self.collect_count);
        debug!(chunk = self.collect_count, time = %time, event_count, size, dropped, "snapshot taken");
        self.collect_count += 1;
        self.snapshots.arm(&mut self.sync, time);
        Ok(())
    }

    /// Deliver every logged event due at or before `now`.
    fn replay_events<M: Machine<E>>(&mut self, now: EmuTime, machine: &mut M) {
        while self.is_replaying() {
            match self.history.events.get(self.replay_index) {
                Some(event) if event.time() <= now => {}
                _ => break,
            }
            self.replay_next_event(machine);
            if self.replay_stop_reached() {
                self.stop_replay(now);
                return;
            }
        }
        self.schedule_next_event();
    }

    fn replay_next_event<M: Machine<E>>(&mut self, machine: &mut M) {
        let event = Rc::clone(&self.history.events[self.replay_index]);
        machine.signal_state_change(&event);
        self.replay_index += 1;
    }

    fn replay_stop_reached(&self) -> bool {
        match self.replay_stop {
            Some(ReplayStop::EventIndex(i)) => self.replay_index >= i,
            _ => false,
        }
    }

    fn schedule_next_event(&mut self) {
        self.sync.remove_sync_points(SyncKind::InputEvent);
        if !self.is_replaying() {
            return;
        }
        if let Some(event) = self.history.events.get(self.replay_index) {
            self.sync.set_sync_point(event.time(), SyncKind::InputEvent);
        }
    }

    /// Make `old` (the timeline that was being replayed) the live history,
    /// keeping only what happened before `divergence`: the first
    /// `event_count` events and the chunks taken no later than that.
    /// Collection resumes with the chunk key after the last kept chunk.
    pub(crate) fn transfer_history(&mut self, mut old: ReverseHistory<E>, divergence: EmuTime, event_count: usize) {
        assert!(self.history.is_empty(), "transfer into non-empty history");
        assert!(event_count <= old.events.len());

        let dropped_events = old.events.len() - event_count;
        old.events.truncate(event_count);
        let first_invalid = old
            .chunks
            .iter()
            .find(|(_, c)| c.time > divergence || c.event_count > event_count)
            .map(|(&k, _)| k);
        let dropped_chunks = first_invalid.map_or(0, |k| old.chunks.split_off(&k).len());

        self.history.swap(&mut old);
        self.collect_count = self.history.last_chunk().map_or(1, |(k, _)| k + 1);
        self.replay_index = self.history.events.len();
        self.snapshots.arm(&mut self.sync, divergence);
        info!(
            time = %divergence,
            events = self.replay_index,
            dropped_events,
            dropped_chunks,
            "replay stopped, collecting on new timeline"
        );
    }

    pub fn status(&self, now: EmuTime) -> ReverseStatus {
        let last_event = self.history.events.last().map(|e| e.time());
        let last_chunk = self.history.last_chunk().map(|(_, c)| c.time);
        let collected_until = [last_event, last_chunk].into_iter().flatten().fold(now, EmuTime::max);
        ReverseStatus {
            mode: self.mode(),
            chunks: self.history.chunks.len(),
            first_snapshot: self.history.first_chunk().map(|(_, c)| c.time),
            last_snapshot: last_chunk,
            current_time: now,
            collected_until,
            events: self.history.events.len(),
            replay_index: self.replay_index,
            replay_stop: self.replay_stop,
            memory_usage: self.history.memory_usage(),
        }
    }
}
