//! History store: snapshot chunks plus the event log.
//!
//! Chunks are keyed by capture sequence number. For any two chunks the one
//! with the larger key has the later time and the larger-or-equal event
//! count. The event log is append-only while collecting; it only shrinks
//! when a replay is cut short and the tail of the old timeline is dropped.

use crate::event::StateChange;
use crate::snapshot::SnapshotBlob;
use crate::time::EmuTime;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A full-machine snapshot tagged with where it sits in the timeline.
#[derive(Debug, Clone)]
pub struct ReverseChunk {
    pub time: EmuTime,
    pub snapshot: SnapshotBlob,
    /// Length of the event log when this snapshot was taken. Replay from
    /// this chunk resumes at this event index.
    pub event_count: usize,
}

pub type Chunks = BTreeMap<u32, ReverseChunk>;
pub type Events<E> = Vec<Rc<E>>;

/// Chunk index plus event log.
#[derive(Debug)]
pub struct ReverseHistory<E> {
    pub chunks: Chunks,
    pub events: Events<E>,
}

impl<E> Default for ReverseHistory<E> {
    fn default() -> Self {
        ReverseHistory { chunks: Chunks::new(), events: Events::new() }
    }
}

impl<E: StateChange> ReverseHistory<E> {
    pub fn new() -> Self { Self::default() }

    pub fn swap(&mut self, other: &mut ReverseHistory<E>) {
        std::mem::swap(self, other);
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.events.is_empty()
    }

    /// Append a recorded event. Events must arrive in time order.
    pub fn append_event(&mut self, event: Rc<E>) {
        if let Some(last) = self.events.last() {
            assert!(
                event.time() >= last.time(),
                "event at {} recorded after event at {}",
                event.time(),
                last.time()
            );
        }
        self.events.push(event);
    }

    /// Insert a new chunk under `key`.
    ///
    /// Panics if `key` does not follow the last key, if `time` is earlier
    /// than the last chunk, or if `event_count` is not the current log length.
    pub fn capture_chunk(&mut self, key: u32, time: EmuTime, snapshot: SnapshotBlob, event_count: usize) {
        if let Some((&last_key, last)) = self.chunks.iter().next_back() {
            assert!(key > last_key, "chunk key {} not after {}", key, last_key);
            assert!(time >= last.time, "chunk time {} before previous {}", time, last.time);
        }
        assert_eq!(event_count, self.events.len(), "chunk event count does not match event log");
        self.chunks.insert(key, ReverseChunk { time, snapshot, event_count });
    }

    /// The latest chunk taken at or before `target`.
    pub fn find_chunk_at_or_before(&self, target: EmuTime) -> Option<(u32, &ReverseChunk)> {
        self.chunks
            .iter()
            .rev()
            .find(|(_, c)| c.time <= target)
            .map(|(&k, c)| (k, c))
    }

    /// The latest chunk from which event `index` is still ahead (or next).
    pub fn find_chunk_at_or_before_event(&self, index: usize) -> Option<(u32, &ReverseChunk)> {
        self.chunks
            .iter()
            .rev()
            .find(|(_, c)| c.event_count <= index)
            .map(|(&k, c)| (k, c))
    }

    pub fn first_chunk(&self) -> Option<(u32, &ReverseChunk)> {
        self.chunks.iter().next().map(|(&k, c)| (k, c))
    }

    pub fn last_chunk(&self) -> Option<(u32, &ReverseChunk)> {
        self.chunks.iter().next_back().map(|(&k, c)| (k, c))
    }

    /// Estimated memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let chunks: usize = self
            .chunks
            .values()
            .map(|c| std::mem::size_of::<ReverseChunk>() + c.snapshot.len())
            .sum();
        chunks + self.events.len() * (std::mem::size_of::<Rc<E>>() + std::mem::size_of::<E>())
    }
}
