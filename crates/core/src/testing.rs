//! Deterministic toy machine for unit tests.

use crate::error::SnapshotError;
use crate::event::{StateChange, StateChangeListener};
use crate::machine::Machine;
use crate::snapshot::{SnapshotBlob, Snapshotable};
use crate::time::EmuTime;
use serde::{Deserialize, Serialize};

pub fn t(ticks: u64) -> EmuTime { EmuTime::from_ticks(ticks) }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub time: EmuTime,
    pub id: u32,
}

impl TestEvent {
    pub fn new(time: EmuTime, id: u32) -> Self { TestEvent { time, id } }
}

impl StateChange for TestEvent {
    fn time(&self) -> EmuTime { self.time }
}

/// The part of the machine that snapshots capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestState {
    pub time: EmuTime,
    pub applied: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct TestMachine {
    pub state: TestState,
    /// Every event ever delivered, live or replayed; survives restores.
    pub deliveries: Vec<u32>,
    pub fail_capture: bool,
}

impl Snapshotable for TestMachine {
    fn capture(&self) -> Result<SnapshotBlob, SnapshotError> {
        if self.fail_capture {
            return Err(SnapshotError::Encode(Box::new(bincode::ErrorKind::Custom("out of memory".into()))));
        }
        SnapshotBlob::encode(&self.state, 1)
    }

    fn restore(&mut self, blob: &SnapshotBlob) -> Result<(), SnapshotError> {
        self.state = blob.decode()?;
        Ok(())
    }
}

impl StateChangeListener<TestEvent> for TestMachine {
    fn signal_state_change(&mut self, event: &TestEvent) {
        assert_eq!(event.time, self.state.time, "event delivered at the wrong time");
        self.state.applied.push(event.id);
        self.deliveries.push(event.id);
    }
}

impl Machine<TestEvent> for TestMachine {
    fn current_time(&self) -> EmuTime { self.state.time }

    fn advance_to(&mut self, time: EmuTime) {
        assert!(time >= self.state.time, "machine clock moved backwards");
        self.state.time = time;
    }
}
