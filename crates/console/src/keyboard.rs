//! Minimal deterministic machine: a keyboard and the text typed on it.
//!
//! Stands in for a real emulated machine so the reverse engine can be driven
//! from the console. Its whole state is tiny, which makes it easy to see that
//! rewinding and replaying land on exactly the same state.

use reverse_core::{
    EmuTime, Machine, SnapshotBlob, SnapshotError, Snapshotable, StateChange, StateChangeListener,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A key going down or up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub time: EmuTime,
    pub key: char,
    pub pressed: bool,
}

impl StateChange for KeyEvent {
    fn time(&self) -> EmuTime { self.time }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct KeyboardState {
    time: EmuTime,
    pressed: BTreeSet<char>,
    /// Every key press, in order
    typed: String,
}

pub struct KeyboardMachine {
    state: KeyboardState,
    compression_level: u8,
}

impl KeyboardMachine {
    pub fn new(compression_level: u8) -> Self {
        KeyboardMachine { state: KeyboardState::default(), compression_level }
    }

    pub fn typed(&self) -> &str { &self.state.typed }
}

impl Snapshotable for KeyboardMachine {
    fn capture(&self) -> Result<SnapshotBlob, SnapshotError> {
        SnapshotBlob::encode(&self.state, self.compression_level)
    }

    fn restore(&mut self, blob: &SnapshotBlob) -> Result<(), SnapshotError> {
        self.state = blob.decode()?;
        Ok(())
    }
}

impl StateChangeListener<KeyEvent> for KeyboardMachine {
    fn signal_state_change(&mut self, event: &KeyEvent) {
        if event.pressed {
            if self.state.pressed.insert(event.key) {
                self.state.typed.push(event.key);
            }
        } else {
            self.state.pressed.remove(&event.key);
        }
    }
}

impl Machine<KeyEvent> for KeyboardMachine {
    fn current_time(&self) -> EmuTime { self.state.time }

    fn advance_to(&mut self, time: EmuTime) {
        self.state.time = time;
    }
}

impl fmt::Display for KeyboardMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: String = self.state.pressed.iter().collect();
        write!(f, "time={}  held=[{}]  typed=\"{}\"", self.state.time, held, self.state.typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ticks: u64, key: char, pressed: bool) -> KeyEvent {
        KeyEvent { time: EmuTime::from_ticks(ticks), key, pressed }
    }

    #[test]
    fn test_typing() {
        let mut m = KeyboardMachine::new(6);
        m.signal_state_change(&key(0, 'a', true));
        m.signal_state_change(&key(0, 'a', true)); // auto-repeat is not a new press
        m.signal_state_change(&key(1, 'a', false));
        m.signal_state_change(&key(2, 'b', true));
        assert_eq!(m.typed(), "ab");
        assert!(m.to_string().contains("held=[b]"));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut m = KeyboardMachine::new(6);
        m.advance_to(EmuTime::from_ticks(5));
        m.signal_state_change(&key(5, 'x', true));
        let blob = m.capture().unwrap();
        m.advance_to(EmuTime::from_ticks(9));
        m.signal_state_change(&key(9, 'y', true));
        m.restore(&blob).unwrap();
        assert_eq!(m.current_time(), EmuTime::from_ticks(5));
        assert_eq!(m.typed(), "x");
    }
}
