//! Event recorder: the reverse engine's side of state-change distribution.
//!
//! Every live event reaches the log exactly once while collecting. During a
//! replay the engine itself is the only event producer, so live input first
//! has to end the replay (see [`StateChangeRecorder`]).

use crate::event::{StateChange, StateChangeRecorder};
use crate::history::ReverseHistory;
use crate::manager::ReverseManager;
use crate::scheduler::SyncKind;
use crate::time::EmuTime;
use std::rc::Rc;
use tracing::warn;

impl<E: StateChange> StateChangeRecorder<E> for ReverseManager<E> {
    fn is_replaying(&self) -> bool {
        ReverseManager::is_replaying(self)
    }

    /// Cut the replayed timeline at `time`: events not yet replayed and
    /// chunks taken after `time` are discarded.
    fn stop_replay(&mut self, time: EmuTime) {
        if !ReverseManager::is_replaying(self) {
            return;
        }
        self.replay_stop = None;
        self.sync.remove_sync_points(SyncKind::InputEvent);
        self.sync.remove_sync_points(SyncKind::ReplayStop);

        let mut old = ReverseHistory::new();
        old.swap(&mut self.history);
        let event_count = self.replay_index;
        self.transfer_history(old, time, event_count);
    }

    fn record(&mut self, event: Rc<E>) -> bool {
        if !self.is_collecting() {
            return false;
        }
        if ReverseManager::is_replaying(self) {
            warn!(time = %event.time(), "live input during replay not recorded");
            return false;
        }
        if let Some((_, last)) = self.history.last_chunk() {
            assert!(
                event.time() >= last.time,
                "event at {} recorded before snapshot at {}",
                event.time(),
                last.time
            );
        }
        self.history.append_event(event);
        self.replay_index = self.history.events.len();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverseConfig;
    use crate::machine::Machine;
    use crate::manager::Target;
    use crate::testing::{t, TestEvent, TestMachine};
    use crate::time::EmuDuration;

    fn setup() -> (ReverseManager<TestEvent>, TestMachine) {
        let cfg = ReverseConfig::with_period(EmuDuration::from_ticks(10));
        let mut m = ReverseManager::new(&cfg).unwrap();
        let machine = TestMachine::default();
        m.start(&machine).unwrap();
        (m, machine)
    }

    #[test]
    fn test_record_in_arrival_order() {
        let (mut m, mut machine) = setup();
        for i in 0..5u32 {
            machine.advance_to(t(u64::from(i) * 2));
            assert!(m.record(Rc::new(TestEvent::new(machine.current_time(), i))));
        }
        let ids: Vec<u32> = m.history().events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(m.replay_index(), 5);
    }

    #[test]
    fn test_idle_ignores_events() {
        let cfg = ReverseConfig::with_period(EmuDuration::from_ticks(10));
        let mut m: ReverseManager<TestEvent> = ReverseManager::new(&cfg).unwrap();
        assert!(!m.record(Rc::new(TestEvent::new(t(0), 0))));
        assert!(m.history().events.is_empty());
    }

    #[test]
    fn test_replaying_rejects_live_input() {
        let (mut m, mut machine) = setup();
        for i in 1..=5u32 {
            machine.advance_to(t(u64::from(i)));
            m.record(Rc::new(TestEvent::new(t(u64::from(i)), i)));
        }
        m.go_to(Target::Time(t(3)), &mut machine).unwrap();
        assert!(StateChangeRecorder::is_replaying(&m));
        assert!(!m.record(Rc::new(TestEvent::new(t(0), 99))));
        assert_eq!(m.history().events.len(), 5);
    }

    #[test]
    fn test_stop_replay_when_collecting_is_noop() {
        let (mut m, mut machine) = setup();
        machine.advance_to(t(4));
        m.record(Rc::new(TestEvent::new(t(4), 1)));
        m.stop_replay(t(2));
        assert_eq!(m.history().events.len(), 1);
        assert_eq!(m.history().chunks.len(), 1);
    }
}
