//! Host loop: one machine, one reverse engine, one state-change path.
//!
//! The motherboard is the single owner of both the machine and its
//! [`ReverseManager`]. It emulates in slices between sync points and routes
//! every live input through the recorder before the machine sees it, so the
//! event log and the machine can never disagree about what happened.

use crate::command::ReverseCommand;
use crate::config::ReverseConfig;
use crate::error::ReverseError;
use crate::event::{StateChange, StateChangeListener, StateChangeRecorder};
use crate::machine::Machine;
use crate::manager::{ReverseManager, ReverseStatus};
use crate::time::EmuTime;
use std::rc::Rc;
use tracing::debug;

pub struct Motherboard<M, E> {
    machine: M,
    reverse: ReverseManager<E>,
}

impl<E: StateChange, M: Machine<E>> Motherboard<M, E> {
    /// Wrap `machine`; starts collecting right away if `config.auto_start`.
    pub fn new(machine: M, config: &ReverseConfig) -> Result<Self, ReverseError> {
        let mut mb = Motherboard { machine, reverse: ReverseManager::new(config)? };
        if config.auto_start {
            mb.reverse.start(&mb.machine)?;
        }
        Ok(mb)
    }

    pub fn machine(&self) -> &M { &self.machine }

    pub fn reverse(&self) -> &ReverseManager<E> { &self.reverse }

    pub fn current_time(&self) -> EmuTime { self.machine.current_time() }

    /// Emulate up to `limit`. Every sync point strictly before `limit` fires
    /// in order, each after the machine has been brought to its time.
    pub fn run_until(&mut self, limit: EmuTime) -> Result<(), ReverseError> {
        while let Some(sp) = self.reverse.next_sync_point() {
            if sp >= limit {
                break;
            }
            self.machine.advance_to(sp);
            self.reverse.execute_until(sp, &mut self.machine)?;
        }
        if limit > self.machine.current_time() {
            self.machine.advance_to(limit);
        }
        Ok(())
    }

    /// Inject a live input at the current time.
    ///
    /// A running replay is cut at this point first: the new input starts a
    /// new timeline.
    pub fn distribute_new(&mut self, event: E) {
        let now = self.machine.current_time();
        assert_eq!(event.time(), now, "live event not at the current time");
        let event = Rc::new(event);
        if self.reverse.is_replaying() {
            debug!(time = %now, "live input diverges from replay");
            self.reverse.stop_replay(now);
        }
        self.reverse.record(Rc::clone(&event));
        self.machine.signal_state_change(&event);
    }

    /// Parse and run a `reverse` subcommand.
    pub fn execute_command(&mut self, tokens: &[&str]) -> Result<String, ReverseError> {
        ReverseCommand::parse(tokens)?.execute(&mut self.reverse, &mut self.machine)
    }

    pub fn status(&self) -> ReverseStatus {
        self.reverse.status(self.machine.current_time())
    }
}
