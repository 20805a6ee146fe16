//! Operator command surface (`reverse ...`).
//!
//! ## Grammar
//!
//! ```text
//! start | stop | status | chunks | truncate
//! goto <time>            absolute target            (alias: go)
//! goback <delta>         relative to the live clock (alias: back)
//! goback <n> events      undo the last n events
//!
//! <time> := <float>      seconds, e.g. 12.5
//!         | <uint>t      master clock ticks, e.g. 450t
//! ```
//!
//! Usage errors come back as `Err` and leave the engine untouched.

use crate::error::ReverseError;
use crate::event::{StateChange, StateChangeRecorder};
use crate::machine::Machine;
use crate::manager::{ReverseManager, Target};
use crate::time::{EmuDuration, EmuTime};
use std::fmt::Write;

pub const USAGE: &str = "\
reverse start              start collecting history
reverse stop               stop collecting, discard history
reverse status             show collection/replay state
reverse chunks             list retained snapshots
reverse truncate           stop replaying, keep the current state
reverse goto <time>        go to absolute time (seconds, or ticks with 't' suffix)
reverse goback <delta>     go back <delta> from now
reverse goback <n> events  undo the last <n> events
";

/// A parsed `reverse` subcommand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReverseCommand {
    Start,
    Stop,
    Status,
    Chunks,
    Truncate,
    GoTo(EmuTime),
    GoBack(EmuDuration),
    GoBackEvents(usize),
}

impl ReverseCommand {
    /// Parse the tokens following `reverse`.
    pub fn parse(tokens: &[&str]) -> Result<Self, ReverseError> {
        let (&sub, args) = tokens
            .split_first()
            .ok_or_else(|| ReverseError::Syntax("missing subcommand".into()))?;
        let cmd = match (sub, args) {
            ("start", []) => ReverseCommand::Start,
            ("stop", []) => ReverseCommand::Stop,
            ("status", []) => ReverseCommand::Status,
            ("chunks", []) => ReverseCommand::Chunks,
            ("truncate", []) => ReverseCommand::Truncate,
            ("goto" | "go", [time]) => ReverseCommand::GoTo(EmuTime::ZERO + parse_duration(time)?),
            ("goback" | "back", [delta]) => ReverseCommand::GoBack(parse_duration(delta)?),
            ("goback" | "back", [n, "events" | "event"]) => {
                let n = n
                    .parse()
                    .map_err(|_| ReverseError::Syntax(format!("invalid event count '{}'", n)))?;
                ReverseCommand::GoBackEvents(n)
            }
            ("start" | "stop" | "status" | "chunks" | "truncate" | "goto" | "go" | "goback" | "back", _) => {
                return Err(ReverseError::Syntax(format!("wrong number of arguments for '{}'", sub)))
            }
            _ => return Err(ReverseError::Syntax(format!("unknown subcommand '{}'", sub))),
        };
        Ok(cmd)
    }

    /// Run the command. The returned text is meant for the operator.
    pub fn execute<E, M>(self, reverse: &mut ReverseManager<E>, machine: &mut M) -> Result<String, ReverseError>
    where
        E: StateChange,
        M: Machine<E>,
    {
        let now = machine.current_time();
        match self {
            ReverseCommand::Start => Ok(if reverse.start(machine)? {
                "reverse started\n".into()
            } else {
                "already collecting\n".into()
            }),
            ReverseCommand::Stop => Ok(if reverse.stop() {
                "reverse stopped\n".into()
            } else {
                "not collecting\n".into()
            }),
            ReverseCommand::Status => Ok(reverse.status(now).to_string()),
            ReverseCommand::Chunks => Ok(list_chunks(reverse)),
            ReverseCommand::Truncate => {
                if !reverse.is_replaying() {
                    return Ok("not replaying\n".into());
                }
                reverse.stop_replay(now);
                Ok(format!("replay truncated at {}\n", now))
            }
            ReverseCommand::GoTo(time) => go(reverse, machine, Target::Time(time)),
            ReverseCommand::GoBack(delta) => go(reverse, machine, Target::Time(now.saturating_sub(delta))),
            ReverseCommand::GoBackEvents(n) => go(reverse, machine, Target::EventsBack(n)),
        }
    }
}

fn go<E: StateChange, M: Machine<E>>(
    reverse: &mut ReverseManager<E>,
    machine: &mut M,
    target: Target,
) -> Result<String, ReverseError> {
    Ok(match reverse.go_to(target, machine)? {
        Some(anchor) => match reverse.replay_stop() {
            Some(stop) => format!("restored snapshot at {}, replaying until {}\n", anchor, stop),
            None => format!("restored snapshot at {}\n", anchor),
        },
        None => "target is not in the past, nothing to do\n".into(),
    })
}

fn list_chunks<E: StateChange>(reverse: &ReverseManager<E>) -> String {
    let history = reverse.history();
    if history.chunks.is_empty() {
        return "No snapshots.\n".into();
    }
    let mut s = String::new();
    for (key, chunk) in &history.chunks {
        let _ = writeln!(s, "  [{:5}] {}  events={}  {} bytes", key, chunk.time, chunk.event_count, chunk.snapshot.len());
    }
    s
}

/// `<float>` seconds or `<uint>t` ticks.
pub fn parse_duration(token: &str) -> Result<EmuDuration, ReverseError> {
    if let Some(ticks) = token.strip_suffix('t') {
        return ticks
            .parse()
            .map(EmuDuration::from_ticks)
            .map_err(|_| ReverseError::Syntax(format!("invalid tick count '{}'", token)));
    }
    token
        .parse::<f64>()
        .ok()
        .and_then(EmuDuration::from_secs_f64)
        .ok_or_else(|| ReverseError::Syntax(format!("invalid time '{}'", token)))
}
