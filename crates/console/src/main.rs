//! Reverse console.
//!
//! Drives a keyboard machine through the reverse engine, one command per
//! line, either interactively or from a script file (`--script`).
//!
//! ```text
//! press <key> / release <key>   live input at the current time
//! type <text>                   press and release each key, 10 ms apart
//! run <time>                    emulate <time> (seconds, or ticks with 't')
//! state                         show the machine state
//! reverse <subcommand>          see `reverse help`
//! q | quit
//! ```

mod keyboard;

use anyhow::Context;
use clap::Parser;
use keyboard::{KeyEvent, KeyboardMachine};
use reverse_core::command::{parse_duration, USAGE};
use reverse_core::{EmuDuration, Motherboard, ReverseConfig};
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Gap between key down and key up for `type`
const TYPE_GAP: EmuDuration = EmuDuration::from_ticks(10_000);

#[derive(Parser, Debug)]
#[command(name = "reverse-console", version, about = "Rewind and replay a keyboard machine")]
struct Args {
    /// TOML file with reverse engine settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read commands from this file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,
    /// Start collecting history at boot
    #[arg(long)]
    reverse: bool,
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
}

type Board = Motherboard<KeyboardMachine, KeyEvent>;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ReverseConfig::from_toml_str(&text)?
        }
        None => ReverseConfig::default(),
    };
    if args.reverse {
        config.auto_start = true;
    }

    let machine = KeyboardMachine::new(config.compression_level);
    let mut board = Motherboard::new(machine, &config)?;
    info!(?config, "console ready");

    match &args.script {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            for line in text.lines() {
                println!("> {}", line);
                if !run_line(&mut board, line)? {
                    break;
                }
            }
        }
        None => run_interactive(&mut board)?,
    }
    println!("{}", board.machine());
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_interactive(board: &mut Board) -> anyhow::Result<()> {
    println!("Reverse console: press/release/type/run/state/reverse, q=quit");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("reverse> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next() else { break };
        if !run_line(board, &line?)? {
            break;
        }
    }
    Ok(())
}

/// Execute one console line. Returns `false` to quit.
///
/// Mistyped commands only print a message; a failure of the engine itself
/// ends the session.
fn run_line(board: &mut Board, line: &str) -> anyhow::Result<bool> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&cmd, args)) = tokens.split_first() else { return Ok(true) };
    match (cmd, args) {
        ("q" | "quit", _) => return Ok(false),
        ("state", []) => println!("{}", board.machine()),
        ("press" | "release", [key]) => match single_char(key) {
            Some(key) => {
                let time = board.current_time();
                board.distribute_new(KeyEvent { time, key, pressed: cmd == "press" });
            }
            None => println!("Error: expected a single key, got '{}'", key),
        },
        ("type", [text]) => {
            for key in text.chars() {
                type_key(board, key)?;
            }
        }
        ("run", [time]) => match parse_duration(time) {
            Ok(d) => match board.current_time().checked_add(d) {
                Some(limit) => board.run_until(limit)?,
                None => println!("Error: cannot run {} past the end of the clock", d),
            },
            Err(e) => println!("Error: {}", e),
        },
        ("reverse", ["help"]) | ("help", _) => print!("{}", USAGE),
        ("reverse", sub) => match board.execute_command(sub) {
            Ok(out) => print!("{}", out),
            Err(e) if e.is_usage() => println!("Error: {}", e),
            Err(e) => return Err(e.into()),
        },
        _ => println!("Unknown command: {}", line.trim()),
    }
    Ok(true)
}

fn type_key(board: &mut Board, key: char) -> anyhow::Result<()> {
    for pressed in [true, false] {
        let time = board.current_time();
        board.distribute_new(KeyEvent { time, key, pressed });
        board.run_until(time.saturating_add(TYPE_GAP))?;
    }
    Ok(())
}

fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverse_core::{EmuTime, ReverseMode};

    fn board() -> Board {
        let cfg = ReverseConfig {
            auto_start: true,
            ..ReverseConfig::with_period(EmuDuration::from_ticks(50_000))
        };
        Motherboard::new(KeyboardMachine::new(1), &cfg).unwrap()
    }

    #[test]
    fn test_rewind_typing() {
        let mut b = board();
        run_line(&mut b, "type abc").unwrap();
        assert_eq!(b.machine().typed(), "abc");

        // back to 25 ms: 'a' typed, 'b' held down
        run_line(&mut b, "reverse goback 0.035").unwrap();
        assert_eq!(b.reverse().mode(), ReverseMode::Replaying);
        assert_eq!(b.machine().typed(), "");
        run_line(&mut b, "run 0.03").unwrap();
        assert_eq!(b.reverse().mode(), ReverseMode::Collecting);
        assert_eq!(b.machine().typed(), "ab");

        run_line(&mut b, "type z").unwrap();
        assert_eq!(b.machine().typed(), "abz");
        assert_eq!(b.reverse().history().events.len(), 5);
    }

    #[test]
    fn test_usage_errors_keep_session() {
        let mut b = board();
        assert!(run_line(&mut b, "reverse goto").unwrap());
        assert!(run_line(&mut b, "press ab").unwrap());
        assert!(run_line(&mut b, "run soon").unwrap());
        assert!(run_line(&mut b, "").unwrap());
        assert!(!run_line(&mut b, "quit").unwrap());
        assert_eq!(b.reverse().mode(), ReverseMode::Collecting);
    }

    #[test]
    fn test_run_past_end_of_clock() {
        let mut b = board();
        run_line(&mut b, "run 5t").unwrap();
        assert!(run_line(&mut b, "run 18446744073709551615t").unwrap());
        assert_eq!(b.current_time(), EmuTime::from_ticks(5));
        assert_eq!(b.reverse().mode(), ReverseMode::Collecting);
    }
}
