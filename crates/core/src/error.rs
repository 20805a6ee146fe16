//! Error types.
//!
//! Only recoverable conditions live here: usage errors surfaced to the
//! operator and snapshot capture/restore failures. Broken invariants of the
//! history (time going backwards, mismatched event counts) are bugs and panic.

use crate::time::EmuTime;
use thiserror::Error;

/// Failure of the opaque snapshot capability.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serialize error: {0}")]
    Encode(#[source] bincode::Error),
    #[error("deserialize error: {0}")]
    Decode(#[source] bincode::Error),
    #[error("decompress error: {0}")]
    Decompress(String),
    #[error("snapshot blob too small ({0} bytes)")]
    Truncated(usize),
    #[error("invalid snapshot blob (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Errors reported by the reverse engine and its command surface.
#[derive(Debug, Error)]
pub enum ReverseError {
    #[error("reverse is not enabled, first execute 'reverse start' to start collecting data")]
    NotCollecting,
    #[error("target {target} is before the recorded history (oldest snapshot at {oldest})")]
    BeforeHistory { target: EmuTime, oldest: EmuTime },
    #[error("cannot go back {requested} events, only {available} recorded")]
    NotEnoughEvents { requested: usize, available: usize },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl ReverseError {
    /// Usage errors leave the engine untouched; the rest ended an operation.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            ReverseError::NotCollecting
                | ReverseError::BeforeHistory { .. }
                | ReverseError::NotEnoughEvents { .. }
                | ReverseError::Syntax(_)
        )
    }
}
