//! Virtual (emulated) time.
//!
//! [`EmuTime`] is an absolute point on the emulator's master clock and
//! [`EmuDuration`] a distance between two such points. Both count ticks of
//! [`TICKS_PER_SECOND`]; nothing here ever looks at the host's wall clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Master clock resolution: 1 tick = 1 µs of emulated time.
pub const TICKS_PER_SECOND: u64 = 1_000_000;

/// Absolute emulated time in master clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmuTime(u64);

/// Distance between two [`EmuTime`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmuDuration(u64);

impl EmuTime {
    pub const ZERO: EmuTime = EmuTime(0);

    pub const fn from_ticks(ticks: u64) -> Self { EmuTime(ticks) }

    pub const fn ticks(self) -> u64 { self.0 }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }

    /// `self - d`, clamped at time zero.
    pub fn saturating_sub(self, d: EmuDuration) -> EmuTime {
        EmuTime(self.0.saturating_sub(d.0))
    }

    /// `self + d`, or `None` past the end of the master clock.
    pub fn checked_add(self, d: EmuDuration) -> Option<EmuTime> {
        self.0.checked_add(d.0).map(EmuTime)
    }

    /// `self + d`, clamped at the last representable tick.
    pub fn saturating_add(self, d: EmuDuration) -> EmuTime {
        EmuTime(self.0.saturating_add(d.0))
    }

    /// Distance from `earlier` to `self`, or zero if `earlier` is later.
    pub fn since(self, earlier: EmuTime) -> EmuDuration {
        EmuDuration(self.0.saturating_sub(earlier.0))
    }
}

impl EmuDuration {
    pub const ZERO: EmuDuration = EmuDuration(0);

    pub const fn from_ticks(ticks: u64) -> Self { EmuDuration(ticks) }

    pub const fn ticks(self) -> u64 { self.0 }

    /// Convert seconds to a duration, rounding to the nearest tick.
    /// Returns `None` for negative, NaN or out-of-range input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let ticks = (secs * TICKS_PER_SECOND as f64).round();
        if ticks > u64::MAX as f64 {
            return None;
        }
        Some(EmuDuration(ticks as u64))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }
}

impl Add<EmuDuration> for EmuTime {
    type Output = EmuTime;
    fn add(self, d: EmuDuration) -> EmuTime { EmuTime(self.0 + d.0) }
}

impl Sub<EmuDuration> for EmuTime {
    type Output = EmuTime;
    fn sub(self, d: EmuDuration) -> EmuTime { EmuTime(self.0 - d.0) }
}

impl fmt::Display for EmuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

impl fmt::Display for EmuDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_conversion() {
        let d = EmuDuration::from_secs_f64(1.5).unwrap();
        assert_eq!(d.ticks(), 1_500_000);
        assert_eq!(EmuDuration::from_secs_f64(-1.0), None);
        assert_eq!(EmuDuration::from_secs_f64(f64::NAN), None);
    }

    #[test]
    fn test_saturating_sub() {
        let t = EmuTime::from_ticks(10);
        assert_eq!(t.saturating_sub(EmuDuration::from_ticks(4)), EmuTime::from_ticks(6));
        assert_eq!(t.saturating_sub(EmuDuration::from_ticks(40)), EmuTime::ZERO);
        assert_eq!(EmuTime::from_ticks(3).since(t), EmuDuration::ZERO);
    }

    #[test]
    fn test_add_near_end_of_clock() {
        let end = EmuTime::from_ticks(u64::MAX - 2);
        assert_eq!(end.checked_add(EmuDuration::from_ticks(2)), Some(EmuTime::from_ticks(u64::MAX)));
        assert_eq!(end.checked_add(EmuDuration::from_ticks(3)), None);
        assert_eq!(end.saturating_add(EmuDuration::from_ticks(10)), EmuTime::from_ticks(u64::MAX));
    }

    #[test]
    fn test_display() {
        assert_eq!(EmuTime::from_ticks(2_500_000).to_string(), "2.500000s");
    }
}
