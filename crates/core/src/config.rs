//! Reverse engine configuration.
//!
//! ```toml
//! snapshot_period_secs = 1.0   # emulated seconds between snapshots
//! tier_width = 25              # retention tier width
//! compression_level = 6        # deflate level for snapshot blobs (0..=10)
//! auto_start = false           # start collecting as soon as the machine boots
//! ```

use crate::error::ReverseError;
use crate::time::EmuDuration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReverseConfig {
    pub snapshot_period_secs: f64,
    pub tier_width: u32,
    pub compression_level: u8,
    pub auto_start: bool,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        ReverseConfig {
            snapshot_period_secs: crate::DEFAULT_SNAPSHOT_PERIOD_SECS,
            tier_width: crate::DEFAULT_TIER_WIDTH,
            compression_level: 6,
            auto_start: false,
        }
    }
}

impl ReverseConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ReverseError> {
        let cfg: ReverseConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Config with a snapshot period given directly in ticks.
    pub fn with_period(period: EmuDuration) -> Self {
        ReverseConfig { snapshot_period_secs: period.as_secs_f64(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), ReverseError> {
        match self.snapshot_period() {
            Some(p) if p > EmuDuration::ZERO => {}
            _ => {
                return Err(ReverseError::Config(format!(
                    "snapshot_period_secs must be positive, got {}",
                    self.snapshot_period_secs
                )))
            }
        }
        if self.tier_width == 0 {
            return Err(ReverseError::Config("tier_width must be at least 1".into()));
        }
        if self.compression_level > 10 {
            return Err(ReverseError::Config(format!(
                "compression_level must be 0..=10, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }

    pub fn snapshot_period(&self) -> Option<EmuDuration> {
        EmuDuration::from_secs_f64(self.snapshot_period_secs)
    }
}
