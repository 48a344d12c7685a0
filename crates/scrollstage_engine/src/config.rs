// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! Timing constants for settle debounce, snap animation and autoplay resume,
//! plus input scaling. Loaded from RON; every field has a default so partial
//! files are accepted.

use crate::error::{EngineError, Result};
use scrollstage_timeline::Easing;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet time after the last scroll delta before snapping (ms)
    pub settle_debounce_ms: u64,
    /// Idle window after a manual selection before autoplay resumes (ms)
    pub autoplay_idle_ms: u64,
    /// Settle duration for the shortest snap (ms)
    pub snap_min_ms: u64,
    /// Settle duration for a full-interval snap (ms)
    pub snap_max_ms: u64,
    /// Easing of the settle animation
    pub snap_ease: Easing,
    /// Duration of host-requested navigation to a snap stop (ms)
    pub navigate_ms: u64,
    /// Easing of navigation
    pub navigate_ease: Easing,
    /// Scale applied to wheel deltas
    pub wheel_multiplier: f64,
    /// Scale applied to touch deltas
    pub touch_multiplier: f64,
    /// Default scrub lag for sections that do not set one (ms, 0 = direct)
    pub scrub_lag_ms: u64,
    /// Largest scroll position of the container (px)
    pub max_scroll: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_debounce_ms: 100,
            autoplay_idle_ms: 10_000,
            snap_min_ms: 150,
            snap_max_ms: 250,
            snap_ease: Easing::power(1, scrollstage_timeline::EaseMode::Out),
            navigate_ms: 1000,
            navigate_ease: Easing::power(2, scrollstage_timeline::EaseMode::InOut),
            wheel_multiplier: 0.8,
            touch_multiplier: 2.0,
            scrub_lag_ms: 0,
            max_scroll: f64::MAX,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: EngineConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Save as pretty RON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_ron()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Serialize as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.wheel_multiplier.is_finite() && self.wheel_multiplier >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "wheel_multiplier must be a non-negative number, got {}",
                self.wheel_multiplier
            )));
        }
        if !(self.touch_multiplier.is_finite() && self.touch_multiplier >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "touch_multiplier must be a non-negative number, got {}",
                self.touch_multiplier
            )));
        }
        if self.snap_min_ms > self.snap_max_ms {
            return Err(EngineError::InvalidConfig(format!(
                "snap_min_ms ({}) exceeds snap_max_ms ({})",
                self.snap_min_ms, self.snap_max_ms
            )));
        }
        if self.max_scroll.is_nan() || self.max_scroll < 0.0 {
            return Err(EngineError::InvalidConfig("max_scroll must be non-negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.settle_debounce_ms, 100);
        assert_eq!(config.autoplay_idle_ms, 10_000);
        assert_eq!(config.navigate_ms, 1000);
        assert_eq!(config.navigate_ease.to_string(), "power2.inOut");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = EngineConfig::from_ron("(autoplay_idle_ms: 4000, snap_ease: \"power2.inOut\")").unwrap();
        assert_eq!(config.autoplay_idle_ms, 4000);
        assert_eq!(config.settle_debounce_ms, 100);
        assert_eq!(config.snap_ease, Easing::power(2, scrollstage_timeline::EaseMode::InOut));
    }

    #[test]
    fn test_serialization() {
        let mut config = EngineConfig::default();
        config.max_scroll = 12_000.0;
        let ron_str = config.to_ron().unwrap();
        let loaded = EngineConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EngineConfig::from_ron("(snap_min_ms: 300, snap_max_ms: 200)"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_ron("(wheel_multiplier: -1.0)"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_ron("(snap_ease: \"wobble\")"),
            Err(EngineError::ConfigParse(_))
        ));
    }
}
