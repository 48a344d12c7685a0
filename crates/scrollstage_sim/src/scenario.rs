// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scenario files: a stage setup plus a timed script of host events.

use scrollstage_engine::{EngineConfig, EngineError, LayoutReason, Millis, RawScrollEvent, SectionSpec, StaticLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or replaying a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Scenario file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario text is not valid RON for a scenario
    #[error("Scenario parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The engine rejected a step
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Report output failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A step names a section that was never registered
    #[error("Step {step}: unknown section '{section}'")]
    UnknownSection {
        /// Step index
        step: usize,
        /// Section id
        section: String,
    },

    /// A step is timed before an earlier one
    #[error("Step {step}: time {at}ms is before {now}ms")]
    TimeWentBackwards {
        /// Step index
        step: usize,
        /// Requested time
        at: Millis,
        /// Latest time already replayed
        now: Millis,
    },

    /// A step's parameters make no sense
    #[error("Step {step}: {reason}")]
    InvalidStep {
        /// Step index
        step: usize,
        /// What is wrong with it
        reason: String,
    },
}

/// One scripted host event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Raw scroll input at a time
    Input {
        /// The event
        event: RawScrollEvent,
        /// Host time
        at: Millis,
    },
    /// One display frame
    Frame(Millis),
    /// Frames every `every` ms after the current time, up to `until`
    Advance {
        /// Last frame time (inclusive)
        until: Millis,
        /// Frame interval
        every: Millis,
    },
    /// Manual slideshow selection
    Select {
        /// Section id
        section: String,
        /// Item index
        index: usize,
        /// Host time
        at: Millis,
    },
    /// Animated scroll to a snap stop
    Navigate {
        /// Section id
        section: String,
        /// Snap stop index
        index: usize,
        /// Host time
        at: Millis,
    },
    /// Recompute trigger bounds
    Invalidate(LayoutReason),
    /// Replace the measured layout
    Relayout {
        /// New geometry
        layout: StaticLayout,
        /// Why it changed
        reason: LayoutReason,
    },
    /// Explicit bounds for a section
    Bounds {
        /// Section id
        section: String,
        /// Scroll position at progress 0
        start: f64,
        /// Scroll position at progress 1
        end: f64,
    },
    /// Attach a recorded video target
    BindVideo {
        /// Section id
        section: String,
        /// Media id
        media: String,
    },
    /// Attach a recorded rotation target
    BindRotation {
        /// Section id
        section: String,
        /// Media id
        media: String,
        /// Radians at progress 1
        range: f64,
    },
    /// Video metadata arrived
    MediaLoaded {
        /// Section id
        section: String,
        /// Media id
        media: String,
        /// Duration in seconds
        duration: f64,
    },
    /// Video metadata failed
    MediaFailed {
        /// Section id
        section: String,
        /// Media id
        media: String,
        /// Failure description
        reason: String,
    },
    /// Register another section mid-run
    Register(SectionSpec),
    /// Tear a section down
    Dispose(String),
}

/// A stage setup and the script replayed against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Engine settings
    #[serde(default)]
    pub config: EngineConfig,
    /// Measured geometry
    #[serde(default)]
    pub layout: StaticLayout,
    /// Sections registered before the first step
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
    /// Host events in time order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from RON
    pub fn from_ron(source: &str) -> Result<Self, ScenarioError> {
        Ok(ron::from_str(source)?)
    }

    /// Load a scenario file
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron(&content)?;
        tracing::debug!(
            "Loaded scenario {:?}: {} sections, {} steps",
            path,
            scenario.sections.len(),
            scenario.steps.len()
        );
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrollstage_engine::{BoundsSpec, DriveSpec, SnapSpec};

    #[test]
    fn test_bundled_scenarios_parse() {
        let slideshow = Scenario::from_ron(include_str!("../scenarios/feature_slideshow.ron")).unwrap();
        assert_eq!(slideshow.sections.len(), 1);
        assert!(matches!(slideshow.sections[0].drive, DriveSpec::Autoplay(_)));

        let phones = Scenario::from_ron(include_str!("../scenarios/phone_scroll.ron")).unwrap();
        assert_eq!(phones.sections[0].snap, Some(SnapSpec::Evenly(5)));
        assert!(matches!(phones.sections[0].bounds, Some(BoundsSpec::Trigger(_))));
        assert_eq!(phones.layout.viewport_height, 800.0);
    }

    #[test]
    fn test_minimal_scenario_uses_defaults() {
        let scenario = Scenario::from_ron("(steps: [Frame(0)])").unwrap();
        assert_eq!(scenario.config, EngineConfig::default());
        assert!(scenario.sections.is_empty());
        assert_eq!(scenario.steps, vec![Step::Frame(0)]);
    }

    #[test]
    fn test_bad_trigger_is_a_parse_error() {
        let source = r#"(
            sections: [(
                id: "phones",
                bounds: Some(Trigger((element: "phones", start: "top", end: "+=300%"))),
            )],
            steps: [],
        )"#;
        assert!(matches!(Scenario::from_ron(source), Err(ScenarioError::Parse(_))));
    }
}
