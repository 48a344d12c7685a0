// SPDX-License-Identifier: MIT OR Apache-2.0
//! Segment definitions for timelines.

use crate::binding::{ChannelKey, TargetId};
use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};

/// Where a progress value falls relative to a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentPhase {
    /// Progress is before `start_progress`
    Before,
    /// Progress is inside the range; carries the local linear t in [0, 1)
    Active(f64),
    /// Progress is at or past `end_progress`
    Reached,
}

/// One property animated over a sub-range of progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Target element
    pub target: TargetId,
    /// Property path on the target
    pub property: String,
    /// Value before the segment starts
    pub from: PropertyValue,
    /// Value once the segment is reached
    pub to: PropertyValue,
    /// Progress where the segment begins
    pub start_progress: f64,
    /// Progress where the segment is reached
    pub end_progress: f64,
    /// Easing applied inside the range
    #[serde(default)]
    pub easing: Easing,
    /// Play to the end value and back within the range
    #[serde(default)]
    pub yoyo: bool,
}

impl Segment {
    /// Create a segment spanning the full progress range
    pub fn new(
        target: impl Into<TargetId>,
        property: impl Into<String>,
        from: impl Into<PropertyValue>,
        to: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            target: target.into(),
            property: property.into(),
            from: from.into(),
            to: to.into(),
            start_progress: 0.0,
            end_progress: 1.0,
            easing: Easing::Linear,
            yoyo: false,
        }
    }

    /// Set the progress range
    pub fn over(mut self, start: f64, end: f64) -> Self {
        self.start_progress = start;
        self.end_progress = end;
        self
    }

    /// Set the easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Enable yoyo
    pub fn yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    /// Channel this segment animates
    pub fn channel(&self) -> ChannelKey {
        ChannelKey::new(self.target.clone(), self.property.clone())
    }

    /// Check ranges, finiteness and value kinds
    pub fn validate(&self) -> Result<()> {
        if self.property.is_empty() {
            return Err(TimelineError::EmptyProperty(self.target.to_string()));
        }

        let (start, end) = (self.start_progress, self.end_progress);
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(start) || !in_unit(end) || start > end {
            return Err(TimelineError::InvalidRange {
                target: self.target.to_string(),
                property: self.property.clone(),
                start,
                end,
            });
        }

        if !self.from.is_finite() || !self.to.is_finite() {
            return Err(TimelineError::NonFinite {
                target: self.target.to_string(),
                property: self.property.clone(),
            });
        }

        if self.from.kind() != self.to.kind() {
            return Err(TimelineError::KindMismatch {
                target: self.target.to_string(),
                property: self.property.clone(),
                from: self.from.kind(),
                to: self.to.kind(),
            });
        }

        Ok(())
    }

    /// Classify a progress value against this segment's range.
    ///
    /// Zero-length segments step at their start.
    pub fn phase(&self, progress: f64) -> SegmentPhase {
        if progress < self.start_progress {
            SegmentPhase::Before
        } else if progress >= self.end_progress {
            SegmentPhase::Reached
        } else {
            let span = self.end_progress - self.start_progress;
            SegmentPhase::Active((progress - self.start_progress) / span)
        }
    }

    /// Value of this segment at `progress`. Pure in `progress`.
    pub fn sample(&self, progress: f64) -> PropertyValue {
        match self.phase(progress) {
            SegmentPhase::Before => self.from.clone(),
            SegmentPhase::Reached if self.yoyo => self.from.clone(),
            SegmentPhase::Reached => self.to.clone(),
            SegmentPhase::Active(t) => {
                let shaped = if self.yoyo {
                    // There and back: peak at the midpoint
                    if t <= 0.5 {
                        2.0 * t
                    } else {
                        2.0 - 2.0 * t
                    }
                } else {
                    t
                };
                let eased = self.easing.apply(shaped);
                self.from
                    .interpolate(&self.to, eased)
                    .unwrap_or_else(|| self.from.clone())
            }
        }
    }
}
