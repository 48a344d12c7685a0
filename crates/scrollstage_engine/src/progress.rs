// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scroll position to section progress.

use crate::sampler::Direction;
use serde::{Deserialize, Serialize};

/// Scroll range of a section in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollBounds {
    /// Position where progress is 0
    pub start: f64,
    /// Position where progress is 1
    pub end: f64,
}

impl ScrollBounds {
    /// Create bounds
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Create bounds from a start and a scroll length
    pub fn with_length(start: f64, length: f64) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// Finite with a positive length
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.end > self.start
    }

    /// Scroll length
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `position` lies within `[start, end]`
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }

    /// Scroll position for a progress value
    pub fn position_at(&self, progress: f64) -> f64 {
        self.start + self.length() * progress
    }

    /// Progress of `position` without clamping; negative before the start
    pub fn unclamped_progress(&self, position: f64) -> f64 {
        (position - self.start) / self.length()
    }
}

/// Result of mapping a scroll position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReading {
    /// Progress in [0, 1]
    pub progress: f64,
    /// Direction after this reading
    pub direction: Direction,
    /// Whether progress differs from the previous reading
    pub changed: bool,
}

/// Maps scroll positions within bounds to progress
#[derive(Debug, Clone)]
pub struct ProgressMapper {
    bounds: Option<ScrollBounds>,
    progress: f64,
    direction: Direction,
    warned: bool,
}

impl ProgressMapper {
    /// Create a mapper with no bounds yet
    pub fn new() -> Self {
        Self {
            bounds: None,
            progress: 0.0,
            direction: Direction::Forward,
            warned: false,
        }
    }

    /// Current bounds
    pub fn bounds(&self) -> Option<ScrollBounds> {
        self.bounds
    }

    /// Replace bounds. Invalid bounds pin progress at 1 and log once.
    pub fn set_bounds(&mut self, bounds: ScrollBounds) {
        self.bounds = Some(bounds);
        self.warned = false;
        if !bounds.is_valid() {
            self.warn_degenerate(bounds);
            self.record(1.0, 0);
        }
    }

    /// Whether bounds are missing or unusable
    pub fn is_degenerate(&self) -> bool {
        !self.bounds.is_some_and(|b| b.is_valid())
    }

    /// Current progress
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Last known direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Map a scroll position to progress
    pub fn map(&mut self, scroll_y: f64) -> ProgressReading {
        self.map_wrapped(scroll_y, 0)
    }

    /// Map a position that was just shifted by whole loop turns (+1 after a
    /// forward wrap). Direction is judged on the unwrapped axis, so a wrap
    /// does not read as a reversal.
    pub fn map_wrapped(&mut self, scroll_y: f64, turns: i64) -> ProgressReading {
        let progress = match self.bounds {
            Some(bounds) if bounds.is_valid() => {
                if scroll_y.is_nan() {
                    self.progress
                } else {
                    ((scroll_y - bounds.start) / bounds.length()).clamp(0.0, 1.0)
                }
            }
            Some(bounds) => {
                self.warn_degenerate(bounds);
                1.0
            }
            None => self.progress,
        };
        self.record(progress, turns)
    }

    /// Force progress (settle completion, playback). Direction follows the
    /// same tie rule as mapping.
    pub fn set_progress(&mut self, progress: f64) -> ProgressReading {
        self.set_progress_wrapped(progress, 0)
    }

    /// [`Self::set_progress`] across a loop wrap
    pub fn set_progress_wrapped(&mut self, progress: f64, turns: i64) -> ProgressReading {
        let progress = if progress.is_nan() { self.progress } else { progress.clamp(0.0, 1.0) };
        self.record(progress, turns)
    }

    fn record(&mut self, progress: f64, turns: i64) -> ProgressReading {
        let delta = progress + turns as f64 - self.progress;
        // An exact tie keeps the last direction
        if let Some(direction) = Direction::from_delta(delta) {
            self.direction = direction;
        }
        self.progress = progress;
        ProgressReading {
            progress,
            direction: self.direction,
            changed: delta != 0.0,
        }
    }

    fn warn_degenerate(&mut self, bounds: ScrollBounds) {
        if !self.warned {
            tracing::warn!(
                "Degenerate scroll bounds {}..{}; section held at progress 1",
                bounds.start,
                bounds.end
            );
            self.warned = true;
        }
    }
}

impl Default for ProgressMapper {
    fn default() -> Self {
        Self::new()
    }
}
