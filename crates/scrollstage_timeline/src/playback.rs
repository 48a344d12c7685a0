// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback clocks and scrub smoothing.
//!
//! A [`PlaybackClock`] advances progress from host time for timelines that
//! are not scroll-bound. Progress is always recomputed from an anchor
//! (progress and timestamp at the last play/seek), never accumulated per
//! tick, so repeated ticks at the same time cannot drift.

use crate::error::{Result, TimelineError};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a section's animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing is moving
    #[default]
    Idle,
    /// Progress follows scroll input
    Scrubbing,
    /// Progress advances from the clock
    AutoPlaying,
    /// Snap settle animation running
    Settling,
    /// Auto-advance suspended by manual interaction
    Paused,
}

impl PlaybackState {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scrubbing => "scrubbing",
            Self::AutoPlaying => "autoplaying",
            Self::Settling => "settling",
            Self::Paused => "paused",
        }
    }
}

/// How a driver obtains progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveMode {
    /// Caller supplies progress synchronously
    #[default]
    Scrub,
    /// Internal clock advances progress
    Playback,
}

/// State of a playback clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// Not started
    #[default]
    Stopped,
    /// Advancing
    Running,
    /// Held at the current progress
    Paused,
    /// Reached 1 without looping
    Finished,
}

/// Clock advancing progress at a fixed rate
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    duration_ms: u64,
    looping: bool,
    state: ClockState,
    anchor_progress: f64,
    anchor_time: u64,
    last_time: u64,
    progress: f64,
}

impl PlaybackClock {
    /// Create a clock covering [0, 1] in `duration_ms`
    pub fn new(duration_ms: u64) -> Result<Self> {
        if duration_ms == 0 {
            return Err(TimelineError::ZeroDuration);
        }
        Ok(Self {
            duration_ms,
            looping: false,
            state: ClockState::Stopped,
            anchor_progress: 0.0,
            anchor_time: 0,
            last_time: 0,
            progress: 0.0,
        })
    }

    /// Wrap to 0 instead of finishing at 1
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Duration of one pass in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Current state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Current progress
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Start or resume advancing from the current progress at `now`
    pub fn play(&mut self, now: u64) {
        if self.state == ClockState::Running {
            return;
        }
        if self.state == ClockState::Finished {
            self.progress = 0.0;
        }
        self.anchor_progress = self.progress;
        self.anchor_time = now;
        self.last_time = now;
        self.state = ClockState::Running;
    }

    /// Hold at the current progress
    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    /// Stop advancing because something else took over progress.
    /// Safe to call repeatedly.
    pub fn interrupt(&mut self) {
        if matches!(self.state, ClockState::Running | ClockState::Paused) {
            self.state = ClockState::Stopped;
        }
    }

    /// Jump to `progress`, re-anchoring a running clock at `now`
    pub fn seek(&mut self, progress: f64, now: u64) {
        self.progress = sanitize(progress);
        self.anchor_progress = self.progress;
        self.anchor_time = now.max(self.last_time);
        // Ticks older than the seek must not re-derive progress from the new anchor
        self.last_time = self.anchor_time;
        if self.state == ClockState::Finished {
            self.state = ClockState::Stopped;
        }
    }

    /// Advance to `now` and return the progress.
    ///
    /// Timestamps older than the last accepted one are ignored, so a stale
    /// callback can never move progress backwards.
    pub fn advance(&mut self, now: u64) -> f64 {
        if self.state != ClockState::Running || now < self.last_time {
            return self.progress;
        }
        self.last_time = now;

        let elapsed = now.saturating_sub(self.anchor_time) as f64 / self.duration_ms as f64;
        let raw = self.anchor_progress + elapsed;
        if raw >= 1.0 {
            if self.looping {
                self.progress = raw.fract();
            } else {
                self.progress = 1.0;
                self.state = ClockState::Finished;
            }
        } else {
            self.progress = raw;
        }
        self.progress
    }

    /// Whether the clock is advancing
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }
}

/// Exponential lag between scroll progress and displayed progress.
///
/// With a zero lag the displayed value follows the target exactly.
#[derive(Debug, Clone, Default)]
pub struct ScrubSmoother {
    lag_ms: u64,
    current: f64,
    target: f64,
    last_time: Option<u64>,
}

impl ScrubSmoother {
    /// Settle threshold below which the displayed value jumps to the target
    const EPSILON: f64 = 1e-4;

    /// Create a smoother with the given time constant
    pub fn new(lag_ms: u64) -> Self {
        Self {
            lag_ms,
            ..Self::default()
        }
    }

    /// Set the progress to approach
    pub fn set_target(&mut self, target: f64) {
        self.target = sanitize(target);
        if self.lag_ms == 0 {
            self.current = self.target;
        }
    }

    /// Snap both displayed and target progress
    pub fn reset(&mut self, progress: f64) {
        self.target = sanitize(progress);
        self.current = self.target;
    }

    /// Displayed progress
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Whether the displayed value still trails the target
    pub fn is_moving(&self) -> bool {
        self.current != self.target
    }

    /// Advance displayed progress toward the target
    pub fn advance(&mut self, now: u64) -> f64 {
        let last = self.last_time.replace(now.max(self.last_time.unwrap_or(now)));
        if self.lag_ms == 0 {
            self.current = self.target;
            return self.current;
        }
        let dt = match last {
            Some(last) if now > last => (now - last) as f64,
            _ => return self.current,
        };

        let alpha = 1.0 - (-dt / self.lag_ms as f64).exp();
        self.current += (self.target - self.current) * alpha;
        if (self.target - self.current).abs() < Self::EPSILON {
            self.current = self.target;
        }
        self.current
    }
}

/// Clamp to [0, 1], mapping NaN to 0
pub(crate) fn sanitize(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}
