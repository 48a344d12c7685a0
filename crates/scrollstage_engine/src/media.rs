// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-way sync from section progress to external media.
//!
//! Video targets receive `current_time = progress * duration` once their
//! metadata is known; until then the latest mapping is queued. Rotation
//! targets receive `progress * range` radians immediately. Nothing read back
//! from the media ever feeds into progress.

use std::f64::consts::TAU;
use std::fmt;

/// A video element's playback position setter
pub trait MediaTarget {
    /// Seek to `seconds`
    fn set_current_time(&mut self, seconds: f64);
}

/// A 3D scene node's rotation setter
pub trait RotationTarget {
    /// Set rotation about the carousel axis in radians
    fn set_rotation(&mut self, radians: f64);
}

/// Binding state of an adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaState {
    /// Waiting for metadata; holds the latest progress to flush
    Pending {
        /// Most recent progress seen while pending
        queued: Option<f64>,
    },
    /// Writes go straight to the target
    Bound {
        /// Full output range (seconds for video, radians for rotation)
        range: f64,
    },
    /// Metadata failed; progress is dropped
    Unbound,
}

enum Sink {
    Video(Box<dyn MediaTarget>),
    Rotation(Box<dyn RotationTarget>),
}

/// Maps progress onto one media target
pub struct MediaSyncAdapter {
    id: String,
    sink: Sink,
    state: MediaState,
    last_written: Option<f64>,
}

impl fmt::Debug for MediaSyncAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Video(_) => "video",
            Sink::Rotation(_) => "rotation",
        };
        f.debug_struct("MediaSyncAdapter")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("state", &self.state)
            .field("last_written", &self.last_written)
            .finish()
    }
}

impl MediaSyncAdapter {
    /// Bind a video whose duration is not known yet
    pub fn video(id: impl Into<String>, target: impl MediaTarget + 'static) -> Self {
        Self {
            id: id.into(),
            sink: Sink::Video(Box::new(target)),
            state: MediaState::Pending { queued: None },
            last_written: None,
        }
    }

    /// Bind a rotation target; `range` radians at progress 1
    pub fn rotation(id: impl Into<String>, target: impl RotationTarget + 'static, range: f64) -> Self {
        let range = if range.is_finite() { range } else { TAU };
        Self {
            id: id.into(),
            sink: Sink::Rotation(Box::new(target)),
            state: MediaState::Bound { range },
            last_written: None,
        }
    }

    /// Binding id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current binding state
    pub fn state(&self) -> MediaState {
        self.state
    }

    /// Last value written to the target
    pub fn last_written(&self) -> Option<f64> {
        self.last_written
    }

    /// Map `progress` onto the target, or queue it while pending
    pub fn apply(&mut self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        let progress = progress.clamp(0.0, 1.0);
        match &mut self.state {
            MediaState::Pending { queued } => *queued = Some(progress),
            MediaState::Bound { range } => {
                let value = progress * *range;
                self.write(value);
            }
            MediaState::Unbound => {}
        }
    }

    fn write(&mut self, value: f64) {
        if self.last_written == Some(value) {
            return;
        }
        match &mut self.sink {
            Sink::Video(target) => target.set_current_time(value),
            Sink::Rotation(target) => target.set_rotation(value),
        }
        self.last_written = Some(value);
    }

    /// Metadata arrived with the media duration in seconds.
    /// Flushes the queued mapping. Returns whether the adapter is now bound.
    pub fn metadata_loaded(&mut self, duration: f64) -> bool {
        if !(duration.is_finite() && duration > 0.0) {
            self.metadata_failed(&format!("unusable duration {duration}"));
            return false;
        }
        let queued = match self.state {
            MediaState::Pending { queued } => queued,
            MediaState::Bound { .. } | MediaState::Unbound => None,
        };
        self.state = MediaState::Bound { range: duration };
        tracing::debug!("Media '{}' bound with duration {:.3}s", self.id, duration);
        if let Some(progress) = queued {
            self.apply(progress);
        }
        true
    }

    /// Metadata could not be loaded; the adapter stops writing
    pub fn metadata_failed(&mut self, reason: &str) {
        if self.state != MediaState::Unbound {
            tracing::warn!("Media '{}' left unbound: {}", self.id, reason);
            self.state = MediaState::Unbound;
        }
    }

    /// Time-update reported by the media itself. Never drives progress.
    pub fn on_native_time_update(&self, seconds: f64) {
        tracing::trace!("Ignoring native time update {:.3}s from '{}'", seconds, self.id);
    }
}
