// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative timelines for scrollstage.
//!
//! This crate provides the pure evaluation core of the stage engine:
//! - Typed property values with component-wise interpolation
//! - A closed set of named easing curves
//! - Segments animating one property over a sub-range of progress
//! - Timelines evaluated to a frame of target/property values
//! - Playback clocks and scrub smoothing for time-driven progress
//!
//! ## Architecture
//!
//! Everything here is data plus pure functions of progress. A timeline is
//! validated once when it is built; after that `evaluate(p)` cannot fail and
//! always yields the same frame for the same `p`. Mutable state (clocks,
//! smoothers) lives in the driver, never in the timeline.

pub mod binding;
pub mod easing;
pub mod error;
pub mod playback;
pub mod segment;
pub mod timeline;
pub mod value;

pub use binding::{ChannelKey, TargetId};
pub use easing::{EaseMode, Easing};
pub use error::{Result, TimelineError};
pub use playback::{ClockState, DriveMode, PlaybackClock, PlaybackState, ScrubSmoother};
pub use segment::{Segment, SegmentPhase};
pub use timeline::{Frame, Timeline, TimelineDriver, TimelineSpec};
pub use value::{PropertyValue, ValueKind};
