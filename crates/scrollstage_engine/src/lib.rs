// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scroll-progress orchestration.
//!
//! Turns raw scroll input into per-section progress and drives everything
//! hanging off it:
//! - Coalesced per-frame scroll sampling
//! - Section registration, pinning and layout-driven bounds
//! - Timeline evaluation in scrub or playback mode
//! - Snap-on-settle with directional tie-breaks
//! - One-way media sync (video time, 3D rotation)
//! - Slideshow autoplay that pauses on interaction
//!
//! ## Architecture
//!
//! Everything runs on the host's event loop. The host passes its clock into
//! every call and timers are polled from [`Stage::frame`], so a replayed
//! input sequence always produces the same updates.

pub mod autoplay;
pub mod config;
pub mod error;
pub mod layout;
pub mod media;
pub mod progress;
pub mod registry;
pub mod sampler;
pub mod section;
pub mod snap;
pub mod stage;
pub mod timer;

pub use autoplay::{AutoplayEvent, AutoplaySpec, AutoplayState, InteractionAutoplayManager};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use layout::{Anchor, Edge, ElementRect, LayoutProvider, LayoutReason, StaticLayout, TriggerEnd, TriggerSpec};
pub use media::{MediaState, MediaSyncAdapter, MediaTarget, RotationTarget};
pub use progress::{ProgressMapper, ProgressReading, ScrollBounds};
pub use registry::SectionRegistry;
pub use sampler::{Direction, InputSource, RawScrollEvent, ScrollSample, ScrollSampler, SubscriptionId};
pub use section::{BoundsSpec, DriveSpec, Section, SectionKey, SectionSpec, SectionUpdate};
pub use snap::{SettleAnimation, SnapController, SnapPoint, SnapPoints, SnapSpec, SnapStep};
pub use stage::{ListenerId, SectionHandle, Stage};
pub use timer::{IdleTimer, Millis};

pub use scrollstage_timeline::{Frame, PlaybackState, PropertyValue, Segment, Timeline};
