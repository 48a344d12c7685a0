// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sections: one owner for all mutable state of a pinned region.
//!
//! A section combines progress mapping, the timeline driver, the snap
//! controller, media adapters and (for slideshows) the autoplay manager.
//! Host-facing readings are mirrored into [`SectionShared`] so handles can
//! read them without touching the engine core.

use crate::autoplay::{AutoplayEvent, AutoplaySpec, AutoplayState, InteractionAutoplayManager};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::layout::{LayoutProvider, TriggerSpec};
use crate::media::MediaSyncAdapter;
use crate::progress::{ProgressMapper, ScrollBounds};
use crate::sampler::{Direction, InputSource, ScrollSample};
use crate::snap::{SnapController, SnapPoints, SnapSpec, SnapStep};
use crate::timer::Millis;
use indexmap::IndexMap;
use scrollstage_timeline::{Frame, PlaybackClock, PlaybackState, ScrubSmoother, Timeline, TimelineDriver};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// Progress below which backward motion wraps a looping section
const LOOP_WRAP_THRESHOLD: f64 = 1e-5;

/// Registration key, unique for the lifetime of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SectionKey(pub(crate) u64);

/// How a section's bounds are obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundsSpec {
    /// Resolved from layout on every invalidation
    Trigger(TriggerSpec),
    /// Fixed scroll range
    Fixed(ScrollBounds),
}

/// What advances a section's progress
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DriveSpec {
    /// Scroll position within bounds
    #[default]
    Scroll,
    /// Internal clock, started when the section is first reached
    Playback {
        /// Time from 0 to 1
        duration_ms: Millis,
        /// Restart at 0 after reaching 1
        #[serde(default)]
        looping: bool,
    },
    /// Slideshow items advancing on a timer
    Autoplay(AutoplaySpec),
}

fn default_pin() -> bool {
    true
}

/// Declarative section description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Unique id; registering the same id again replaces the older section
    pub id: String,
    /// Scroll range; unset until measured or updated
    #[serde(default)]
    pub bounds: Option<BoundsSpec>,
    /// Hold the section in the viewport while inside its bounds
    #[serde(default = "default_pin")]
    pub pin: bool,
    /// Animation evaluated from progress
    #[serde(default)]
    pub timeline: Timeline,
    /// Snap stops
    #[serde(default)]
    pub snap: Option<SnapSpec>,
    /// Progress source
    #[serde(default)]
    pub drive: DriveSpec,
    /// Scrub lag override
    #[serde(default)]
    pub scrub_lag_ms: Option<Millis>,
    /// Wrap around at both ends instead of letting the user scroll out
    #[serde(default)]
    pub looping: bool,
}

impl SectionSpec {
    /// A pinned, scroll-driven section
    pub fn new(id: impl Into<String>, timeline: Timeline) -> Self {
        Self {
            id: id.into(),
            bounds: None,
            pin: true,
            timeline,
            snap: None,
            drive: DriveSpec::Scroll,
            scrub_lag_ms: None,
            looping: false,
        }
    }

    /// Use a fixed scroll range
    pub fn with_bounds(mut self, bounds: ScrollBounds) -> Self {
        self.bounds = Some(BoundsSpec::Fixed(bounds));
        self
    }

    /// Resolve bounds from a trigger
    pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
        self.bounds = Some(BoundsSpec::Trigger(trigger));
        self
    }

    /// Snap to stops when scrolling settles
    pub fn with_snap(mut self, snap: SnapSpec) -> Self {
        self.snap = Some(snap);
        self
    }

    /// Advance items on a timer
    pub fn with_autoplay(mut self, autoplay: AutoplaySpec) -> Self {
        self.drive = DriveSpec::Autoplay(autoplay);
        self
    }

    /// Play from a clock once reached
    pub fn with_playback(mut self, duration_ms: Millis, looping: bool) -> Self {
        self.drive = DriveSpec::Playback { duration_ms, looping };
        self
    }

    /// Smooth scrubbing with the given lag
    pub fn with_scrub_lag(mut self, lag_ms: Millis) -> Self {
        self.scrub_lag_ms = Some(lag_ms);
        self
    }

    /// Animate without pinning
    pub fn unpinned(mut self) -> Self {
        self.pin = false;
        self
    }

    /// Wrap at the ends, counting turns
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
}

/// Section readings visible to handles
#[derive(Debug)]
pub struct SectionShared {
    pub(crate) alive: Cell<bool>,
    pub(crate) progress: Cell<f64>,
    pub(crate) direction: Cell<Direction>,
    pub(crate) active_snap_index: Cell<Option<usize>>,
    pub(crate) state: Cell<PlaybackState>,
    pub(crate) pinned: Cell<bool>,
    pub(crate) iteration: Cell<i64>,
    pub(crate) item_count: Option<usize>,
    pub(crate) snap_count: Option<usize>,
    pub(crate) looping: bool,
}

/// One evaluated section state, delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionUpdate {
    /// Registration key
    pub key: SectionKey,
    /// Section id
    pub id: String,
    /// Non-decreasing per section
    pub timestamp: Millis,
    /// Displayed progress
    pub progress: f64,
    /// Direction of the last progress change
    pub direction: Direction,
    /// Whether the section holds the pin
    pub pinned: bool,
    /// Nearest snap stop
    pub active_snap_index: Option<usize>,
    /// Lifecycle state
    pub state: PlaybackState,
    /// Active slideshow item
    pub active_item: Option<usize>,
    /// Progress of the active slideshow item
    pub item_progress: Option<f64>,
    /// Slideshow transitions since the last update
    pub autoplay_events: Vec<AutoplayEvent>,
    /// Completed turns of a looping section
    pub loop_iteration: Option<i64>,
    /// Evaluated timeline
    pub frame: Frame,
}

/// A registered section
#[derive(Debug)]
pub struct Section {
    key: SectionKey,
    id: String,
    bounds_spec: Option<BoundsSpec>,
    explicit_bounds: bool,
    pin: bool,
    looping: bool,
    drive: DriveSpec,
    mapper: ProgressMapper,
    driver: TimelineDriver,
    smoother: ScrubSmoother,
    snap: Option<SnapController>,
    autoplay: Option<InteractionAutoplayManager>,
    media: IndexMap<String, MediaSyncAdapter>,
    state: PlaybackState,
    inside: bool,
    pinned: bool,
    playback_started: bool,
    user_scrubbed: bool,
    pending_write: Option<(f64, f64)>,
    iteration: i64,
    wrap_turns: i64,
    wrap_shift: Option<f64>,
    pending_events: Vec<AutoplayEvent>,
    last_seq: Option<u64>,
    last_timestamp: Millis,
    last_progress: Option<f64>,
    dirty: bool,
    shared: Rc<SectionShared>,
}

impl Section {
    /// Build a section from its spec
    pub fn new(key: SectionKey, spec: SectionSpec, config: &EngineConfig) -> Result<Self> {
        let invalid = |reason: &str| EngineError::InvalidSection {
            id: spec.id.clone(),
            reason: reason.to_string(),
        };
        if spec.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if spec.snap.is_some() && spec.drive != DriveSpec::Scroll {
            return Err(invalid("snapping requires a scroll-driven section"));
        }
        if spec.looping && spec.drive != DriveSpec::Scroll {
            return Err(invalid("looping requires a scroll-driven section"));
        }

        let snap = match &spec.snap {
            Some(snap) => Some(
                SnapController::new(
                    SnapPoints::from_spec(snap, &spec.timeline)?,
                    config.settle_debounce_ms,
                    config.snap_min_ms,
                    config.snap_max_ms,
                    config.snap_ease,
                )
                .with_navigation(config.navigate_ms, config.navigate_ease)
                .looping(spec.looping),
            ),
            None => None,
        };

        let (driver, autoplay) = match &spec.drive {
            DriveSpec::Scroll => (TimelineDriver::new(spec.timeline), None),
            DriveSpec::Playback { duration_ms, looping } => {
                let clock = PlaybackClock::new(*duration_ms)?.looping(*looping);
                (TimelineDriver::new(spec.timeline).with_clock(clock), None)
            }
            DriveSpec::Autoplay(autoplay) => (
                TimelineDriver::new(spec.timeline),
                Some(InteractionAutoplayManager::from_spec(autoplay, config.autoplay_idle_ms)?),
            ),
        };

        let mut mapper = ProgressMapper::new();
        let explicit_bounds = match &spec.bounds {
            Some(BoundsSpec::Fixed(bounds)) => {
                mapper.set_bounds(*bounds);
                true
            }
            _ => false,
        };

        let shared = Rc::new(SectionShared {
            alive: Cell::new(true),
            progress: Cell::new(mapper.progress()),
            direction: Cell::new(Direction::Forward),
            active_snap_index: Cell::new(None),
            state: Cell::new(PlaybackState::Idle),
            pinned: Cell::new(false),
            iteration: Cell::new(0),
            item_count: autoplay.as_ref().map(InteractionAutoplayManager::item_count),
            snap_count: snap.as_ref().map(|snap| snap.points().len()),
            looping: spec.looping,
        });

        Ok(Self {
            key,
            id: spec.id,
            bounds_spec: spec.bounds,
            explicit_bounds,
            pin: spec.pin,
            looping: spec.looping,
            drive: spec.drive,
            mapper,
            driver,
            smoother: ScrubSmoother::new(spec.scrub_lag_ms.unwrap_or(config.scrub_lag_ms)),
            snap,
            autoplay,
            media: IndexMap::new(),
            state: PlaybackState::Idle,
            inside: false,
            pinned: false,
            playback_started: false,
            user_scrubbed: false,
            pending_write: None,
            iteration: 0,
            wrap_turns: 0,
            wrap_shift: None,
            pending_events: Vec::new(),
            last_seq: None,
            last_timestamp: 0,
            last_progress: None,
            dirty: true,
            shared,
        })
    }

    /// Registration key
    pub fn key(&self) -> SectionKey {
        self.key
    }

    /// Section id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Readings shared with handles
    pub fn shared(&self) -> &Rc<SectionShared> {
        &self.shared
    }

    /// Current bounds
    pub fn bounds(&self) -> Option<ScrollBounds> {
        self.mapper.bounds()
    }

    /// Whether the section takes part in pin arbitration
    pub fn wants_pin(&self) -> bool {
        self.pin
    }

    /// Whether the section currently holds the pin
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Mapped progress
    pub fn progress(&self) -> f64 {
        self.mapper.progress()
    }

    /// Whether `position` falls within valid bounds
    pub fn contains(&self, position: f64) -> bool {
        self.mapper
            .bounds()
            .is_some_and(|bounds| bounds.is_valid() && bounds.contains(position))
    }

    /// Whether the section is scroll-driven
    pub fn is_scroll_driven(&self) -> bool {
        self.drive == DriveSpec::Scroll
    }

    /// Re-resolve trigger bounds. Bounds set through [`Self::set_bounds`]
    /// are kept.
    pub fn resolve_layout(&mut self, layout: &dyn LayoutProvider, position: f64) {
        if self.explicit_bounds {
            return;
        }
        let Some(BoundsSpec::Trigger(trigger)) = &self.bounds_spec else {
            return;
        };
        match trigger.resolve(layout) {
            Ok(bounds) => self.apply_bounds(bounds, position),
            Err(e) => tracing::warn!("Section '{}' bounds not resolved: {}", self.id, e),
        }
    }

    /// Replace bounds explicitly
    pub fn set_bounds(&mut self, bounds: ScrollBounds, position: f64) {
        self.explicit_bounds = true;
        self.apply_bounds(bounds, position);
    }

    fn apply_bounds(&mut self, bounds: ScrollBounds, position: f64) {
        if self.mapper.bounds() == Some(bounds) {
            return;
        }
        tracing::debug!("Section '{}' bounds {}..{}", self.id, bounds.start, bounds.end);
        self.mapper.set_bounds(bounds);
        if self.is_scroll_driven() {
            let reading = self.mapper.map(position);
            // Layout jumps are not animated
            self.smoother.reset(reading.progress);
        }
        self.dirty = true;
    }

    /// Apply one coalesced scroll sample. Samples older than the last one
    /// seen are dropped.
    pub fn on_sample(&mut self, sample: &ScrollSample, inside: bool, pinned: bool) {
        if self.last_seq.is_some_and(|last| sample.seq <= last) {
            tracing::trace!("Section '{}' dropped stale sample {}", self.id, sample.seq);
            return;
        }
        self.last_seq = Some(sample.seq);
        self.last_timestamp = self.last_timestamp.max(sample.timestamp);

        self.set_presence(inside, pinned);
        if !self.is_scroll_driven() {
            return;
        }

        // A requested wrap lands with the first sample after it
        let turns = std::mem::take(&mut self.wrap_turns);
        let reading = match self.pending_write.take() {
            Some((position, progress))
                if sample.source == InputSource::Programmatic && position == sample.position =>
            {
                self.mapper.set_progress_wrapped(progress, turns)
            }
            _ => self.mapper.map_wrapped(sample.position, turns),
        };
        if turns != 0 {
            self.iteration += turns;
            self.smoother.reset(reading.progress);
            self.dirty = true;
        }

        if sample.source == InputSource::User {
            if let Some(snap) = self.snap.as_mut() {
                if inside {
                    if let Some(interrupted) = snap.on_user_input(sample.timestamp) {
                        // Scrubbing resumes from where the transition was cut off
                        self.smoother.reset(interrupted);
                    }
                } else {
                    snap.cancel();
                }
            }
            self.user_scrubbed |= reading.changed;
        }
        self.smoother.set_target(reading.progress);

        if self.looping && turns == 0 && (inside || reading.changed) {
            if reading.progress >= 1.0 && reading.direction == Direction::Forward {
                self.request_wrap(1);
            } else if reading.progress < LOOP_WRAP_THRESHOLD && reading.direction == Direction::Backward {
                self.request_wrap(-1);
            }
        }
    }

    /// Queue a jump of whole section lengths. The scroll shift is written on
    /// the next frame and the turn is counted when its sample arrives.
    fn request_wrap(&mut self, turns: i64) {
        let Some(bounds) = self.mapper.bounds().filter(ScrollBounds::is_valid) else {
            return;
        };
        self.wrap_turns += turns;
        let shift = -(turns as f64) * bounds.length();
        self.wrap_shift = Some(self.wrap_shift.unwrap_or(0.0) + shift);
        if let Some(snap) = self.snap.as_mut() {
            snap.rebase(turns as f64);
        }
        tracing::debug!("Section '{}' wrapping {:+} turn(s)", self.id, turns);
    }

    /// Scroll shift owed by a wrap, if one was requested
    pub fn take_wrap(&mut self) -> Option<f64> {
        self.wrap_shift.take()
    }

    /// Completed turns of a looping section
    pub fn loop_iteration(&self) -> Option<i64> {
        self.looping.then_some(self.iteration)
    }

    /// Re-evaluate presence and progress at the current position without a
    /// new sample, after registration or a layout change.
    pub fn reconcile(&mut self, position: f64, inside: bool, pinned: bool) {
        self.set_presence(inside, pinned);
        if self.is_scroll_driven() && self.pending_write.is_none() {
            let reading = self.mapper.map(position);
            self.smoother.set_target(reading.progress);
        }
    }

    fn set_presence(&mut self, inside: bool, pinned: bool) {
        if pinned != self.pinned {
            tracing::debug!("Section '{}' {}", self.id, if pinned { "pinned" } else { "unpinned" });
            self.dirty = true;
        }
        self.inside = inside;
        self.pinned = pinned;
    }

    /// Step the snap controller. Returns the scroll position the settle
    /// wants this frame.
    pub fn poll_snap(&mut self, now: Millis) -> Option<f64> {
        if !self.is_scroll_driven() {
            return None;
        }
        let bounds = self.mapper.bounds().filter(ScrollBounds::is_valid)?;
        let progress = self.mapper.progress();
        let snap = self.snap.as_mut()?;
        // Only the section in control of the viewport may settle it;
        // navigation may start from anywhere on the page
        let navigating = snap.is_navigating();
        let in_control = if self.pin { self.pinned } else { self.inside };
        if !in_control && !navigating {
            return None;
        }
        let mut target = match snap.poll(now, progress, self.mapper.direction()) {
            SnapStep::Idle => return None,
            SnapStep::Started(animation) => animation.sample(now),
            SnapStep::Settling(at) => at,
            SnapStep::Completed(point) => {
                self.dirty = true;
                point.progress
            }
        };

        // Settles toward a stop of the next or previous turn cross the edge
        let mut wrapped = false;
        if self.looping && !navigating {
            if target > 1.0 {
                self.request_wrap(1);
                target -= 1.0;
                wrapped = true;
            } else if target < 0.0 {
                self.request_wrap(-1);
                target += 1.0;
                wrapped = true;
            }
        }
        if target == progress && !wrapped {
            return None;
        }
        let position = bounds.position_at(target);
        self.pending_write = Some((position, target));
        Some(position)
    }

    /// Attach a media adapter, replacing one with the same id
    pub fn attach_media(&mut self, mut adapter: MediaSyncAdapter) {
        adapter.apply(self.shared.progress.get());
        if self.media.insert(adapter.id().to_string(), adapter).is_some() {
            tracing::debug!("Section '{}' replaced a media binding", self.id);
        }
    }

    /// Forward loaded metadata to a media adapter
    pub fn media_loaded(&mut self, media_id: &str, duration: f64) -> Result<()> {
        let adapter = self
            .media
            .get_mut(media_id)
            .ok_or_else(|| EngineError::UnknownMedia(media_id.to_string()))?;
        adapter.metadata_loaded(duration);
        Ok(())
    }

    /// Mark a media adapter's metadata as failed
    pub fn media_failed(&mut self, media_id: &str, reason: &str) -> Result<()> {
        let adapter = self
            .media
            .get_mut(media_id)
            .ok_or_else(|| EngineError::UnknownMedia(media_id.to_string()))?;
        adapter.metadata_failed(reason);
        Ok(())
    }

    /// Forward a media element's own time update; it never moves progress
    pub fn media_time_update(&self, media_id: &str, seconds: f64) {
        if let Some(adapter) = self.media.get(media_id) {
            adapter.on_native_time_update(seconds);
        }
    }

    /// Manual slideshow selection
    pub fn select(&mut self, index: usize, now: Millis) -> Result<()> {
        let Some(autoplay) = self.autoplay.as_mut() else {
            return Err(EngineError::InvalidSection {
                id: self.id.clone(),
                reason: "not an autoplay section".into(),
            });
        };
        let events = autoplay.select(index, now)?;
        self.pending_events.extend(events);
        self.last_timestamp = self.last_timestamp.max(now);
        Ok(())
    }

    /// Animate the scroll position to the snap stop at `index`, starting
    /// from `position`
    pub fn navigate(&mut self, index: usize, now: Millis, position: f64) -> Result<()> {
        let invalid = |reason: &str| EngineError::InvalidSection {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let Some(bounds) = self.mapper.bounds().filter(ScrollBounds::is_valid) else {
            return Err(invalid("bounds are not resolved"));
        };
        let Some(snap) = self.snap.as_mut() else {
            return Err(invalid("no snap points"));
        };
        let count = snap.points().len();
        snap.navigate(index, bounds.unclamped_progress(position), now)
            .ok_or(EngineError::IndexOutOfRange { index, count })?;
        self.last_timestamp = self.last_timestamp.max(now);
        self.dirty = true;
        Ok(())
    }

    fn next_progress(&mut self, now: Millis) -> f64 {
        match &self.drive {
            DriveSpec::Scroll => self.smoother.advance(now),
            DriveSpec::Playback { .. } => {
                if !self.playback_started && (self.inside || self.mapper.bounds().is_none()) {
                    self.driver.play(now);
                    self.playback_started = true;
                    tracing::debug!("Section '{}' playback started", self.id);
                }
                self.driver.tick(now);
                self.mapper.set_progress(self.driver.progress()).progress
            }
            DriveSpec::Autoplay(_) => {
                let Some(autoplay) = self.autoplay.as_mut() else {
                    return self.mapper.progress();
                };
                let events = autoplay.tick(now);
                self.pending_events.extend(events);
                let progress = autoplay.overall_progress(now);
                self.mapper.set_progress(progress).progress
            }
        }
    }

    fn next_state(&self) -> PlaybackState {
        match &self.drive {
            DriveSpec::Scroll => {
                if self.snap.as_ref().is_some_and(SnapController::is_settling) {
                    PlaybackState::Settling
                } else if self.user_scrubbed
                    || self.smoother.is_moving()
                    || self.snap.as_ref().is_some_and(SnapController::is_pending)
                {
                    PlaybackState::Scrubbing
                } else {
                    PlaybackState::Idle
                }
            }
            DriveSpec::Playback { .. } if self.driver.is_playing() => PlaybackState::AutoPlaying,
            DriveSpec::Playback { .. } => PlaybackState::Idle,
            DriveSpec::Autoplay(_) => match self.autoplay.as_ref().map(InteractionAutoplayManager::state) {
                Some(AutoplayState::AutoPlaying) => PlaybackState::AutoPlaying,
                Some(AutoplayState::Paused) => PlaybackState::Paused,
                Some(AutoplayState::Disposed) | None => PlaybackState::Idle,
            },
        }
    }

    /// Advance to `now` and evaluate. Returns an update when anything
    /// observable changed.
    pub fn tick(&mut self, now: Millis) -> Option<SectionUpdate> {
        if !self.shared.alive.get() {
            return None;
        }
        let progress = self.next_progress(now);
        let state = self.next_state();
        let changed = self.last_progress != Some(progress);
        self.user_scrubbed = false;
        if !(self.dirty || changed || state != self.state || !self.pending_events.is_empty()) {
            return None;
        }

        self.dirty = false;
        self.state = state;
        self.last_progress = Some(progress);
        self.last_timestamp = self.last_timestamp.max(now);

        let frame = if self.is_scroll_driven() {
            self.driver.scrub(progress)
        } else {
            self.driver.evaluate(progress)
        };
        for adapter in self.media.values_mut() {
            adapter.apply(progress);
        }

        let direction = self.mapper.direction();
        let active_snap_index = self
            .snap
            .as_ref()
            .and_then(|snap| snap.active_index(progress, direction));

        self.shared.progress.set(progress);
        self.shared.direction.set(direction);
        self.shared.active_snap_index.set(active_snap_index);
        self.shared.state.set(state);
        self.shared.pinned.set(self.pinned);
        self.shared.iteration.set(self.iteration);

        Some(SectionUpdate {
            key: self.key,
            id: self.id.clone(),
            timestamp: self.last_timestamp,
            progress,
            direction,
            pinned: self.pinned,
            active_snap_index,
            state,
            active_item: self.autoplay.as_ref().map(InteractionAutoplayManager::active),
            item_progress: self.autoplay.as_ref().map(|a| a.item_progress(now)),
            autoplay_events: std::mem::take(&mut self.pending_events),
            loop_iteration: self.loop_iteration(),
            frame,
        })
    }

    /// Release the pin, cancel timers and drop media bindings. Idempotent.
    pub fn dispose(&mut self) {
        self.shared.alive.set(false);
        self.shared.pinned.set(false);
        self.pinned = false;
        self.inside = false;
        if let Some(snap) = self.snap.as_mut() {
            snap.cancel();
        }
        if let Some(autoplay) = self.autoplay.as_mut() {
            autoplay.dispose();
        }
        self.driver.pause();
        self.media.clear();
        self.pending_events.clear();
        self.pending_write = None;
        self.wrap_turns = 0;
        self.wrap_shift = None;
        tracing::debug!("Section '{}' disposed", self.id);
    }
}
