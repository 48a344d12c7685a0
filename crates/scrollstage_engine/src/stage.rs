// SPDX-License-Identifier: MIT OR Apache-2.0
//! The stage: entry point for hosts.
//!
//! A [`Stage`] owns the sampler, the section registry and the layout
//! provider. The host feeds it raw input and calls [`Stage::frame`] once per
//! display frame. Each frame runs in a fixed order:
//!
//! 1. looping sections wrap, then settle and navigation animations write
//!    their scroll positions through the sampler
//! 2. the sampler emits at most one coalesced sample
//! 3. every section maps, ticks and evaluates
//! 4. listeners run, with no engine state borrowed
//!
//! Calls made while the engine is busy (from a listener, a media target or a
//! layout provider) are queued and applied once the current step finishes.
//! They never re-enter evaluation within the same frame.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::layout::{LayoutProvider, LayoutReason};
use crate::media::{MediaSyncAdapter, MediaTarget, RotationTarget};
use crate::progress::ScrollBounds;
use crate::sampler::{Direction, RawScrollEvent, ScrollSample, ScrollSampler, SubscriptionId};
use crate::registry::SectionRegistry;
use crate::section::{Section, SectionKey, SectionShared, SectionSpec, SectionUpdate};
use crate::timer::Millis;
use indexmap::IndexMap;
use scrollstage_timeline::PlaybackState;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Rc<RefCell<Box<dyn FnMut(&SectionUpdate)>>>;

/// Identifies a listener added with [`SectionHandle::on_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum MediaOp {
    Attach(MediaSyncAdapter),
    Loaded { id: String, duration: f64 },
    Failed { id: String, reason: String },
    TimeUpdate { id: String, seconds: f64 },
}

enum Deferred {
    Input(RawScrollEvent, Millis),
    Insert(Box<Section>),
    Remove(SectionKey),
    Bounds(SectionKey, ScrollBounds),
    Invalidate(LayoutReason),
    Layout(Box<dyn LayoutProvider>, LayoutReason),
    Media(SectionKey, MediaOp),
    Select(SectionKey, usize, Millis),
    Navigate(SectionKey, usize, Millis),
}

impl Deferred {
    fn name(&self) -> &'static str {
        match self {
            Deferred::Input(..) => "input",
            Deferred::Insert(_) => "register",
            Deferred::Remove(_) => "dispose",
            Deferred::Bounds(..) => "bounds update",
            Deferred::Invalidate(_) => "layout invalidation",
            Deferred::Layout(..) => "layout replacement",
            Deferred::Media(..) => "media",
            Deferred::Select(..) => "selection",
            Deferred::Navigate(..) => "navigation",
        }
    }
}

struct StageCore {
    sampler: ScrollSampler,
    registry: SectionRegistry,
    layout: Box<dyn LayoutProvider>,
}

impl StageCore {
    fn step(&mut self, now: Millis) -> Vec<SectionUpdate> {
        // User input this frame cancels settles, so they must not write
        let user_input = self.sampler.has_pending_user_input();
        for section in self.registry.iter_mut() {
            let write = if user_input { None } else { section.poll_snap(now) };
            // Wrap first; settle positions are absolute in the wrapped range
            if let Some(offset) = section.take_wrap() {
                self.sampler.shift(offset);
            }
            if let Some(position) = write {
                self.sampler.sample(RawScrollEvent::Programmatic { position }, now);
            }
        }
        if let Some(sample) = self.sampler.flush_frame(now) {
            tracing::trace!("Sample {} at {:.1}px ({:?})", sample.seq, sample.position, sample.direction);
            self.registry.apply_sample(&sample);
        }
        self.registry.iter_mut().filter_map(|section| section.tick(now)).collect()
    }

    fn invalidate(&mut self, reason: LayoutReason) {
        tracing::debug!("Layout invalidated: {:?}", reason);
        let position = self.sampler.position();
        self.registry.resolve_layout(self.layout.as_ref(), position);
        self.registry.reconcile(position);
    }
}

struct SectionListeners {
    section: Rc<SectionShared>,
    callbacks: Vec<(ListenerId, Listener)>,
}

/// State shared between a stage and its handles
struct StageShared {
    config: EngineConfig,
    core: RefCell<StageCore>,
    deferred: RefCell<VecDeque<Deferred>>,
    listeners: RefCell<IndexMap<SectionKey, SectionListeners>>,
    dispatching: Cell<bool>,
    next_key: Cell<u64>,
    next_listener: Cell<u64>,
}

impl fmt::Debug for StageShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageShared")
            .field("config", &self.config)
            .field("deferred", &self.deferred.borrow().len())
            .field("dispatching", &self.dispatching.get())
            .finish_non_exhaustive()
    }
}

impl StageShared {
    /// Apply now, or queue if the core is busy
    fn run(&self, op: Deferred) {
        match self.core.try_borrow_mut() {
            Ok(mut core) => self.apply(&mut core, op),
            Err(_) => {
                tracing::trace!("Engine busy; deferring {}", op.name());
                self.deferred.borrow_mut().push_back(op);
                return;
            }
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let Some(op) = self.deferred.borrow_mut().pop_front() else {
                return;
            };
            let Ok(mut core) = self.core.try_borrow_mut() else {
                self.deferred.borrow_mut().push_front(op);
                return;
            };
            self.apply(&mut core, op);
        }
    }

    fn apply(&self, core: &mut StageCore, op: Deferred) {
        match op {
            Deferred::Input(event, now) => {
                core.sampler.sample(event, now);
            }
            Deferred::Insert(section) => {
                if !section.shared().alive.get() {
                    // Disposed before it was ever inserted
                    return;
                }
                let mut section = *section;
                let position = core.sampler.position();
                section.resolve_layout(core.layout.as_ref(), position);
                if let Some(old) = core.registry.insert(section) {
                    self.listeners.borrow_mut().shift_remove(&old.key());
                }
                core.registry.reconcile(position);
            }
            Deferred::Remove(key) => {
                core.registry.remove(key);
                core.registry.reconcile(core.sampler.position());
            }
            Deferred::Bounds(key, bounds) => {
                let position = core.sampler.position();
                if let Some(section) = core.registry.get_mut(key) {
                    section.set_bounds(bounds, position);
                }
                core.registry.reconcile(position);
            }
            Deferred::Invalidate(reason) => core.invalidate(reason),
            Deferred::Layout(layout, reason) => {
                core.layout = layout;
                core.invalidate(reason);
            }
            Deferred::Media(key, op) => {
                let Some(section) = core.registry.get_mut(key) else {
                    return;
                };
                let result = match op {
                    MediaOp::Attach(adapter) => {
                        section.attach_media(adapter);
                        Ok(())
                    }
                    MediaOp::Loaded { id, duration } => section.media_loaded(&id, duration),
                    MediaOp::Failed { id, reason } => section.media_failed(&id, &reason),
                    MediaOp::TimeUpdate { id, seconds } => {
                        section.media_time_update(&id, seconds);
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    tracing::warn!("Section '{}': {}", section.id(), e);
                }
            }
            Deferred::Select(key, index, now) => {
                if let Some(section) = core.registry.get_mut(key) {
                    if let Err(e) = section.select(index, now) {
                        tracing::warn!("Section '{}' selection rejected: {}", section.id(), e);
                    }
                }
            }
            Deferred::Navigate(key, index, now) => {
                let position = core.sampler.position();
                if let Some(section) = core.registry.get_mut(key) {
                    if let Err(e) = section.navigate(index, now, position) {
                        tracing::warn!("Section '{}' navigation rejected: {}", section.id(), e);
                    }
                }
            }
        }
    }

    fn dispatch(&self, updates: &[SectionUpdate]) {
        self.dispatching.set(true);
        for update in updates {
            let Some((section, ids)) = self.listeners.borrow().get(&update.key).map(|entry| {
                let ids: Vec<ListenerId> = entry.callbacks.iter().map(|(id, _)| *id).collect();
                (entry.section.clone(), ids)
            }) else {
                continue;
            };
            for id in ids {
                if !section.alive.get() {
                    break;
                }
                // Looked up per call so listeners removed mid-dispatch stay silent
                let Some(callback) = self.listener(update.key, id) else {
                    continue;
                };
                match callback.try_borrow_mut() {
                    Ok(mut callback) => {
                        let callback: &mut dyn FnMut(&SectionUpdate) = &mut **callback;
                        callback(update);
                    }
                    Err(_) => tracing::trace!("Listener {:?} is already running; skipped", id),
                };
            }
        }
        self.dispatching.set(false);
    }

    fn listener(&self, key: SectionKey, id: ListenerId) -> Option<Listener> {
        self.listeners
            .borrow()
            .get(&key)?
            .callbacks
            .iter()
            .find(|(listener, _)| *listener == id)
            .map(|(_, callback)| callback.clone())
    }
}

/// Scroll-driven animation engine for one scroll container
pub struct Stage {
    shared: Rc<StageShared>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("shared", &self.shared).finish()
    }
}

impl Stage {
    /// Create a stage measuring layout through `layout`
    pub fn new(config: EngineConfig, layout: impl LayoutProvider + 'static) -> Result<Self> {
        config.validate()?;
        let sampler = ScrollSampler::new(config.max_scroll, config.wheel_multiplier, config.touch_multiplier);
        tracing::debug!(
            "Stage created (debounce {}ms, autoplay idle {}ms)",
            config.settle_debounce_ms,
            config.autoplay_idle_ms
        );
        Ok(Self {
            shared: Rc::new(StageShared {
                config,
                core: RefCell::new(StageCore {
                    sampler,
                    registry: SectionRegistry::new(),
                    layout: Box::new(layout),
                }),
                deferred: RefCell::new(VecDeque::new()),
                listeners: RefCell::new(IndexMap::new()),
                dispatching: Cell::new(false),
                next_key: Cell::new(0),
                next_listener: Cell::new(0),
            }),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Register a section. A live section with the same id is disposed.
    pub fn register_section(&self, spec: SectionSpec) -> Result<SectionHandle> {
        let key = SectionKey(self.shared.next_key.get() + 1);
        self.shared.next_key.set(key.0);
        let section = Section::new(key, spec, &self.shared.config)?;
        let handle = SectionHandle {
            stage: Rc::downgrade(&self.shared),
            key,
            id: section.id().to_string(),
            section: section.shared().clone(),
        };
        self.shared.listeners.borrow_mut().insert(
            key,
            SectionListeners {
                section: section.shared().clone(),
                callbacks: Vec::new(),
            },
        );
        self.shared.run(Deferred::Insert(Box::new(section)));
        Ok(handle)
    }

    /// Feed raw input. Returns the provisional coalesced view, or `None`
    /// when the input was queued because the engine is busy.
    pub fn push_input(&self, event: RawScrollEvent, now: Millis) -> Option<ScrollSample> {
        match self.shared.core.try_borrow_mut() {
            Ok(mut core) => Some(core.sampler.sample(event, now)),
            Err(_) => {
                self.shared.deferred.borrow_mut().push_back(Deferred::Input(event, now));
                None
            }
        }
    }

    /// Run one display frame at `now` and return the section updates that
    /// were delivered to listeners.
    pub fn frame(&self, now: Millis) -> Vec<SectionUpdate> {
        if self.shared.dispatching.get() {
            tracing::trace!("Frame requested from a listener; skipped");
            return Vec::new();
        }
        self.shared.drain();
        let updates = match self.shared.core.try_borrow_mut() {
            Ok(mut core) => core.step(now),
            Err(_) => {
                tracing::trace!("Frame requested while the engine is busy; skipped");
                return Vec::new();
            }
        };
        self.shared.dispatch(&updates);
        self.shared.drain();
        updates
    }

    /// Recompute trigger bounds from the current layout
    pub fn invalidate_layout(&self, reason: LayoutReason) {
        self.shared.run(Deferred::Invalidate(reason));
    }

    /// Replace the layout provider and recompute bounds
    pub fn set_layout(&self, layout: impl LayoutProvider + 'static, reason: LayoutReason) {
        self.shared.run(Deferred::Layout(Box::new(layout), reason));
    }

    /// Current scroll position
    pub fn scroll_position(&self) -> Option<f64> {
        self.shared.core.try_borrow().ok().map(|core| core.sampler.position())
    }

    /// Number of live sections
    pub fn section_count(&self) -> usize {
        self.shared
            .listeners
            .borrow()
            .values()
            .filter(|entry| entry.section.alive.get())
            .count()
    }

    /// Observe every coalesced sample. The callback runs inside the frame;
    /// stage calls made from it are deferred.
    pub fn on_sample(&self, callback: impl FnMut(&ScrollSample) + 'static) -> Result<SubscriptionId> {
        let mut core = self.shared.core.try_borrow_mut().map_err(|_| EngineError::Busy)?;
        Ok(core.sampler.subscribe(callback))
    }

    /// Stop observing samples
    pub fn remove_sample_listener(&self, id: SubscriptionId) -> bool {
        self.shared
            .core
            .try_borrow_mut()
            .is_ok_and(|mut core| core.sampler.unsubscribe(id))
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Ok(mut core) = self.shared.core.try_borrow_mut() {
            core.registry.clear();
        }
        self.shared.listeners.borrow_mut().clear();
    }
}

/// Host-side handle to a registered section
#[derive(Debug, Clone)]
pub struct SectionHandle {
    stage: Weak<StageShared>,
    key: SectionKey,
    id: String,
    section: Rc<SectionShared>,
}

impl SectionHandle {
    /// Section id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registration key
    pub fn key(&self) -> SectionKey {
        self.key
    }

    /// Progress as of the last update
    pub fn progress(&self) -> f64 {
        self.section.progress.get()
    }

    /// Direction as of the last update
    pub fn direction(&self) -> Direction {
        self.section.direction.get()
    }

    /// Nearest snap stop as of the last update
    pub fn active_snap_index(&self) -> Option<usize> {
        self.section.active_snap_index.get()
    }

    /// Lifecycle state as of the last update
    pub fn state(&self) -> PlaybackState {
        self.section.state.get()
    }

    /// Whether the section holds the pin
    pub fn is_pinned(&self) -> bool {
        self.section.pinned.get()
    }

    /// Completed turns of a looping section as of the last update
    pub fn loop_iteration(&self) -> Option<i64> {
        self.section.looping.then_some(self.section.iteration.get())
    }

    /// Whether the section was disposed or replaced
    pub fn is_disposed(&self) -> bool {
        !self.section.alive.get()
    }

    fn stage(&self) -> Result<Rc<StageShared>> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }
        self.stage.upgrade().ok_or(EngineError::Disposed)
    }

    /// Set explicit scroll bounds; trigger resolution stops for this section
    pub fn update(&self, bounds: ScrollBounds) -> Result<()> {
        self.stage()?.run(Deferred::Bounds(self.key, bounds));
        Ok(())
    }

    /// Receive every update of this section
    pub fn on_update(&self, callback: impl FnMut(&SectionUpdate) + 'static) -> Result<ListenerId> {
        let stage = self.stage()?;
        let id = ListenerId(stage.next_listener.get() + 1);
        stage.next_listener.set(id.0);
        let mut listeners = stage.listeners.borrow_mut();
        let entry = listeners.get_mut(&self.key).ok_or(EngineError::Disposed)?;
        let callback: Box<dyn FnMut(&SectionUpdate)> = Box::new(callback);
        entry.callbacks.push((id, Rc::new(RefCell::new(callback))));
        Ok(id)
    }

    /// Remove a listener. Returns false if it was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let Some(stage) = self.stage.upgrade() else {
            return false;
        };
        let mut listeners = stage.listeners.borrow_mut();
        let Some(entry) = listeners.get_mut(&self.key) else {
            return false;
        };
        let before = entry.callbacks.len();
        entry.callbacks.retain(|(listener, _)| *listener != id);
        before != entry.callbacks.len()
    }

    /// Drive a video's playback position from progress
    pub fn bind_video(&self, media_id: &str, target: impl MediaTarget + 'static) -> Result<()> {
        let adapter = MediaSyncAdapter::video(media_id, target);
        self.stage()?.run(Deferred::Media(self.key, MediaOp::Attach(adapter)));
        Ok(())
    }

    /// Drive a rotation from progress; `range` radians at progress 1
    pub fn bind_rotation(&self, media_id: &str, target: impl RotationTarget + 'static, range: f64) -> Result<()> {
        let adapter = MediaSyncAdapter::rotation(media_id, target, range);
        self.stage()?.run(Deferred::Media(self.key, MediaOp::Attach(adapter)));
        Ok(())
    }

    /// Report loaded media metadata
    pub fn media_loaded(&self, media_id: &str, duration: f64) -> Result<()> {
        let op = MediaOp::Loaded {
            id: media_id.to_string(),
            duration,
        };
        self.stage()?.run(Deferred::Media(self.key, op));
        Ok(())
    }

    /// Report that media metadata could not be loaded
    pub fn media_failed(&self, media_id: &str, reason: &str) -> Result<()> {
        let op = MediaOp::Failed {
            id: media_id.to_string(),
            reason: reason.to_string(),
        };
        self.stage()?.run(Deferred::Media(self.key, op));
        Ok(())
    }

    /// Forward a media element's own time update; it never moves progress
    pub fn media_time_update(&self, media_id: &str, seconds: f64) -> Result<()> {
        let op = MediaOp::TimeUpdate {
            id: media_id.to_string(),
            seconds,
        };
        self.stage()?.run(Deferred::Media(self.key, op));
        Ok(())
    }

    /// Manually select a slideshow item
    pub fn select(&self, index: usize, now: Millis) -> Result<()> {
        let stage = self.stage()?;
        let count = self.section.item_count.ok_or_else(|| EngineError::InvalidSection {
            id: self.id.clone(),
            reason: "not an autoplay section".into(),
        })?;
        if index >= count {
            return Err(EngineError::IndexOutOfRange { index, count });
        }
        stage.run(Deferred::Select(self.key, index, now));
        Ok(())
    }

    /// Animate the scroll position to the snap stop at `index`. User input
    /// interrupts the animation like a settle.
    pub fn scroll_to_snap(&self, index: usize, now: Millis) -> Result<()> {
        let stage = self.stage()?;
        let count = self.section.snap_count.ok_or_else(|| EngineError::InvalidSection {
            id: self.id.clone(),
            reason: "no snap points".into(),
        })?;
        if index >= count {
            return Err(EngineError::IndexOutOfRange { index, count });
        }
        stage.run(Deferred::Navigate(self.key, index, now));
        Ok(())
    }

    /// Remove all listeners, release the pin and cancel timers.
    /// Takes effect immediately; calling it again is a no-op.
    pub fn dispose(&self) {
        if !self.section.alive.replace(false) {
            return;
        }
        self.section.pinned.set(false);
        if let Some(stage) = self.stage.upgrade() {
            stage.listeners.borrow_mut().shift_remove(&self.key);
            stage.run(Deferred::Remove(self.key));
        }
    }
}
