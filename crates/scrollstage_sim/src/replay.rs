// SPDX-License-Identifier: MIT OR Apache-2.0
//! Replays a scenario against a live stage and records what hosts would see.

use crate::scenario::{Scenario, ScenarioError, Step};
use indexmap::IndexMap;
use scrollstage_engine::{
    MediaTarget, Millis, RotationTarget, ScrollBounds, SectionHandle, SectionSpec, SectionUpdate, Stage,
};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;

/// A value written to a recorded media target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaWrite {
    /// Owning section
    pub section: String,
    /// Media id
    pub media: String,
    /// Host time of the write
    pub at: Millis,
    /// Seconds for video, radians for rotation
    pub value: f64,
}

/// Everything observed during a replay, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// A section update delivered to listeners
    Update(SectionUpdate),
    /// A media target write
    Media(MediaWrite),
}

type MediaLog = Rc<RefCell<Vec<MediaWrite>>>;

/// Media target that records writes instead of seeking a real element
struct Recorder {
    section: String,
    media: String,
    clock: Rc<Cell<Millis>>,
    log: MediaLog,
}

impl Recorder {
    fn record(&self, value: f64) {
        tracing::trace!("{}/{} <- {:.4}", self.section, self.media, value);
        self.log.borrow_mut().push(MediaWrite {
            section: self.section.clone(),
            media: self.media.clone(),
            at: self.clock.get(),
            value,
        });
    }
}

impl MediaTarget for Recorder {
    fn set_current_time(&mut self, seconds: f64) {
        self.record(seconds);
    }
}

impl RotationTarget for Recorder {
    fn set_rotation(&mut self, radians: f64) {
        self.record(radians);
    }
}

/// Drives one stage through a scenario
pub struct Replay {
    stage: Stage,
    handles: IndexMap<String, SectionHandle>,
    clock: Rc<Cell<Millis>>,
    media: MediaLog,
    events: Vec<ReplayEvent>,
}

impl Replay {
    /// Build the stage and register the scenario's sections
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let stage = Stage::new(scenario.config.clone(), scenario.layout.clone())?;
        let samples = stage.on_sample(|sample| {
            tracing::trace!(
                "sample {} at {}ms: {:.1}px {:?} {:?}",
                sample.seq,
                sample.timestamp,
                sample.position,
                sample.direction,
                sample.source
            );
        })?;
        tracing::trace!("Sample trace attached ({:?})", samples);

        let mut replay = Self {
            stage,
            handles: IndexMap::new(),
            clock: Rc::new(Cell::new(0)),
            media: Rc::new(RefCell::new(Vec::new())),
            events: Vec::new(),
        };
        for spec in &scenario.sections {
            replay.register(spec.clone())?;
        }
        Ok(replay)
    }

    fn register(&mut self, spec: SectionSpec) -> Result<(), ScenarioError> {
        let handle = self.stage.register_section(spec)?;
        tracing::info!("Registered section '{}'", handle.id());
        self.handles.insert(handle.id().to_string(), handle);
        Ok(())
    }

    fn handle(&self, step: usize, section: &str) -> Result<&SectionHandle, ScenarioError> {
        self.handles.get(section).ok_or_else(|| ScenarioError::UnknownSection {
            step,
            section: section.to_string(),
        })
    }

    fn recorder(&self, section: &str, media: &str) -> Recorder {
        Recorder {
            section: section.to_string(),
            media: media.to_string(),
            clock: self.clock.clone(),
            log: self.media.clone(),
        }
    }

    /// Current replay time
    pub fn now(&self) -> Millis {
        self.clock.get()
    }

    /// Live sections by id
    pub fn sections(&self) -> &IndexMap<String, SectionHandle> {
        &self.handles
    }

    fn advance_clock(&self, step: usize, at: Millis) -> Result<(), ScenarioError> {
        let now = self.clock.get();
        if at < now {
            return Err(ScenarioError::TimeWentBackwards { step, at, now });
        }
        self.clock.set(at);
        Ok(())
    }

    fn frame(&mut self, at: Millis) {
        self.clock.set(at);
        let updates = self.stage.frame(at);
        self.collect_media();
        for update in updates {
            tracing::debug!(
                "[{}ms] {} progress {:.4} {:?}{}",
                update.timestamp,
                update.id,
                update.progress,
                update.state,
                if update.pinned { " pinned" } else { "" }
            );
            for event in &update.autoplay_events {
                tracing::info!("[{}ms] {} {:?}", update.timestamp, update.id, event);
            }
            self.events.push(ReplayEvent::Update(update));
        }
    }

    fn collect_media(&mut self) {
        let writes = std::mem::take(&mut *self.media.borrow_mut());
        self.events.extend(writes.into_iter().map(ReplayEvent::Media));
    }

    /// Apply one step
    pub fn apply(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        match step {
            Step::Input { event, at } => {
                self.advance_clock(index, *at)?;
                self.stage.push_input(*event, *at);
            }
            Step::Frame(at) => {
                self.advance_clock(index, *at)?;
                self.frame(*at);
            }
            Step::Advance { until, every } => {
                if *every == 0 {
                    return Err(ScenarioError::InvalidStep {
                        step: index,
                        reason: "frame interval must be positive".into(),
                    });
                }
                let mut at = self.now() + every;
                while at <= *until {
                    self.frame(at);
                    at += every;
                }
            }
            Step::Select { section, index: item, at } => {
                self.advance_clock(index, *at)?;
                self.handle(index, section)?.select(*item, *at)?;
                tracing::info!("[{}ms] {} selected item {}", at, section, item);
            }
            Step::Navigate { section, index: stop, at } => {
                self.advance_clock(index, *at)?;
                self.handle(index, section)?.scroll_to_snap(*stop, *at)?;
                tracing::info!("[{}ms] {} navigating to snap {}", at, section, stop);
            }
            Step::Invalidate(reason) => self.stage.invalidate_layout(*reason),
            Step::Relayout { layout, reason } => self.stage.set_layout(layout.clone(), *reason),
            Step::Bounds { section, start, end } => {
                self.handle(index, section)?.update(ScrollBounds::new(*start, *end))?;
            }
            Step::BindVideo { section, media } => {
                let target = self.recorder(section, media);
                self.handle(index, section)?.bind_video(media, target)?;
            }
            Step::BindRotation { section, media, range } => {
                let target = self.recorder(section, media);
                self.handle(index, section)?.bind_rotation(media, target, *range)?;
            }
            Step::MediaLoaded { section, media, duration } => {
                self.handle(index, section)?.media_loaded(media, *duration)?;
            }
            Step::MediaFailed { section, media, reason } => {
                self.handle(index, section)?.media_failed(media, reason)?;
            }
            Step::Register(spec) => self.register(spec.clone())?,
            Step::Dispose(section) => {
                let Some(handle) = self.handles.shift_remove(section) else {
                    return Err(ScenarioError::UnknownSection {
                        step: index,
                        section: section.clone(),
                    });
                };
                handle.dispose();
                tracing::info!("Disposed section '{}'", section);
            }
        }
        self.collect_media();
        Ok(())
    }

    /// Events recorded so far
    pub fn events(&self) -> &[ReplayEvent] {
        &self.events
    }

    /// Stop and hand back the recorded events
    pub fn finish(self) -> Vec<ReplayEvent> {
        self.events
    }
}

/// Replay a whole scenario
pub fn run(scenario: &Scenario) -> Result<Vec<ReplayEvent>, ScenarioError> {
    let mut replay = Replay::new(scenario)?;
    for (index, step) in scenario.steps.iter().enumerate() {
        replay.apply(index, step)?;
    }
    tracing::info!(
        "Replayed {} steps to {}ms: {} events",
        scenario.steps.len(),
        replay.now(),
        replay.events().len()
    );
    for (id, handle) in replay.sections() {
        tracing::info!(
            "{}: progress {:.4}, {:?}, snap {:?}",
            id,
            handle.progress(),
            handle.state(),
            handle.active_snap_index()
        );
    }
    Ok(replay.finish())
}

/// Write events as JSON lines
pub fn write_json_lines(events: &[ReplayEvent], out: &mut impl Write) -> Result<(), ScenarioError> {
    for event in events {
        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
