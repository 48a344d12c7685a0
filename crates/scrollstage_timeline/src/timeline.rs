// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timelines and the pure evaluation driver.

use crate::binding::{ChannelKey, TargetId};
use crate::error::{Result, TimelineError};
use crate::playback::{sanitize, DriveMode, PlaybackClock};
use crate::segment::Segment;
use crate::value::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Serialized form of a timeline, validated into [`Timeline`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSpec {
    /// Segments in declaration order
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Named progress positions
    #[serde(default)]
    pub labels: IndexMap<String, f64>,
}

/// Segments of one channel, ordered by start progress
#[derive(Debug, Clone, PartialEq)]
struct Channel {
    key: ChannelKey,
    segments: Vec<usize>,
}

/// A validated, immutable list of segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimelineSpec", into = "TimelineSpec")]
pub struct Timeline {
    segments: Vec<Segment>,
    labels: IndexMap<String, f64>,
    channels: Vec<Channel>,
}

impl Timeline {
    /// Build a timeline from segments
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        Self::try_from(TimelineSpec {
            segments,
            labels: IndexMap::new(),
        })
    }

    /// Timeline with no segments
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            labels: IndexMap::new(),
            channels: Vec::new(),
        }
    }

    /// Add a named progress position
    pub fn with_label(mut self, name: impl Into<String>, position: f64) -> Result<Self> {
        let name = name.into();
        if !position.is_finite() || !(0.0..=1.0).contains(&position) {
            return Err(TimelineError::InvalidLabel { name, position });
        }
        self.labels.insert(name, position);
        Ok(self)
    }

    /// All segments in declaration order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Named progress positions in declaration order
    pub fn labels(&self) -> &IndexMap<String, f64> {
        &self.labels
    }

    /// Position of a label
    pub fn label(&self, name: &str) -> Option<f64> {
        self.labels.get(name).copied()
    }

    /// Number of distinct target/property channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Evaluate every channel at `progress`.
    ///
    /// Pure: the result depends only on `progress`. For a channel animated by
    /// several segments, the latest-starting segment that has begun wins;
    /// before any has begun, the earliest segment's start value holds.
    pub fn evaluate(&self, progress: f64) -> Frame {
        let p = sanitize(progress);
        let mut frame = Frame::default();

        for channel in &self.channels {
            let active = channel
                .segments
                .iter()
                .rev()
                .map(|&i| &self.segments[i])
                .find(|seg| seg.start_progress <= p);

            let value = match active {
                Some(seg) => seg.sample(p),
                None => match channel.segments.first() {
                    Some(&i) => self.segments[i].from.clone(),
                    None => continue,
                },
            };
            frame.set(&channel.key.target, &channel.key.property, value);
        }

        frame
    }
}

impl TryFrom<TimelineSpec> for Timeline {
    type Error = TimelineError;

    fn try_from(spec: TimelineSpec) -> Result<Self> {
        for segment in &spec.segments {
            segment.validate()?;
        }
        for (name, &position) in &spec.labels {
            if !position.is_finite() || !(0.0..=1.0).contains(&position) {
                return Err(TimelineError::InvalidLabel {
                    name: name.clone(),
                    position,
                });
            }
        }

        let mut index: IndexMap<ChannelKey, Vec<usize>> = IndexMap::new();
        for (i, segment) in spec.segments.iter().enumerate() {
            index.entry(segment.channel()).or_default().push(i);
        }

        let channels = index
            .into_iter()
            .map(|(key, mut segments)| {
                // Stable: equal starts keep declaration order, so later wins
                segments.sort_by(|&a, &b| {
                    spec.segments[a]
                        .start_progress
                        .total_cmp(&spec.segments[b].start_progress)
                });
                Channel { key, segments }
            })
            .collect();

        Ok(Self {
            segments: spec.segments,
            labels: spec.labels,
            channels,
        })
    }
}

impl From<Timeline> for TimelineSpec {
    fn from(timeline: Timeline) -> Self {
        Self {
            segments: timeline.segments,
            labels: timeline.labels,
        }
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::empty()
    }
}

/// Evaluated property values for one progress value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    targets: IndexMap<TargetId, IndexMap<String, PropertyValue>>,
}

impl Frame {
    /// Set a value
    pub fn set(&mut self, target: &TargetId, property: &str, value: PropertyValue) {
        self.targets
            .entry(target.clone())
            .or_default()
            .insert(property.to_string(), value);
    }

    /// Get a value
    pub fn get(&self, target: &str, property: &str) -> Option<&PropertyValue> {
        self.targets
            .iter()
            .find(|(id, _)| id.as_str() == target)
            .and_then(|(_, props)| props.get(property))
    }

    /// Get a float value
    pub fn float(&self, target: &str, property: &str) -> Option<f64> {
        self.get(target, property).and_then(PropertyValue::as_float)
    }

    /// Properties of one target
    pub fn target(&self, target: &str) -> Option<&IndexMap<String, PropertyValue>> {
        self.targets
            .iter()
            .find(|(id, _)| id.as_str() == target)
            .map(|(_, props)| props)
    }

    /// Iterate targets in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &IndexMap<String, PropertyValue>)> {
        self.targets.iter()
    }

    /// Whether the frame holds no values
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Drives a timeline from scrubbed or clock-advanced progress
#[derive(Debug, Clone)]
pub struct TimelineDriver {
    timeline: Timeline,
    mode: DriveMode,
    clock: Option<PlaybackClock>,
    progress: f64,
}

impl TimelineDriver {
    /// Create a driver in scrub mode
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            mode: DriveMode::Scrub,
            clock: None,
            progress: 0.0,
        }
    }

    /// Attach a playback clock for time-driven progress
    pub fn with_clock(mut self, clock: PlaybackClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// The driven timeline
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Current mode
    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    /// Last progress the driver evaluated at
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Pure evaluation; does not touch driver state
    pub fn evaluate(&self, progress: f64) -> Frame {
        self.timeline.evaluate(progress)
    }

    /// Scrub to `progress` synchronously, interrupting any playback
    pub fn scrub(&mut self, progress: f64) -> Frame {
        if self.mode == DriveMode::Playback {
            if let Some(clock) = self.clock.as_mut() {
                clock.interrupt();
            }
            self.mode = DriveMode::Scrub;
        }
        self.progress = sanitize(progress);
        self.timeline.evaluate(self.progress)
    }

    /// Start playback from the current progress at `now`.
    /// Returns false when the driver has no clock.
    pub fn play(&mut self, now: u64) -> bool {
        let progress = self.progress;
        match self.clock.as_mut() {
            Some(clock) => {
                clock.seek(progress, now);
                clock.play(now);
                self.mode = DriveMode::Playback;
                true
            }
            None => false,
        }
    }

    /// Hold playback at the current progress
    pub fn pause(&mut self) {
        if let Some(clock) = self.clock.as_mut() {
            clock.pause();
        }
    }

    /// Advance playback to `now`; `None` unless playing
    pub fn tick(&mut self, now: u64) -> Option<Frame> {
        if self.mode != DriveMode::Playback {
            return None;
        }
        let clock = self.clock.as_mut()?;
        if !clock.is_running() {
            return None;
        }
        self.progress = clock.advance(now);
        Some(self.timeline.evaluate(self.progress))
    }

    /// Whether playback is advancing
    pub fn is_playing(&self) -> bool {
        self.mode == DriveMode::Playback && self.clock.as_ref().is_some_and(PlaybackClock::is_running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::{EaseMode, Easing};

    fn slides() -> Timeline {
        let segments = vec![
            Segment::new("phone-0", "opacity", 1.0, 0.0).over(0.2, 0.25),
            Segment::new("phone-1", "opacity", 0.0, 1.0).over(0.2, 0.25),
            Segment::new("phone-1", "opacity", 1.0, 0.0).over(0.45, 0.5),
            Segment::new("phone", "x", 20.0, -20.0).with_easing(Easing::power(2, EaseMode::InOut)),
        ];
        Timeline::new(segments)
            .and_then(|t| t.with_label("slide0", 0.0))
            .and_then(|t| t.with_label("slide1", 0.25))
            .unwrap()
    }

    #[test]
    fn test_channels_grouped() {
        let timeline = slides();
        assert_eq!(timeline.channel_count(), 3);
        assert_eq!(timeline.label("slide1"), Some(0.25));
    }

    #[test]
    fn test_overlapping_segments_latest_start_wins() {
        let timeline = slides();
        assert_eq!(timeline.evaluate(0.0).float("phone-1", "opacity"), Some(0.0));
        assert_eq!(timeline.evaluate(0.3).float("phone-1", "opacity"), Some(1.0));
        assert_eq!(timeline.evaluate(0.6).float("phone-1", "opacity"), Some(0.0));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let timeline = slides();
        for i in 0..=1000 {
            let p = f64::from(i) / 1000.0;
            let first = timeline.evaluate(p);
            for _ in 0..3 {
                assert_eq!(timeline.evaluate(p), first);
            }
        }
    }

    #[test]
    fn test_reversal_does_not_drift() {
        let timeline = slides();
        let reference = timeline.evaluate(0.33);
        for i in 0..50 {
            let other = if i % 2 == 0 { 0.9 } else { 0.05 };
            timeline.evaluate(other);
        }
        assert_eq!(timeline.evaluate(0.33), reference);
    }

    #[test]
    fn test_out_of_range_progress_clamped() {
        let timeline = slides();
        assert_eq!(timeline.evaluate(-3.0), timeline.evaluate(0.0));
        assert_eq!(timeline.evaluate(7.0), timeline.evaluate(1.0));
        assert_eq!(timeline.evaluate(f64::NAN), timeline.evaluate(0.0));
    }

    #[test]
    fn test_invalid_label_rejected() {
        assert!(matches!(
            Timeline::empty().with_label("late", 1.5),
            Err(TimelineError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_ron_declaration() {
        let source = r#"(
            segments: [
                (
                    target: "video",
                    property: "opacity",
                    from: Float(0.0),
                    to: Float(1.0),
                    start_progress: 0.0,
                    end_progress: 0.1,
                    easing: "power1.out",
                ),
            ],
            labels: { "intro": 0.0 },
        )"#;
        let timeline: Timeline = ron::from_str(source).unwrap();
        assert_eq!(timeline.segments().len(), 1);
        assert_eq!(timeline.evaluate(0.5).float("video", "opacity"), Some(1.0));

        let broken = source.replace("end_progress: 0.1", "end_progress: 2.0");
        assert!(ron::from_str::<Timeline>(&broken).is_err());
    }

    #[test]
    fn test_driver_playback_and_scrub() {
        let mut driver = TimelineDriver::new(slides()).with_clock(PlaybackClock::new(1000).unwrap());
        assert!(driver.play(0));
        let frame = driver.tick(500).unwrap();
        assert_eq!(frame, driver.evaluate(0.5));
        assert!(driver.is_playing());

        driver.scrub(0.1);
        assert_eq!(driver.mode(), DriveMode::Scrub);
        assert!(driver.tick(900).is_none());

        assert!(driver.play(1000));
        driver.tick(1100);
        assert!((driver.progress() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_replay_while_playing_ignores_older_tick() {
        let mut driver = TimelineDriver::new(slides()).with_clock(PlaybackClock::new(1000).unwrap());
        driver.play(0);
        driver.tick(500);
        assert!(driver.play(800));

        // A tick from before the second play holds progress
        assert_eq!(driver.tick(600), Some(driver.evaluate(0.5)));
        assert_eq!(driver.progress(), 0.5);
        assert!(driver.is_playing());

        driver.tick(900);
        assert!((driver.progress() - 0.6).abs() < 1e-12);
    }
}
