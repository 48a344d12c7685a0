// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snap points and the settle controller.
//!
//! User input arms a debounce timer. When it fires, the controller picks the
//! nearest snap point (ties go the way the user was scrolling) and runs a
//! settle animation toward it. New user input aborts the settle wherever it
//! is; the interrupted intermediate progress becomes the scrub origin.
//!
//! Hosts can also navigate to a stop directly. Navigation runs the same
//! transition with its own duration and curve, and user input interrupts it
//! the same way.

use crate::sampler::Direction;
use crate::timer::{IdleTimer, Millis};
use scrollstage_timeline::{Easing, Timeline, TimelineError};
use serde::{Deserialize, Serialize};

/// Distances closer than this count as a tie
const TIE_EPSILON: f64 = 1e-9;

/// A discrete stop on the progress axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapPoint {
    /// Position in the point list
    pub index: usize,
    /// Progress value of the stop
    pub progress: f64,
}

/// Declarative snap configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapSpec {
    /// Explicit progress values
    Points(Vec<f64>),
    /// `n` evenly spaced stops including 0 and 1
    Evenly(usize),
    /// One stop per timeline label
    Labels,
}

/// Sorted, validated snap points
#[derive(Debug, Clone, PartialEq)]
pub struct SnapPoints {
    points: Vec<SnapPoint>,
}

impl SnapPoints {
    /// Build from progress values; sorted and deduplicated
    pub fn new(values: &[f64]) -> Result<Self, TimelineError> {
        let mut sorted = Vec::with_capacity(values.len());
        for (i, &value) in values.iter().enumerate() {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(TimelineError::InvalidLabel {
                    name: format!("snap[{i}]"),
                    position: value,
                });
            }
            sorted.push(value);
        }
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();

        Ok(Self {
            points: sorted
                .into_iter()
                .enumerate()
                .map(|(index, progress)| SnapPoint { index, progress })
                .collect(),
        })
    }

    /// `count` evenly spaced points from 0 to 1
    pub fn evenly(count: usize) -> Self {
        let points = match count {
            0 => Vec::new(),
            1 => vec![SnapPoint { index: 0, progress: 0.0 }],
            n => (0..n)
                .map(|index| SnapPoint {
                    index,
                    progress: index as f64 / (n - 1) as f64,
                })
                .collect(),
        };
        Self { points }
    }

    /// Resolve a declarative spec
    pub fn from_spec(spec: &SnapSpec, timeline: &Timeline) -> Result<Self, TimelineError> {
        match spec {
            SnapSpec::Points(values) => Self::new(values),
            SnapSpec::Evenly(count) => Ok(Self::evenly(*count)),
            SnapSpec::Labels => {
                let values: Vec<f64> = timeline.labels().values().copied().collect();
                Self::new(&values)
            }
        }
    }

    /// All points in ascending order
    pub fn points(&self) -> &[SnapPoint] {
        &self.points
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point by index
    pub fn get(&self, index: usize) -> Option<SnapPoint> {
        self.points.get(index).copied()
    }

    /// Average spacing between neighbouring points
    pub fn interval(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => {
                (last.progress - first.progress) / (self.points.len() - 1) as f64
            }
            _ => 1.0,
        }
    }

    /// Nearest point to `progress`.
    ///
    /// On an exact tie, forward motion picks the higher point and backward
    /// motion the lower one.
    pub fn nearest(&self, progress: f64, direction: Direction) -> Option<SnapPoint> {
        pick_nearest(self.points.iter().copied(), progress, direction)
    }

    /// Nearest point on a looping axis. Stops of the previous and next turn
    /// are candidates too, so the result may lie below 0 or above 1.
    pub fn nearest_looped(&self, progress: f64, direction: Direction) -> Option<SnapPoint> {
        let candidates = [-1.0, 0.0, 1.0].into_iter().flat_map(|turn| {
            self.points.iter().map(move |point| SnapPoint {
                index: point.index,
                progress: point.progress + turn,
            })
        });
        pick_nearest(candidates, progress, direction)
    }
}

/// Candidates must be ascending
fn pick_nearest(
    candidates: impl Iterator<Item = SnapPoint>,
    progress: f64,
    direction: Direction,
) -> Option<SnapPoint> {
    let mut best: Option<(SnapPoint, f64)> = None;
    for point in candidates {
        let distance = (point.progress - progress).abs();
        best = match best {
            None => Some((point, distance)),
            Some((current, best_distance)) => {
                if (distance - best_distance).abs() <= TIE_EPSILON {
                    // `point` is the higher one
                    match direction {
                        Direction::Forward => Some((point, distance.min(best_distance))),
                        Direction::Backward => Some((current, distance.min(best_distance))),
                    }
                } else if distance < best_distance {
                    Some((point, distance))
                } else {
                    Some((current, best_distance))
                }
            }
        };
    }
    best.map(|(point, _)| point)
}

/// A running settle transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleAnimation {
    /// Progress when the settle started
    pub from: f64,
    /// Snap point being settled into
    pub target: SnapPoint,
    /// Start time
    pub started_at: Millis,
    /// Length of the transition
    pub duration_ms: Millis,
    /// Curve of the transition
    pub easing: Easing,
}

impl SettleAnimation {
    /// Progress at `now`; exact target once the duration has elapsed
    pub fn sample(&self, now: Millis) -> f64 {
        if self.duration_ms == 0 || now >= self.started_at + self.duration_ms {
            return self.target.progress;
        }
        let t = now.saturating_sub(self.started_at) as f64 / self.duration_ms as f64;
        let eased = self.easing.apply(t);
        self.from * (1.0 - eased) + self.target.progress * eased
    }

    /// Whether the transition has finished at `now`
    pub fn is_done(&self, now: Millis) -> bool {
        now >= self.started_at + self.duration_ms
    }
}

/// What the controller did on a poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapStep {
    /// Nothing to do
    Idle,
    /// Debounce elapsed and a settle began
    Started(SettleAnimation),
    /// Settle in flight at this progress
    Settling(f64),
    /// Settle finished on this point
    Completed(SnapPoint),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Settling(SettleAnimation),
    Navigating(SettleAnimation),
}

/// Settle-on-idle controller for one section
#[derive(Debug, Clone)]
pub struct SnapController {
    points: SnapPoints,
    debounce: IdleTimer,
    phase: Phase,
    min_ms: Millis,
    max_ms: Millis,
    easing: Easing,
    navigate_ms: Millis,
    navigate_easing: Easing,
    looping: bool,
}

impl SnapController {
    /// Create a controller
    pub fn new(points: SnapPoints, debounce_ms: Millis, min_ms: Millis, max_ms: Millis, easing: Easing) -> Self {
        Self {
            points,
            debounce: IdleTimer::new(debounce_ms),
            phase: Phase::Idle,
            min_ms,
            max_ms: max_ms.max(min_ms),
            easing,
            navigate_ms: max_ms.max(min_ms),
            navigate_easing: easing,
            looping: false,
        }
    }

    /// Duration and curve of [`Self::navigate`]
    pub fn with_navigation(mut self, duration_ms: Millis, easing: Easing) -> Self {
        self.navigate_ms = duration_ms;
        self.navigate_easing = easing;
        self
    }

    /// Pick settle targets on a looping axis
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Snap points
    pub fn points(&self) -> &SnapPoints {
        &self.points
    }

    /// Index of the point nearest to `progress`
    pub fn active_index(&self, progress: f64, direction: Direction) -> Option<usize> {
        self.points.nearest(progress, direction).map(|p| p.index)
    }

    /// Whether a settle or navigation is in flight
    pub fn is_settling(&self) -> bool {
        matches!(self.phase, Phase::Settling(_) | Phase::Navigating(_))
    }

    /// Whether a host-requested navigation is in flight
    pub fn is_navigating(&self) -> bool {
        matches!(self.phase, Phase::Navigating(_))
    }

    /// Start moving from `from` to the point at `index`, replacing any
    /// pending debounce or settle. `None` if there is no such point.
    pub fn navigate(&mut self, index: usize, from: f64, now: Millis) -> Option<SettleAnimation> {
        let target = self.points.get(index)?;
        self.debounce.cancel();
        let animation = SettleAnimation {
            from,
            target,
            started_at: now,
            duration_ms: self.navigate_ms,
            easing: self.navigate_easing,
        };
        self.phase = Phase::Navigating(animation);
        tracing::debug!(
            "Navigating from {:.4} to snap {} ({:.4}) over {}ms",
            from,
            target.index,
            target.progress,
            self.navigate_ms
        );
        Some(animation)
    }

    /// Re-express a running transition after the section wrapped by
    /// `turns` (+1 for a forward wrap)
    pub fn rebase(&mut self, turns: f64) {
        if let Phase::Settling(animation) | Phase::Navigating(animation) = &mut self.phase {
            animation.from -= turns;
            animation.target.progress -= turns;
        }
    }

    /// Whether the debounce is waiting
    pub fn is_pending(&self) -> bool {
        self.debounce.is_armed()
    }

    /// Record user input at `now`.
    ///
    /// Aborts a running settle and returns the progress it was interrupted
    /// at, then restarts the debounce.
    pub fn on_user_input(&mut self, now: Millis) -> Option<f64> {
        let interrupted = self.abort(now);
        if !self.points.is_empty() {
            self.debounce.arm(now);
        }
        interrupted
    }

    fn abort(&mut self, now: Millis) -> Option<f64> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Settling(animation) | Phase::Navigating(animation) => {
                let at = animation.sample(now);
                tracing::debug!("Transition toward snap {} interrupted at {:.4}", animation.target.index, at);
                Some(at)
            }
            Phase::Idle => None,
        }
    }

    /// Cancel pending debounce and any settle. Idempotent.
    pub fn cancel(&mut self) {
        self.debounce.cancel();
        self.phase = Phase::Idle;
    }

    /// Advance timers and the settle animation.
    pub fn poll(&mut self, now: Millis, progress: f64, direction: Direction) -> SnapStep {
        if let Phase::Settling(animation) | Phase::Navigating(animation) = self.phase {
            if animation.is_done(now) {
                self.phase = Phase::Idle;
                return SnapStep::Completed(animation.target);
            }
            return SnapStep::Settling(animation.sample(now));
        }

        let Some(fired_at) = self.debounce.poll(now) else {
            return SnapStep::Idle;
        };
        let nearest = if self.looping {
            self.points.nearest_looped(progress, direction)
        } else {
            self.points.nearest(progress, direction)
        };
        let Some(target) = nearest else {
            return SnapStep::Idle;
        };

        let distance = (target.progress - progress).abs();
        if distance == 0.0 {
            return SnapStep::Completed(target);
        }

        let fraction = (distance / self.points.interval()).clamp(0.0, 1.0);
        let duration_ms = self.min_ms + ((self.max_ms - self.min_ms) as f64 * fraction).round() as Millis;
        let animation = SettleAnimation {
            from: progress,
            target,
            started_at: fired_at,
            duration_ms,
            easing: self.easing,
        };
        self.phase = Phase::Settling(animation);
        tracing::debug!(
            "Settling from {:.4} to snap {} ({:.4}) over {}ms",
            progress,
            target.index,
            target.progress,
            duration_ms
        );
        SnapStep::Started(animation)
    }
}
