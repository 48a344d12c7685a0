// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slideshow autoplay with interaction pause.
//!
//! `AutoPlaying -> (manual selection) -> Paused -> (idle timeout) -> AutoPlaying`.
//! The resume timer is single-flight: every selection replaces the pending
//! deadline. Resuming restarts the selected item's cycle; it never jumps
//! back to the first item.

use crate::error::{EngineError, Result};
use crate::timer::{IdleTimer, Millis};
use serde::{Deserialize, Serialize};

/// Declarative autoplay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoplaySpec {
    /// Number of items in the rotation
    pub item_count: usize,
    /// Display time per item
    pub item_duration_ms: Millis,
    /// Idle window before resuming; engine default when unset
    #[serde(default)]
    pub idle_ms: Option<Millis>,
}

/// Autoplay state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayState {
    /// Items advance on their own
    AutoPlaying,
    /// Waiting out the idle window after a selection
    Paused,
    /// Torn down; nothing fires
    Disposed,
}

/// Observable transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutoplayEvent {
    /// The active item moved on by itself
    Advanced {
        /// Previous item
        from: usize,
        /// New item
        to: usize,
    },
    /// The user picked an item
    Selected {
        /// Picked item
        index: usize,
    },
    /// Auto-advance suspended
    Paused,
    /// Auto-advance restarted on this item
    Resumed {
        /// Item whose cycle restarts
        index: usize,
    },
}

/// Timer state machine for an auto-advancing item sequence
#[derive(Debug, Clone)]
pub struct InteractionAutoplayManager {
    item_count: usize,
    item_duration_ms: Millis,
    active: usize,
    state: AutoplayState,
    cycle_started_at: Option<Millis>,
    idle: IdleTimer,
}

impl InteractionAutoplayManager {
    /// Create a manager on item 0. The first cycle starts at the first tick.
    pub fn new(item_count: usize, item_duration_ms: Millis, idle_ms: Millis) -> Result<Self> {
        if item_count == 0 || item_duration_ms == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "autoplay needs at least one item and a nonzero duration (got {item_count} x {item_duration_ms}ms)"
            )));
        }
        Ok(Self {
            item_count,
            item_duration_ms,
            active: 0,
            state: AutoplayState::AutoPlaying,
            cycle_started_at: None,
            idle: IdleTimer::new(idle_ms),
        })
    }

    /// Build from a spec, falling back to `default_idle_ms`
    pub fn from_spec(spec: &AutoplaySpec, default_idle_ms: Millis) -> Result<Self> {
        Self::new(spec.item_count, spec.item_duration_ms, spec.idle_ms.unwrap_or(default_idle_ms))
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Active item
    pub fn active(&self) -> usize {
        self.active
    }

    /// Current state
    pub fn state(&self) -> AutoplayState {
        self.state
    }

    /// When auto-advance will resume, if paused
    pub fn resume_at(&self) -> Option<Millis> {
        self.idle.deadline()
    }

    /// Progress of the active item's cycle in [0, 1]; 0 while paused
    pub fn item_progress(&self, now: Millis) -> f64 {
        match (self.state, self.cycle_started_at) {
            (AutoplayState::AutoPlaying, Some(start)) => {
                (now.saturating_sub(start) as f64 / self.item_duration_ms as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Progress across the whole sequence in [0, 1]
    pub fn overall_progress(&self, now: Millis) -> f64 {
        ((self.active as f64 + self.item_progress(now)) / self.item_count as f64).clamp(0.0, 1.0)
    }

    /// Manual selection: activate `index` now, reset its progress, pause and
    /// restart the idle window.
    pub fn select(&mut self, index: usize, now: Millis) -> Result<Vec<AutoplayEvent>> {
        if self.state == AutoplayState::Disposed {
            return Ok(Vec::new());
        }
        if index >= self.item_count {
            return Err(EngineError::IndexOutOfRange {
                index,
                count: self.item_count,
            });
        }

        let mut events = vec![AutoplayEvent::Selected { index }];
        if self.state == AutoplayState::AutoPlaying {
            events.push(AutoplayEvent::Paused);
        }
        self.active = index;
        self.state = AutoplayState::Paused;
        self.cycle_started_at = None;
        self.idle.arm(now);
        tracing::debug!("Autoplay paused on item {}; resume at {:?}", index, self.idle.deadline());
        Ok(events)
    }

    /// Advance timers to `now`
    pub fn tick(&mut self, now: Millis) -> Vec<AutoplayEvent> {
        let mut events = Vec::new();
        match self.state {
            AutoplayState::Disposed => return events,
            AutoplayState::Paused => {
                let Some(deadline) = self.idle.poll(now) else {
                    return events;
                };
                // Anchor at the deadline so a late poll does not shorten the cycle
                self.state = AutoplayState::AutoPlaying;
                self.cycle_started_at = Some(deadline);
                events.push(AutoplayEvent::Resumed { index: self.active });
                tracing::debug!("Autoplay resumed on item {}", self.active);
            }
            AutoplayState::AutoPlaying => {}
        }

        let mut start = *self.cycle_started_at.get_or_insert(now);
        let full_rotation = self.item_duration_ms * self.item_count as Millis;
        let elapsed = now.saturating_sub(start);
        if elapsed >= full_rotation {
            // Whole rotations land back on the same item
            start += elapsed / full_rotation * full_rotation;
        }
        while now >= start + self.item_duration_ms {
            let from = self.active;
            self.active = (self.active + 1) % self.item_count;
            start += self.item_duration_ms;
            events.push(AutoplayEvent::Advanced { from, to: self.active });
        }
        self.cycle_started_at = Some(start);
        events
    }

    /// Cancel the idle timer and stop for good. Idempotent.
    pub fn dispose(&mut self) {
        self.idle.cancel();
        self.state = AutoplayState::Disposed;
    }

    /// Whether [`Self::dispose`] was called
    pub fn is_disposed(&self) -> bool {
        self.state == AutoplayState::Disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slideshow() -> InteractionAutoplayManager {
        InteractionAutoplayManager::new(4, 5000, 10_000).unwrap()
    }

    #[test]
    fn test_advances_and_wraps() {
        let mut autoplay = slideshow();
        assert!(autoplay.tick(0).is_empty());
        assert_eq!(autoplay.item_progress(2500), 0.5);
        assert_eq!(autoplay.tick(5000), vec![AutoplayEvent::Advanced { from: 0, to: 1 }]);
        autoplay.tick(10_000);
        autoplay.tick(15_000);
        assert_eq!(autoplay.tick(20_000), vec![AutoplayEvent::Advanced { from: 3, to: 0 }]);
    }

    #[test]
    fn test_no_advance_during_idle_window() {
        let mut autoplay = slideshow();
        autoplay.tick(0);
        autoplay.select(1, 0).unwrap();

        let mut resumed = 0;
        for now in (0..10_000).step_by(16) {
            assert!(autoplay.tick(now).is_empty(), "fired at {now}");
        }
        for now in (10_000..14_999).step_by(16) {
            for event in autoplay.tick(now) {
                assert_eq!(event, AutoplayEvent::Resumed { index: 1 });
                resumed += 1;
            }
        }
        assert_eq!(resumed, 1);
        assert_eq!(autoplay.tick(15_000), vec![AutoplayEvent::Advanced { from: 1, to: 2 }]);
    }

    #[test]
    fn test_reselect_replaces_timer() {
        let mut autoplay = slideshow();
        autoplay.tick(0);
        autoplay.select(2, 1200).unwrap();
        let events = autoplay.select(3, 3000).unwrap();
        assert_eq!(events, vec![AutoplayEvent::Selected { index: 3 }]);
        assert_eq!(autoplay.resume_at(), Some(13_000));
        assert!(autoplay.tick(11_200).is_empty());
        assert_eq!(autoplay.tick(13_000), vec![AutoplayEvent::Resumed { index: 3 }]);
    }

    #[test]
    fn test_dispose_cancels_timer() {
        let mut autoplay = slideshow();
        autoplay.select(0, 0).unwrap();
        autoplay.dispose();
        autoplay.dispose();
        assert_eq!(autoplay.resume_at(), None);
        assert!(autoplay.tick(50_000).is_empty());
        assert!(autoplay.select(1, 50_000).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(InteractionAutoplayManager::new(0, 5000, 100).is_err());
        let mut autoplay = slideshow();
        assert!(matches!(
            autoplay.select(4, 0),
            Err(EngineError::IndexOutOfRange { index: 4, count: 4 })
        ));
    }

    #[test]
    fn test_long_gap_skips_whole_rotations() {
        let mut autoplay = slideshow();
        autoplay.tick(0);
        let events = autoplay.tick(45_000);
        assert_eq!(events, vec![AutoplayEvent::Advanced { from: 0, to: 1 }]);
        assert_eq!(autoplay.item_progress(45_000), 0.0);
    }
}
