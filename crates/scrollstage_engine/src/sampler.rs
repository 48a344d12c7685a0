// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scroll input sampling.
//!
//! Raw wheel, touch and scroll events are folded into one pending frame and
//! emitted as a single [`ScrollSample`] per display frame. The sampler is the
//! only writer of the scroll position; everything downstream receives
//! samples by value.

use crate::timer::Millis;
use serde::{Deserialize, Serialize};

/// Scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Toward larger positions / higher progress
    #[default]
    Forward,
    /// Toward smaller positions / lower progress
    Backward,
}

impl Direction {
    /// Direction of a nonzero delta
    pub fn from_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Direction::Forward)
        } else if delta < 0.0 {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    /// +1 or -1
    pub fn signum(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// Raw input delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawScrollEvent {
    /// Wheel delta in pixels
    Wheel {
        /// Positive scrolls forward
        delta: f64,
    },
    /// Touch drag delta in pixels
    Touch {
        /// Positive scrolls forward
        delta: f64,
    },
    /// Absolute position reported by the container
    Scroll {
        /// Scroll offset in pixels
        position: f64,
    },
    /// Position written by the engine itself (snap settle)
    Programmatic {
        /// Scroll offset in pixels
        position: f64,
    },
}

/// Who moved the scroll position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// The user scrolled
    User,
    /// The engine scrolled
    Programmatic,
}

/// One coalesced scroll sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollSample {
    /// Monotonic sequence number
    pub seq: u64,
    /// Frame timestamp, non-decreasing across samples
    pub timestamp: Millis,
    /// Scroll position in pixels
    pub position: f64,
    /// Pixels per second since the previous sample
    pub velocity: f64,
    /// Direction of the frame's net movement
    pub direction: Direction,
    /// User input wins over programmatic writes within a frame
    pub source: InputSource,
}

/// Handle returned by [`ScrollSampler::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, Default)]
struct PendingFrame {
    net_delta: f64,
    user: bool,
}

type Subscriber = Box<dyn FnMut(&ScrollSample)>;

/// Coalesces raw scroll input into per-frame samples
pub struct ScrollSampler {
    position: f64,
    max_scroll: f64,
    wheel_multiplier: f64,
    touch_multiplier: f64,
    direction: Direction,
    pending: Option<PendingFrame>,
    last_emitted: Option<ScrollSample>,
    last_timestamp: Millis,
    seq: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl ScrollSampler {
    /// Create a sampler at position 0
    pub fn new(max_scroll: f64, wheel_multiplier: f64, touch_multiplier: f64) -> Self {
        Self {
            position: 0.0,
            max_scroll: max_scroll.max(0.0),
            wheel_multiplier,
            touch_multiplier,
            direction: Direction::Forward,
            pending: None,
            last_emitted: None,
            last_timestamp: 0,
            seq: 0,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Current scroll position
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Last known direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Largest reachable position
    pub fn max_scroll(&self) -> f64 {
        self.max_scroll
    }

    /// Change the scrollable extent, clamping the current position
    pub fn set_max_scroll(&mut self, max_scroll: f64) {
        if max_scroll.is_nan() {
            return;
        }
        self.max_scroll = max_scroll.max(0.0);
        if self.position > self.max_scroll {
            let delta = self.max_scroll - self.position;
            self.move_to(self.max_scroll, delta, false);
        }
    }

    /// Whether input is waiting for the next frame
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the pending frame contains user input
    pub fn has_pending_user_input(&self) -> bool {
        self.pending.is_some_and(|p| p.user)
    }

    /// Fold a raw event into the pending frame and return the provisional
    /// coalesced view. Nothing is delivered until [`Self::flush_frame`].
    /// Non-finite input is ignored.
    pub fn sample(&mut self, event: RawScrollEvent, now: Millis) -> ScrollSample {
        match event {
            RawScrollEvent::Wheel { delta } if delta.is_finite() => {
                let delta = delta * self.wheel_multiplier;
                self.move_to(self.position + delta, delta, true);
            }
            RawScrollEvent::Touch { delta } if delta.is_finite() => {
                let delta = delta * self.touch_multiplier;
                self.move_to(self.position + delta, delta, true);
            }
            RawScrollEvent::Scroll { position } if position.is_finite() => {
                self.move_to(position, position - self.position, true);
            }
            RawScrollEvent::Programmatic { position } if position.is_finite() => {
                self.move_to(position, position - self.position, false);
            }
            _ => {
                tracing::trace!("Ignoring non-finite scroll input: {:?}", event);
            }
        }
        self.preview(now)
    }

    /// Move the position by `offset` without counting it as motion, for
    /// looping sections that wrap. Input already pending this frame is kept
    /// relative to the new position.
    pub fn shift(&mut self, offset: f64) {
        if !offset.is_finite() || offset == 0.0 {
            return;
        }
        self.position = (self.position + offset).clamp(0.0, self.max_scroll);
        if let Some(last) = self.last_emitted.as_mut() {
            last.position += offset;
        }
        self.pending.get_or_insert_with(PendingFrame::default);
    }

    fn move_to(&mut self, position: f64, raw_delta: f64, user: bool) {
        self.position = position.clamp(0.0, self.max_scroll);
        let pending = self.pending.get_or_insert_with(PendingFrame::default);
        // Intent comes from the raw delta, so a push against a clamped edge
        // still records its direction
        pending.net_delta += raw_delta;
        pending.user |= user;
    }

    fn preview(&self, now: Millis) -> ScrollSample {
        let pending = self.pending.unwrap_or_default();
        let timestamp = now.max(self.last_timestamp);
        ScrollSample {
            seq: self.seq + 1,
            timestamp,
            position: self.position,
            velocity: self.velocity_to(timestamp),
            direction: Direction::from_delta(pending.net_delta).unwrap_or(self.direction),
            source: if pending.user {
                InputSource::User
            } else {
                InputSource::Programmatic
            },
        }
    }

    fn velocity_to(&self, timestamp: Millis) -> f64 {
        match self.last_emitted {
            Some(last) if timestamp > last.timestamp => {
                let dt = (timestamp - last.timestamp) as f64 / 1000.0;
                (self.position - last.position) / dt
            }
            _ => 0.0,
        }
    }

    /// Emit the coalesced sample for this frame, if any input arrived, and
    /// deliver it to subscribers.
    pub fn flush_frame(&mut self, now: Millis) -> Option<ScrollSample> {
        if self.pending.is_none() {
            return None;
        }
        let sample = self.preview(now);
        self.pending = None;
        self.seq = sample.seq;
        self.last_timestamp = sample.timestamp;
        self.direction = sample.direction;
        self.last_emitted = Some(sample);

        for (_, subscriber) in &mut self.subscribers {
            subscriber(&sample);
        }
        Some(sample)
    }

    /// Receive every emitted sample
    pub fn subscribe(&mut self, callback: impl FnMut(&ScrollSample) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Stop delivering samples. Returns false if already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        before != self.subscribers.len()
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
