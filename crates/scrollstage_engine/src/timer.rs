// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-flight idle timers.
//!
//! The engine never blocks or spawns: the host passes its clock into every
//! call and timers are polled. Each timer holds at most one deadline, so
//! re-arming replaces the previous deadline instead of stacking another.

/// Host time in milliseconds, monotonic
pub type Millis = u64;

/// A restartable one-shot timer
#[derive(Debug, Clone)]
pub struct IdleTimer {
    delay_ms: Millis,
    deadline: Option<Millis>,
    generation: u64,
}

impl IdleTimer {
    /// Create a disarmed timer with the given delay
    pub fn new(delay_ms: Millis) -> Self {
        Self {
            delay_ms,
            deadline: None,
            generation: 0,
        }
    }

    /// Configured delay
    pub fn delay_ms(&self) -> Millis {
        self.delay_ms
    }

    /// Arm (or re-arm) to fire `delay_ms` after `now`.
    /// Any previous deadline is discarded. Returns the new generation.
    pub fn arm(&mut self, now: Millis) -> u64 {
        self.deadline = Some(now.saturating_add(self.delay_ms));
        self.generation += 1;
        self.generation
    }

    /// Disarm. Returns whether a deadline was pending; calling it again is a
    /// no-op that returns false.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a deadline is pending
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline
    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// Generation of the latest arm; a token older than this is stale
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fire if the deadline has passed. Returns the deadline that elapsed,
    /// at most once per arm.
    pub fn poll(&mut self, now: Millis) -> Option<Millis> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(deadline)
            }
            _ => None,
        }
    }

    /// Time left before firing
    pub fn remaining(&self, now: Millis) -> Option<Millis> {
        self.deadline.map(|d| d.saturating_sub(now))
    }
}
