// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline validation errors.

use crate::value::ValueKind;
use thiserror::Error;

/// Errors raised while building or parsing timeline data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// Segment range outside [0, 1] or reversed
    #[error("Invalid progress range for {target}.{property}: {start}..{end}")]
    InvalidRange {
        /// Target of the offending segment
        target: String,
        /// Animated property
        property: String,
        /// Declared start progress
        start: f64,
        /// Declared end progress
        end: f64,
    },

    /// A value contains NaN or infinity
    #[error("Non-finite value in {target}.{property}")]
    NonFinite {
        /// Target of the offending segment
        target: String,
        /// Animated property
        property: String,
    },

    /// From and to values have different kinds
    #[error("Value kind mismatch for {target}.{property}: {from:?} -> {to:?}")]
    KindMismatch {
        /// Target of the offending segment
        target: String,
        /// Animated property
        property: String,
        /// Kind of the from value
        from: ValueKind,
        /// Kind of the to value
        to: ValueKind,
    },

    /// Segment without a property name
    #[error("Segment for {0} has an empty property name")]
    EmptyProperty(String),

    /// Easing string not recognized
    #[error("Unknown easing: {0}")]
    UnknownEasing(String),

    /// Label position outside [0, 1]
    #[error("Label {name} at {position} is outside [0, 1]")]
    InvalidLabel {
        /// Label name
        name: String,
        /// Declared position
        position: f64,
    },

    /// Playback duration of zero
    #[error("Playback duration must be greater than zero")]
    ZeroDuration,
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
