// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine errors.

use scrollstage_timeline::TimelineError;
use thiserror::Error;

/// Errors surfaced by the stage engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Timeline or snap declaration rejected
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] ron::Error),

    /// Configuration file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Section spec rejected
    #[error("Invalid section {id}: {reason}")]
    InvalidSection {
        /// Section identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Trigger position string not recognized
    #[error("Invalid trigger position: {0}")]
    InvalidTrigger(String),

    /// The engine is in the middle of a frame
    #[error("Engine is busy")]
    Busy,

    /// Handle refers to a disposed section
    #[error("Section has been disposed")]
    Disposed,

    /// Item index outside an autoplay sequence
    #[error("Index {index} out of range for {count} items")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of items
        count: usize,
    },

    /// Media binding not found on the section
    #[error("Unknown media binding: {0}")]
    UnknownMedia(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
