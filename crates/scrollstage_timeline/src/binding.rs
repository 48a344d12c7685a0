// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation target identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an external element a segment animates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a target ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One animated channel: a property on a target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    /// Target element
    pub target: TargetId,
    /// Property path on the target
    pub property: String,
}

impl ChannelKey {
    /// Create a channel key
    pub fn new(target: impl Into<TargetId>, property: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.property)
    }
}
