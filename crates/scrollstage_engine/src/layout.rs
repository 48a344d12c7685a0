// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger positions and layout measurement.
//!
//! A trigger names where a section starts and ends in terms of element and
//! viewport edges, for example `start: "top top", end: "+=300%"`. Bounds are
//! resolved against a [`LayoutProvider`] whenever layout is invalidated.

use crate::error::{EngineError, Result};
use crate::progress::ScrollBounds;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element geometry in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    /// Distance from the top of the scroll container
    pub top: f64,
    /// Element height
    pub height: f64,
}

/// Geometry consumed by bounds resolution
pub trait LayoutProvider {
    /// Visible height of the scroll container
    fn viewport_height(&self) -> f64;
    /// Geometry of an element by id
    fn element_rect(&self, element: &str) -> Option<ElementRect>;
}

/// Why bounds are being recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutReason {
    /// Viewport resized
    Resize,
    /// Web fonts finished loading
    FontsLoaded,
    /// Images or other content changed height
    ContentLoaded,
    /// Requested by the host
    Manual,
}

/// Fixed layout, for hosts that measure once and for replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticLayout {
    /// Viewport height
    pub viewport_height: f64,
    /// Element geometry by id
    #[serde(default)]
    pub elements: IndexMap<String, ElementRect>,
}

impl StaticLayout {
    /// Layout with the given viewport and no elements
    pub fn new(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            elements: IndexMap::new(),
        }
    }

    /// Add or replace an element
    pub fn with_element(mut self, id: impl Into<String>, top: f64, height: f64) -> Self {
        self.elements.insert(id.into(), ElementRect { top, height });
        self
    }
}

impl LayoutProvider for StaticLayout {
    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn element_rect(&self, element: &str) -> Option<ElementRect> {
        self.elements.get(element).copied()
    }
}

/// Edge of an element or the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Top edge
    Top,
    /// Vertical middle
    Center,
    /// Bottom edge
    Bottom,
}

impl Edge {
    fn fraction(self) -> f64 {
        match self {
            Edge::Top => 0.0,
            Edge::Center => 0.5,
            Edge::Bottom => 1.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Center => "center",
            Edge::Bottom => "bottom",
        }
    }
}

impl FromStr for Edge {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(Edge::Top),
            "center" => Ok(Edge::Center),
            "bottom" => Ok(Edge::Bottom),
            other => Err(EngineError::InvalidTrigger(other.to_string())),
        }
    }
}

/// "element-edge viewport-edge": the scroll position where the two meet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Anchor {
    /// Edge of the trigger element
    pub element: Edge,
    /// Edge of the viewport
    pub viewport: Edge,
}

impl Anchor {
    /// `"top top"`
    pub const TOP_TOP: Anchor = Anchor {
        element: Edge::Top,
        viewport: Edge::Top,
    };

    fn resolve(self, rect: ElementRect, viewport_height: f64) -> f64 {
        rect.top + rect.height * self.element.fraction() - viewport_height * self.viewport.fraction()
    }
}

impl FromStr for Anchor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(element), Some(viewport), None) => Ok(Anchor {
                element: element.parse().map_err(|_| EngineError::InvalidTrigger(s.to_string()))?,
                viewport: viewport.parse().map_err(|_| EngineError::InvalidTrigger(s.to_string()))?,
            }),
            _ => Err(EngineError::InvalidTrigger(s.to_string())),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element.name(), self.viewport.name())
    }
}

impl TryFrom<String> for Anchor {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.to_string()
    }
}

/// Where a trigger ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerEnd {
    /// Another edge pairing, e.g. `"bottom bottom"`
    Anchor(Anchor),
    /// Pixels past the start, `"+=3000"`
    Offset(f64),
    /// Viewport heights past the start, `"+=300%"`
    ViewportPercent(f64),
}

impl FromStr for TriggerEnd {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let Some(amount) = s.trim().strip_prefix("+=") else {
            return s.parse().map(TriggerEnd::Anchor);
        };
        let invalid = || EngineError::InvalidTrigger(s.to_string());
        let parsed = match amount.strip_suffix('%') {
            Some(percent) => TriggerEnd::ViewportPercent(percent.trim().parse().map_err(|_| invalid())?),
            None => TriggerEnd::Offset(amount.trim().trim_end_matches("px").parse().map_err(|_| invalid())?),
        };
        match parsed {
            TriggerEnd::Offset(v) | TriggerEnd::ViewportPercent(v) if !v.is_finite() => Err(invalid()),
            other => Ok(other),
        }
    }
}

impl fmt::Display for TriggerEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEnd::Anchor(anchor) => write!(f, "{anchor}"),
            TriggerEnd::Offset(px) => write!(f, "+={px}"),
            TriggerEnd::ViewportPercent(pct) => write!(f, "+={pct}%"),
        }
    }
}

impl TryFrom<String> for TriggerEnd {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TriggerEnd> for String {
    fn from(end: TriggerEnd) -> Self {
        end.to_string()
    }
}

/// Trigger declaration of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Element whose geometry anchors the trigger
    pub element: String,
    /// Start position
    pub start: Anchor,
    /// End position
    pub end: TriggerEnd,
}

impl TriggerSpec {
    /// Create a trigger
    pub fn new(element: impl Into<String>, start: Anchor, end: TriggerEnd) -> Self {
        Self {
            element: element.into(),
            start,
            end,
        }
    }

    /// Compute scroll bounds from current layout
    pub fn resolve(&self, layout: &dyn LayoutProvider) -> Result<ScrollBounds> {
        let rect = layout
            .element_rect(&self.element)
            .ok_or_else(|| EngineError::InvalidTrigger(format!("element '{}' not measured", self.element)))?;
        let viewport = layout.viewport_height();
        let start = self.start.resolve(rect, viewport);
        let end = match self.end {
            TriggerEnd::Anchor(anchor) => anchor.resolve(rect, viewport),
            TriggerEnd::Offset(px) => start + px,
            TriggerEnd::ViewportPercent(pct) => start + viewport * pct / 100.0,
        };
        Ok(ScrollBounds::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StaticLayout {
        StaticLayout::new(800.0).with_element("phones", 1200.0, 800.0)
    }

    #[test]
    fn test_parse_positions() {
        let anchor: Anchor = "top bottom".parse().unwrap();
        assert_eq!(anchor.viewport, Edge::Bottom);
        assert_eq!("+=3000".parse::<TriggerEnd>().unwrap(), TriggerEnd::Offset(3000.0));
        assert_eq!("+=300%".parse::<TriggerEnd>().unwrap(), TriggerEnd::ViewportPercent(300.0));
        assert!("left top".parse::<Anchor>().is_err());
        assert!("+=abc".parse::<TriggerEnd>().is_err());
        assert!("top".parse::<Anchor>().is_err());
    }

    #[test]
    fn test_resolve_pinned_range() {
        let trigger = TriggerSpec::new("phones", Anchor::TOP_TOP, "+=300%".parse().unwrap());
        let bounds = trigger.resolve(&layout()).unwrap();
        assert_eq!(bounds, ScrollBounds::new(1200.0, 3600.0));

        let enter = TriggerSpec::new("phones", "top bottom".parse().unwrap(), "bottom top".parse().unwrap());
        assert_eq!(enter.resolve(&layout()).unwrap(), ScrollBounds::new(400.0, 2000.0));
    }

    #[test]
    fn test_unmeasured_element() {
        let trigger = TriggerSpec::new("missing", Anchor::TOP_TOP, TriggerEnd::Offset(10.0));
        assert!(matches!(trigger.resolve(&layout()), Err(EngineError::InvalidTrigger(_))));
    }

    #[test]
    fn test_ron_strings() {
        let spec: TriggerSpec = ron::from_str(r#"(element: "hero", start: "top top", end: "+=1500")"#).unwrap();
        assert_eq!(spec.end, TriggerEnd::Offset(1500.0));
        let text = ron::to_string(&spec).unwrap();
        assert!(text.contains("\"top top\""));
    }
}
