// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registered sections and pin arbitration.
//!
//! Sections are kept in registration order. When the scroll position lies
//! inside several pinning sections at once, the most recently registered one
//! holds the pin; the others keep mapping progress but are not pinned.

use crate::layout::LayoutProvider;
use crate::sampler::ScrollSample;
use crate::section::{Section, SectionKey};
use indexmap::IndexMap;

/// Registration-ordered section storage
#[derive(Debug, Default)]
pub struct SectionRegistry {
    sections: IndexMap<SectionKey, Section>,
    by_id: IndexMap<String, SectionKey>,
}

impl SectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section. A section already registered under the same id is
    /// disposed and returned.
    pub fn insert(&mut self, section: Section) -> Option<Section> {
        let displaced = match self.by_id.insert(section.id().to_string(), section.key()) {
            Some(previous) => self.sections.shift_remove(&previous).map(|mut old| {
                tracing::warn!("Section '{}' registered again; disposing the older registration", old.id());
                old.dispose();
                old
            }),
            None => None,
        };
        tracing::debug!("Registered section '{}' ({:?})", section.id(), section.key());
        self.sections.insert(section.key(), section);
        displaced
    }

    /// Remove and dispose a section
    pub fn remove(&mut self, key: SectionKey) -> Option<Section> {
        let mut section = self.sections.shift_remove(&key)?;
        if self.by_id.get(section.id()) == Some(&key) {
            self.by_id.shift_remove(section.id());
        }
        section.dispose();
        Some(section)
    }

    /// Section by key
    pub fn get(&self, key: SectionKey) -> Option<&Section> {
        self.sections.get(&key)
    }

    /// Mutable section by key
    pub fn get_mut(&mut self, key: SectionKey) -> Option<&mut Section> {
        self.sections.get_mut(&key)
    }

    /// Key of the section registered under `id`
    pub fn key_of(&self, id: &str) -> Option<SectionKey> {
        self.by_id.get(id).copied()
    }

    /// Number of sections
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether no sections are registered
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Mutable sections in registration order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.sections.values_mut()
    }

    /// Section holding the pin at `position`
    pub fn pin_owner(&self, position: f64) -> Option<SectionKey> {
        self.sections
            .values()
            .rev()
            .find(|section| section.wants_pin() && section.contains(position))
            .map(Section::key)
    }

    /// Deliver a sample to every section
    pub fn apply_sample(&mut self, sample: &ScrollSample) {
        let owner = self.pin_owner(sample.position);
        for section in self.sections.values_mut() {
            let inside = section.contains(sample.position);
            let pinned = Some(section.key()) == owner;
            section.on_sample(sample, inside, pinned);
        }
    }

    /// Recompute presence and progress at `position` without a sample
    pub fn reconcile(&mut self, position: f64) {
        let owner = self.pin_owner(position);
        for section in self.sections.values_mut() {
            let inside = section.contains(position);
            let pinned = Some(section.key()) == owner;
            section.reconcile(position, inside, pinned);
        }
    }

    /// Re-resolve trigger bounds of every section
    pub fn resolve_layout(&mut self, layout: &dyn LayoutProvider, position: f64) {
        for section in self.sections.values_mut() {
            section.resolve_layout(layout, position);
        }
    }

    /// Dispose every section
    pub fn clear(&mut self) {
        for section in self.sections.values_mut() {
            section.dispose();
        }
        self.sections.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::progress::ScrollBounds;
    use crate::sampler::{Direction, InputSource};
    use crate::section::SectionSpec;
    use scrollstage_timeline::Timeline;

    fn section(key: u64, id: &str, start: f64, end: f64) -> Section {
        let spec = SectionSpec::new(id, Timeline::empty()).with_bounds(ScrollBounds::new(start, end));
        Section::new(SectionKey(key), spec, &EngineConfig::default()).unwrap()
    }

    fn sample(seq: u64, position: f64) -> ScrollSample {
        ScrollSample {
            seq,
            timestamp: seq * 16,
            position,
            velocity: 0.0,
            direction: Direction::Forward,
            source: InputSource::User,
        }
    }

    #[test]
    fn test_newest_overlapping_section_wins_pin() {
        let mut registry = SectionRegistry::new();
        registry.insert(section(1, "a", 0.0, 1000.0));
        registry.insert(section(2, "b", 500.0, 1500.0));

        registry.apply_sample(&sample(1, 700.0));
        assert!(!registry.get(SectionKey(1)).unwrap().is_pinned());
        assert!(registry.get(SectionKey(2)).unwrap().is_pinned());
        // The loser still tracks progress
        assert_eq!(registry.get(SectionKey(1)).unwrap().progress(), 0.7);

        registry.apply_sample(&sample(2, 300.0));
        assert!(registry.get(SectionKey(1)).unwrap().is_pinned());
        assert!(!registry.get(SectionKey(2)).unwrap().is_pinned());
    }

    #[test]
    fn test_duplicate_id_disposes_older() {
        let mut registry = SectionRegistry::new();
        registry.insert(section(1, "hero", 0.0, 100.0));
        let old = registry.insert(section(2, "hero", 0.0, 200.0)).unwrap();
        assert_eq!(old.key(), SectionKey(1));
        assert!(!old.shared().alive.get());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.key_of("hero"), Some(SectionKey(2)));
    }

    #[test]
    fn test_remove_releases_pin() {
        let mut registry = SectionRegistry::new();
        registry.insert(section(1, "a", 0.0, 1000.0));
        registry.apply_sample(&sample(1, 10.0));
        let removed = registry.remove(SectionKey(1)).unwrap();
        assert!(!removed.is_pinned());
        assert!(registry.remove(SectionKey(1)).is_none());
        assert!(registry.key_of("a").is_none());
    }
}
