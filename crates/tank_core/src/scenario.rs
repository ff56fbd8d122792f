//! Scenario descriptors and the scenario registry.
//!
//! A scenario only describes *how* to lay out a battlefield; the actual
//! geometry comes from [`crate::battlefield::generate_battlefield`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Id of the scenario used when a requested id is unknown.
pub const DEFAULT_SCENARIO_ID: &str = "open_field";

/// Obstacle placement algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Scattered cover away from the map centre.
    #[default]
    OpenField,
    /// Jittered city blocks with streets.
    Urban,
    /// Long walls with narrow passages.
    Chokepoint,
    /// Broken ring wall around the hill plus an inner keep.
    Fortress,
}

/// Qualitative hint for where the hill goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HillPlacement {
    /// Exact canvas centre.
    Center,
    /// Centre with up to 50px of jitter per axis.
    #[default]
    Jittered,
    /// Centre with up to 100px of jitter per axis.
    Wide,
}

impl HillPlacement {
    /// Maximum jitter per axis in pixels.
    #[must_use]
    pub const fn max_jitter(self) -> f64 {
        match self {
            HillPlacement::Center => 0.0,
            HillPlacement::Jittered => 50.0,
            HillPlacement::Wide => 100.0,
        }
    }
}

/// Everything needed to generate one kind of battlefield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// Registry key.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Placement algorithm.
    pub kind: ScenarioKind,
    /// Requested obstacle count.
    pub obstacle_count: u32,
    /// Obstacle edge length range `(min, max)` in pixels.
    pub obstacle_size: (f64, f64),
    /// Hill placement hint.
    #[serde(default)]
    pub hill_placement: HillPlacement,
}

impl ScenarioDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(id: &str, name: &str, kind: ScenarioKind, obstacle_count: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            obstacle_count,
            obstacle_size: (30.0, 60.0),
            hill_placement: HillPlacement::Jittered,
        }
    }

    /// Set the obstacle size range.
    #[must_use]
    pub fn with_obstacle_size(mut self, min: f64, max: f64) -> Self {
        let min = min.max(1.0);
        self.obstacle_size = (min, max.max(min));
        self
    }

    /// Set the hill placement hint.
    #[must_use]
    pub const fn with_hill_placement(mut self, placement: HillPlacement) -> Self {
        self.hill_placement = placement;
        self
    }

    /// Open field with scattered cover.
    #[must_use]
    pub fn open_field() -> Self {
        Self::new("open_field", "Open Field", ScenarioKind::OpenField, 8)
            .with_obstacle_size(30.0, 60.0)
    }

    /// Dense city blocks.
    #[must_use]
    pub fn urban() -> Self {
        Self::new("urban", "Urban Warfare", ScenarioKind::Urban, 16)
            .with_obstacle_size(40.0, 70.0)
    }

    /// Walls with passages.
    #[must_use]
    pub fn chokepoint() -> Self {
        Self::new("chokepoint", "Chokepoint", ScenarioKind::Chokepoint, 10)
            .with_obstacle_size(20.0, 40.0)
    }

    /// Fortified hill.
    #[must_use]
    pub fn fortress() -> Self {
        Self::new("fortress", "Fortress", ScenarioKind::Fortress, 14)
            .with_obstacle_size(20.0, 35.0)
            .with_hill_placement(HillPlacement::Center)
    }
}

impl Default for ScenarioDescriptor {
    fn default() -> Self {
        Self::open_field()
    }
}

/// Externally supplied table of scenario descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, ScenarioDescriptor>,
}

impl ScenarioRegistry {
    /// Empty registry. Lookups fall back to [`ScenarioDescriptor::open_field`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scenarios: BTreeMap::new(),
        }
    }

    /// Registry with the four built-in scenarios.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for descriptor in [
            ScenarioDescriptor::open_field(),
            ScenarioDescriptor::urban(),
            ScenarioDescriptor::chokepoint(),
            ScenarioDescriptor::fortress(),
        ] {
            registry.insert(descriptor);
        }
        registry
    }

    /// Parse a registry from a RON list of descriptors.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let descriptors: Vec<ScenarioDescriptor> = ron::from_str(text)?;
        let mut registry = Self::empty();
        for descriptor in descriptors {
            registry.insert(descriptor);
        }
        Ok(registry)
    }

    /// Add or replace a descriptor.
    pub fn insert(&mut self, descriptor: ScenarioDescriptor) {
        self.scenarios.insert(descriptor.id.clone(), descriptor);
    }

    /// Exact lookup.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ScenarioDescriptor> {
        self.scenarios.get(id)
    }

    /// Lookup that never fails.
    ///
    /// Unknown ids resolve to the registry's default scenario, or to the
    /// built-in open field when the registry has none.
    #[must_use]
    pub fn resolve(&self, id: &str) -> ScenarioDescriptor {
        if let Some(descriptor) = self.scenarios.get(id) {
            return descriptor.clone();
        }
        tracing::warn!(scenario = id, "Unknown scenario, using default");
        self.scenarios
            .get(DEFAULT_SCENARIO_ID)
            .or_else(|| self.scenarios.values().next())
            .cloned()
            .unwrap_or_default()
    }

    /// Scenario ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// All descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioDescriptor> {
        self.scenarios.values()
    }

    /// Number of registered scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_four() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(registry.len(), 4);
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["chokepoint", "fortress", "open_field", "urban"]);
    }

    #[test]
    fn test_unknown_id_falls_back() {
        let registry = ScenarioRegistry::builtin();
        let resolved = registry.resolve("moon_base");
        assert_eq!(resolved.id, DEFAULT_SCENARIO_ID);

        let empty = ScenarioRegistry::empty();
        assert_eq!(empty.resolve("anything").kind, ScenarioKind::OpenField);
    }

    #[test]
    fn test_parse_ron_registry() {
        let text = r#"[
            (
                id: "alley",
                name: "Alley",
                kind: urban,
                obstacle_count: 12,
                obstacle_size: (25.0, 45.0),
            ),
            (
                id: "keep",
                name: "Keep",
                kind: fortress,
                obstacle_count: 10,
                obstacle_size: (20.0, 30.0),
                hill_placement: center,
            ),
        ]"#;
        let registry = ScenarioRegistry::from_ron_str(text).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("alley").unwrap().hill_placement, HillPlacement::Jittered);
        assert_eq!(registry.get("keep").unwrap().kind, ScenarioKind::Fortress);
        // No open_field registered: first id in order is the fallback
        assert_eq!(registry.resolve("missing").id, "alley");
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(ScenarioRegistry::from_ron_str("not ron at all [").is_err());
    }

    #[test]
    fn test_obstacle_size_normalized() {
        let d = ScenarioDescriptor::open_field().with_obstacle_size(50.0, 10.0);
        assert_eq!(d.obstacle_size, (50.0, 50.0));
    }
}
