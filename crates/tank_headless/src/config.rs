//! Arena configuration.
//!
//! Everything a run needs in one RON-loadable struct. Every field has a
//! default, so a config file only has to name what it changes:
//!
//! ```ron
//! (
//!     seed: 7,
//!     generations: 20,
//!     battle: (victory_mode: elimination),
//!     evolution: (pool_size: 12),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tank_core::battle::BattleConfig;
use tank_core::error::CoreError;
use tank_core::evolution::EvolutionConfig;
use tank_core::scenario::ScenarioRegistry;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The arena config was not valid RON.
    #[error("Failed to parse arena config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A scenario registry file was rejected by the core.
    #[error(transparent)]
    Scenario(#[from] CoreError),

    /// Parsed, but a value is out of range.
    #[error("Invalid arena config: {0}")]
    Invalid(String),
}

/// Parameters for an arena run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Master seed for the evolution RNG and per-battle seeds.
    pub seed: i64,
    /// Generations to run.
    pub generations: u32,
    /// Battles fought before each generation advance.
    pub battles_per_generation: u32,
    /// Tanks per team in each battle.
    pub roster_size: usize,
    /// Scenario rotation; empty means every registered scenario.
    pub scenarios: Vec<String>,
    /// Simulation step in seconds.
    pub dt: f64,
    /// Broadcast channel capacity for arena events.
    pub event_capacity: usize,
    /// Battle rules.
    pub battle: BattleConfig,
    /// Evolution parameters.
    pub evolution: EvolutionConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            seed: 12_345,
            generations: 10,
            battles_per_generation: 6,
            roster_size: 4,
            scenarios: Vec::new(),
            dt: 1.0 / 30.0,
            event_capacity: 256,
            battle: BattleConfig::default(),
            evolution: EvolutionConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Parse and validate a RON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed text and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::from_ron_str(&text)
    }

    /// Reject values the arena cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster_size == 0 {
            return Err(ConfigError::Invalid("roster_size must be at least 1".into()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::Invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        if self.evolution.elite_count > self.evolution.pool_size {
            return Err(ConfigError::Invalid(format!(
                "elite_count {} exceeds pool_size {}",
                self.evolution.elite_count, self.evolution.pool_size
            )));
        }
        Ok(())
    }

    /// Set the master seed.
    #[must_use]
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Set generations and battles per generation.
    #[must_use]
    pub fn with_schedule(mut self, generations: u32, battles_per_generation: u32) -> Self {
        self.generations = generations;
        self.battles_per_generation = battles_per_generation;
        self
    }

    /// Set tanks per team.
    #[must_use]
    pub fn with_roster_size(mut self, size: usize) -> Self {
        self.roster_size = size.max(1);
        self
    }

    /// Set the scenario rotation.
    #[must_use]
    pub fn with_scenarios<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenarios = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set battle rules.
    #[must_use]
    pub fn with_battle(mut self, battle: BattleConfig) -> Self {
        self.battle = battle;
        self
    }

    /// Set evolution parameters.
    #[must_use]
    pub fn with_evolution(mut self, evolution: EvolutionConfig) -> Self {
        self.evolution = evolution;
        self
    }

    /// Scenario ids to cycle through, falling back to the whole registry.
    #[must_use]
    pub fn rotation(&self, registry: &ScenarioRegistry) -> Vec<String> {
        if self.scenarios.is_empty() {
            registry.ids().map(str::to_string).collect()
        } else {
            self.scenarios.clone()
        }
    }
}

/// Load a scenario registry, or the built-in one when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_registry(path: Option<&Path>) -> Result<ScenarioRegistry, ConfigError> {
    match path {
        Some(path) => {
            let text = read(path)?;
            let registry = ScenarioRegistry::from_ron_str(&text)?;
            tracing::info!(
                path = %path.display(),
                scenarios = registry.len(),
                "Loaded scenario registry"
            );
            Ok(registry)
        }
        None => Ok(ScenarioRegistry::builtin()),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
