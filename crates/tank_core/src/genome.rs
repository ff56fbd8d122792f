//! The fixed-length behavior genome and team identity.
//!
//! A genome is exactly [`GENE_COUNT`] reals in `[0, 1]`. Every constructor
//! clamps, so no code path can observe an out-of-range gene.

use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;

/// Number of genes in a behavior genome.
pub const GENE_COUNT: usize = 9;

/// Positional meaning of each gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gene {
    /// Fire rate, damage and willingness to engage.
    Aggression = 0,
    /// Movement speed.
    Speed = 1,
    /// Weapon range and base hit chance.
    Accuracy = 2,
    /// Damage reduction and retreat tendency.
    Defense = 3,
    /// Preference for staying grouped with allies.
    Teamwork = 4,
    /// Willingness to play the objective.
    Adaptability = 5,
    /// Decision refinement over the battle.
    Learning = 6,
    /// Willingness to contest and to stay in losing fights.
    RiskTaking = 7,
    /// Strafing while engaged.
    Evasion = 8,
}

impl Gene {
    /// All genes in positional order.
    pub const ALL: [Gene; GENE_COUNT] = [
        Gene::Aggression,
        Gene::Speed,
        Gene::Accuracy,
        Gene::Defense,
        Gene::Teamwork,
        Gene::Adaptability,
        Gene::Learning,
        Gene::RiskTaking,
        Gene::Evasion,
    ];

    /// Index of this gene in the vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Team identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Red team (biased toward aggression and accuracy).
    Red,
    /// Blue team (biased toward defense and teamwork).
    Blue,
}

impl Team {
    /// Both teams in a fixed order.
    pub const BOTH: [Team; 2] = [Team::Red, Team::Blue];

    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable 9-gene behavior vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome([f64; GENE_COUNT]);

impl Genome {
    /// Build a genome, clamping every gene to `[0, 1]`.
    ///
    /// Non-finite values become `0.5`.
    #[must_use]
    pub fn new(values: [f64; GENE_COUNT]) -> Self {
        Self(values.map(clamp_gene))
    }

    /// A genome with every gene at `value`.
    #[must_use]
    pub fn uniform(value: f64) -> Self {
        Self::new([value; GENE_COUNT])
    }

    /// Parse raw values; `None` if the length is wrong or any value is not finite.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; GENE_COUNT] = values.try_into().ok()?;
        if array.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self::new(array))
    }

    /// Parse raw values, replacing malformed or missing data with a fresh random genome.
    pub fn from_raw_or_random(values: Option<&[f64]>, rng: &mut SeededRng) -> Self {
        match values.and_then(Self::from_slice) {
            Some(genome) => genome,
            None => {
                tracing::warn!(
                    len = values.map_or(0, <[f64]>::len),
                    "Malformed genome data, substituting random genome"
                );
                Self::random(rng)
            }
        }
    }

    /// Uniformly random genome.
    pub fn random(rng: &mut SeededRng) -> Self {
        let mut values = [0.0; GENE_COUNT];
        for v in &mut values {
            *v = rng.next_f64();
        }
        Self::new(values)
    }

    /// Random genome nudged toward a team's play style.
    ///
    /// Red gains aggression (+0.2) and accuracy (+0.15); blue gains defense
    /// (+0.2) and teamwork (+0.15). Results are clamped.
    pub fn team_biased(team: Team, rng: &mut SeededRng) -> Self {
        let mut values = Self::random(rng).0;
        match team {
            Team::Red => {
                values[Gene::Aggression.index()] += 0.2;
                values[Gene::Accuracy.index()] += 0.15;
            }
            Team::Blue => {
                values[Gene::Defense.index()] += 0.2;
                values[Gene::Teamwork.index()] += 0.15;
            }
        }
        Self::new(values)
    }

    /// Value of one gene.
    #[must_use]
    pub const fn get(&self, gene: Gene) -> f64 {
        self.0[gene as usize]
    }

    /// Raw gene values in positional order.
    #[must_use]
    pub const fn values(&self) -> &[f64; GENE_COUNT] {
        &self.0
    }

    /// Copy with one gene replaced (clamped).
    #[must_use]
    pub fn with(&self, gene: Gene, value: f64) -> Self {
        let mut values = self.0;
        values[gene.index()] = value;
        Self::new(values)
    }

    /// Mean of all genes.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / GENE_COUNT as f64
    }
}

impl Default for Genome {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

/// Clamp a gene value to `[0, 1]`; non-finite values map to the midpoint.
#[must_use]
pub fn clamp_gene(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Named-field view of a genome for external serialization.
///
/// The core never branches on this representation; it converts to and from
/// [`Genome`] at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenomeTraits {
    /// See [`Gene::Aggression`].
    pub aggression: f64,
    /// See [`Gene::Speed`].
    pub speed: f64,
    /// See [`Gene::Accuracy`].
    pub accuracy: f64,
    /// See [`Gene::Defense`].
    pub defense: f64,
    /// See [`Gene::Teamwork`].
    pub teamwork: f64,
    /// See [`Gene::Adaptability`].
    pub adaptability: f64,
    /// See [`Gene::Learning`].
    pub learning: f64,
    /// See [`Gene::RiskTaking`].
    pub risk_taking: f64,
    /// See [`Gene::Evasion`].
    pub evasion: f64,
}

impl From<Genome> for GenomeTraits {
    fn from(g: Genome) -> Self {
        Self {
            aggression: g.get(Gene::Aggression),
            speed: g.get(Gene::Speed),
            accuracy: g.get(Gene::Accuracy),
            defense: g.get(Gene::Defense),
            teamwork: g.get(Gene::Teamwork),
            adaptability: g.get(Gene::Adaptability),
            learning: g.get(Gene::Learning),
            risk_taking: g.get(Gene::RiskTaking),
            evasion: g.get(Gene::Evasion),
        }
    }
}

impl From<GenomeTraits> for Genome {
    fn from(t: GenomeTraits) -> Self {
        Genome::new([
            t.aggression,
            t.speed,
            t.accuracy,
            t.defense,
            t.teamwork,
            t.adaptability,
            t.learning,
            t.risk_taking,
            t.evasion,
        ])
    }
}
