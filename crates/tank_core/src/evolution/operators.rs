//! Selection and variation operators.
//!
//! Every operator returns a new genome; inputs are never modified. Results
//! are always clamped to `[0, 1]` by [`Genome::new`].

use crate::genome::{Genome, Team, GENE_COUNT};
use crate::rng::SeededRng;

use super::fitness::fallback_fitness;
use super::pool::{Candidate, CandidateId, CandidatePool};

/// Outcome of a tournament.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Chosen genome.
    pub genome: Genome,
    /// Candidate it came from; `None` when synthesized.
    pub parent: Option<CandidateId>,
    /// Fitness of the chosen candidate (fallback fitness when synthesized).
    pub fitness: f64,
}

impl Selection {
    /// Whether the team was empty and a genome had to be made up.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.parent.is_none()
    }
}

/// Pick a parent for `team` by tournament.
///
/// Draws `size` contestants uniformly with replacement and keeps the fittest
/// (first drawn wins ties). A team smaller than `size` yields its fittest
/// member outright; an empty team yields a synthesized team-biased genome.
pub fn tournament_select(
    pool: &CandidatePool,
    team: Team,
    size: usize,
    rng: &mut SeededRng,
) -> Selection {
    let members: Vec<_> = pool.team(team).collect();
    if members.is_empty() {
        let genome = Genome::team_biased(team, rng);
        tracing::debug!(%team, "Empty team, synthesizing parent");
        return Selection {
            genome,
            parent: None,
            fitness: fallback_fitness(&genome, None),
        };
    }

    let winner = if members.len() < size.max(1) {
        pool.best(team)
    } else {
        (0..size)
            .map(|_| members[rng.index(members.len())])
            .fold(None, |best: Option<&Candidate>, c| match best {
                Some(b) if b.fitness >= c.fitness => Some(b),
                _ => Some(c),
            })
    };

    // Members is non-empty, so a winner always exists
    let chosen = winner.unwrap_or(members[0]);
    Selection {
        genome: chosen.genome,
        parent: Some(chosen.id),
        fitness: chosen.fitness,
    }
}

/// Uniform crossover with a small jitter on every gene.
pub fn crossover(a: &Genome, b: &Genome, jitter: f64, rng: &mut SeededRng) -> Genome {
    let mut values = [0.0; GENE_COUNT];
    for (i, v) in values.iter_mut().enumerate() {
        let base = if rng.chance(0.5) {
            a.values()[i]
        } else {
            b.values()[i]
        };
        *v = base + rng.range(-jitter, jitter);
    }
    Genome::new(values)
}

/// Gaussian point mutation.
///
/// Each gene mutates with probability `rate`, receiving zero-mean noise with
/// standard deviation `std_dev`. Returns the new genome and how many genes
/// changed.
pub fn mutate(genome: &Genome, rate: f64, std_dev: f64, rng: &mut SeededRng) -> (Genome, u32) {
    let mut values = *genome.values();
    let mut mutated = 0;
    for v in &mut values {
        if rng.chance(rate) {
            *v += rng.gaussian(std_dev);
            mutated += 1;
        }
    }
    (Genome::new(values), mutated)
}
