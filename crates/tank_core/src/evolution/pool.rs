//! Candidates and the candidate pool.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::genome::{Genome, Team};
use crate::rng::SeededRng;

use super::fitness::FitnessSource;

/// Stable identity of a candidate; never reused within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One battle in a candidate's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    /// Scenario the battle was fought on.
    pub scenario_id: String,
    /// Battle seed.
    pub seed: i64,
    /// Generation in which the battle was recorded.
    pub generation: u32,
    /// Whether the candidate's team won.
    pub won: bool,
    /// Whether the battle was a draw.
    pub drawn: bool,
    /// Mean fitness of the opposing roster when recorded.
    pub opponent_strength: f64,
    /// Weighted battle score in `[0, 1]`.
    pub score: f64,
}

/// A genome competing for a team, with its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Identity.
    pub id: CandidateId,
    /// Genome.
    pub genome: Genome,
    /// Team.
    pub team: Team,
    /// Current fitness in `[0, 1]`.
    pub fitness: f64,
    /// How `fitness` was derived.
    pub fitness_source: FitnessSource,
    /// Battles fought.
    pub battles: u32,
    /// Battles won.
    pub wins: u32,
    /// Battles drawn.
    pub draws: u32,
    /// Generation the candidate was created in.
    pub born_in: u32,
    /// Mean fitness of the parents at birth, if bred.
    pub parent_fitness: Option<f64>,
    /// Per-battle results.
    pub history: Vec<BattleRecord>,
}

impl Candidate {
    /// New candidate with no battles.
    #[must_use]
    pub fn new(id: CandidateId, genome: Genome, team: Team, born_in: u32) -> Self {
        Self {
            id,
            genome,
            team,
            fitness: 0.0,
            fitness_source: FitnessSource::DeterministicFallback,
            battles: 0,
            wins: 0,
            draws: 0,
            born_in,
            parent_fitness: None,
            history: Vec::new(),
        }
    }

    /// Battles lost.
    #[must_use]
    pub fn losses(&self) -> u32 {
        self.battles.saturating_sub(self.wins + self.draws)
    }

    /// Fraction of battles won.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.battles == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.battles)
        }
    }

    /// Append a battle to the record.
    pub fn record(&mut self, record: BattleRecord) {
        self.battles += 1;
        self.wins += u32::from(record.won);
        self.draws += u32::from(record.drawn);
        self.history.push(record);
    }
}

/// All live candidates of both teams, keyed by id.
///
/// Iteration follows id order, so anything derived from the pool is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidatePool {
    candidates: BTreeMap<CandidateId, Candidate>,
    next_id: u64,
}

impl CandidatePool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a genome; returns the id assigned to it.
    pub fn insert(&mut self, genome: Genome, team: Team, born_in: u32) -> CandidateId {
        let id = CandidateId(self.next_id);
        self.next_id += 1;
        self.candidates
            .insert(id, Candidate::new(id, genome, team, born_in));
        id
    }

    /// Add raw genome data from outside the core.
    ///
    /// Missing or malformed data becomes a fresh random genome.
    pub fn import(
        &mut self,
        raw: Option<&[f64]>,
        team: Team,
        born_in: u32,
        rng: &mut SeededRng,
    ) -> CandidateId {
        let genome = Genome::from_raw_or_random(raw, rng);
        self.insert(genome, team, born_in)
    }

    /// Remove a candidate, dropping its history.
    pub fn remove(&mut self, id: CandidateId) -> Option<Candidate> {
        self.candidates.remove(&id)
    }

    /// Look up a candidate.
    #[must_use]
    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    /// Look up a candidate mutably.
    pub fn get_mut(&mut self, id: CandidateId) -> Option<&mut Candidate> {
        self.candidates.get_mut(&id)
    }

    /// Number of candidates across both teams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// All candidates in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    /// All candidates in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Candidate> {
        self.candidates.values_mut()
    }

    /// One team's candidates in id order.
    pub fn team(&self, team: Team) -> impl Iterator<Item = &Candidate> {
        self.candidates.values().filter(move |c| c.team == team)
    }

    /// Number of candidates on a team.
    #[must_use]
    pub fn team_size(&self, team: Team) -> usize {
        self.team(team).count()
    }

    /// Ids of a team's candidates in id order.
    #[must_use]
    pub fn team_ids(&self, team: Team) -> Vec<CandidateId> {
        self.team(team).map(|c| c.id).collect()
    }

    /// Mean fitness of a team, or `None` if it has no candidates.
    #[must_use]
    pub fn mean_fitness(&self, team: Team) -> Option<f64> {
        let (sum, n) = self
            .team(team)
            .fold((0.0, 0usize), |(s, n), c| (s + c.fitness, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Highest-fitness candidate of a team; ties go to the lowest id.
    #[must_use]
    pub fn best(&self, team: Team) -> Option<&Candidate> {
        self.team(team)
            .fold(None, |best: Option<&Candidate>, c| match best {
                Some(b) if b.fitness >= c.fitness => Some(b),
                _ => Some(c),
            })
    }

    /// Fill each team with `per_team` team-biased random genomes.
    pub fn seed_teams(&mut self, per_team: usize, born_in: u32, rng: &mut SeededRng) {
        for team in Team::BOTH {
            for _ in 0..per_team {
                let genome = Genome::team_biased(team, rng);
                self.insert(genome, team, born_in);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(won: bool, drawn: bool) -> BattleRecord {
        BattleRecord {
            scenario_id: "open_field".into(),
            seed: 1,
            generation: 0,
            won,
            drawn,
            opponent_strength: 0.5,
            score: 0.5,
        }
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut pool = CandidatePool::new();
        let a = pool.insert(Genome::default(), Team::Red, 0);
        pool.remove(a);
        let b = pool.insert(Genome::default(), Team::Red, 0);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_team_partition() {
        let mut rng = SeededRng::new(4);
        let mut pool = CandidatePool::new();
        pool.seed_teams(3, 0, &mut rng);
        assert_eq!(pool.team_size(Team::Red), 3);
        assert_eq!(pool.team_size(Team::Blue), 3);
        assert!(pool.team(Team::Blue).all(|c| c.team == Team::Blue));
    }

    #[test]
    fn test_import_sanitizes() {
        let mut rng = SeededRng::new(4);
        let mut pool = CandidatePool::new();
        let ok = pool.import(Some(&[0.5; 9]), Team::Red, 0, &mut rng);
        assert_eq!(pool.get(ok).unwrap().genome, Genome::uniform(0.5));

        let short = pool.import(Some(&[0.5; 3]), Team::Red, 0, &mut rng);
        let nan = pool.import(Some(&[f64::NAN; 9]), Team::Blue, 0, &mut rng);
        let missing = pool.import(None, Team::Blue, 0, &mut rng);
        for id in [short, nan, missing] {
            let g = pool.get(id).unwrap().genome;
            assert!(g.values().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_record_counts() {
        let mut c = Candidate::new(CandidateId(0), Genome::default(), Team::Red, 0);
        c.record(record(true, false));
        c.record(record(false, true));
        c.record(record(false, false));
        assert_eq!((c.battles, c.wins, c.draws, c.losses()), (3, 1, 1, 1));
        assert!((c.win_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_best_and_mean() {
        let mut pool = CandidatePool::new();
        let a = pool.insert(Genome::default(), Team::Red, 0);
        let b = pool.insert(Genome::default(), Team::Red, 0);
        pool.get_mut(a).unwrap().fitness = 0.2;
        pool.get_mut(b).unwrap().fitness = 0.6;
        assert_eq!(pool.best(Team::Red).unwrap().id, b);
        assert!((pool.mean_fitness(Team::Red).unwrap() - 0.4).abs() < 1e-12);
        assert!(pool.mean_fitness(Team::Blue).is_none());
    }
}
