// Competitors and the ordered registries that hand them to schedulers.
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::logic::{error::ScheduleError, types::{CompetitorId, Seed}};

// A team taking part in competitions. Identity is the ID.
#[derive(Debug, Clone)]
#[derive(Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,

    // Strength tier. Lower is stronger.
    #[serde(default)]
    pub tier: Option<u8>,
}

impl PartialEq for Competitor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Competitor {}

impl Competitor {
    // Build the competitor.
    pub fn build(id: CompetitorId, name: &str) -> Self {
        Competitor {
            id,
            name: name.to_string(),
            tier: None,
        }
    }

    // Set the strength tier.
    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = Some(tier);
        self
    }
}

// An ordered list of competitors. The order defines the seeds.
// Once locked, the order and the contents are final.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct CompetitorRegistry {
    competitors: Vec<Competitor>,
    #[serde(default)]
    locked: bool,
}

// Basics.
impl CompetitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Build an unlocked registry from a list, rejecting duplicates.
    pub fn build(competitors: Vec<Competitor>) -> Result<Self, ScheduleError> {
        let mut registry = Self::new();
        for competitor in competitors {
            registry.add(competitor)?;
        }
        return Ok(registry);
    }

    // Build a registry whose order is already final.
    pub fn build_locked(competitors: Vec<Competitor>) -> Result<Self, ScheduleError> {
        let mut registry = Self::build(competitors)?;
        registry.lock();
        return Ok(registry);
    }

    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Competitor> {
        self.competitors.iter()
    }

    pub fn as_slice(&self) -> &[Competitor] {
        &self.competitors
    }

    pub fn to_vec(&self) -> Vec<Competitor> {
        self.competitors.clone()
    }
}

// Functional.
impl CompetitorRegistry {
    // Add a competitor to the end. Returns its seed.
    pub fn add(&mut self, competitor: Competitor) -> Result<Seed, ScheduleError> {
        if self.locked {
            return Err(ScheduleError::AlreadyStarted);
        }
        if self.contains(competitor.id) {
            return Err(ScheduleError::DuplicateCompetitor(competitor.id));
        }

        self.competitors.push(competitor);
        return Ok(self.competitors.len());
    }

    // Remove a competitor. Only possible before the schedule has started.
    pub fn remove(&mut self, id: CompetitorId) -> Result<Competitor, ScheduleError> {
        if self.locked {
            return Err(ScheduleError::AlreadyStarted);
        }

        match self.competitors.iter().position(|c| c.id == id) {
            Some(i) => Ok(self.competitors.remove(i)),
            None => Err(ScheduleError::UnknownCompetitor(id)),
        }
    }

    // Shuffle the order.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ScheduleError> {
        if self.locked {
            return Err(ScheduleError::AlreadyStarted);
        }
        self.competitors.shuffle(rng);
        return Ok(());
    }

    // Freeze the order.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    // The same competitors, open for changes again.
    pub fn unlocked_copy(&self) -> Self {
        CompetitorRegistry { competitors: self.competitors.clone(), locked: false }
    }

    pub fn contains(&self, id: CompetitorId) -> bool {
        self.competitors.iter().any(|c| c.id == id)
    }

    // Get the competitor with the given seed.
    pub fn by_seed(&self, seed: Seed) -> Option<&Competitor> {
        match seed {
            0 => None,
            _ => self.competitors.get(seed - 1),
        }
    }

    pub fn by_id(&self, id: CompetitorId) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.id == id)
    }

    // Get the seed of a competitor.
    pub fn seed_of(&self, id: CompetitorId) -> Option<Seed> {
        self.competitors.iter().position(|c| c.id == id).map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn registry(n: u32) -> CompetitorRegistry {
        CompetitorRegistry::build((1..=n).map(|i| Competitor::build(i, &format!("Team {i}"))).collect()).unwrap()
    }

    #[test]
    fn seeds_follow_insertion_order() {
        let mut registry = registry(3);
        assert_eq!(registry.add(Competitor::build(10, "Late")).unwrap(), 4);
        assert_eq!(registry.by_seed(1).unwrap().id, 1);
        assert_eq!(registry.by_seed(4).unwrap().id, 10);
        assert!(registry.by_seed(0).is_none());
        assert!(registry.by_seed(5).is_none());
        assert_eq!(registry.seed_of(10), Some(4));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = registry(3);
        assert_eq!(registry.add(Competitor::build(2, "Again")), Err(ScheduleError::DuplicateCompetitor(2)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn locking_freezes_the_registry() {
        let mut registry = registry(4);
        let removed = registry.remove(2).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(registry.remove(2), Err(ScheduleError::UnknownCompetitor(2)));

        registry.lock();
        assert_eq!(registry.remove(1), Err(ScheduleError::AlreadyStarted));
        assert_eq!(registry.add(Competitor::build(9, "New")), Err(ScheduleError::AlreadyStarted));
        assert_eq!(registry.shuffle(&mut StdRng::seed_from_u64(1)), Err(ScheduleError::AlreadyStarted));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn shuffle_keeps_everyone() {
        let mut registry = registry(16);
        registry.shuffle(&mut StdRng::seed_from_u64(7)).unwrap();
        let mut ids: Vec<CompetitorId> = registry.iter().map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }
}
