// Match results for matches nobody plays by hand.
use std::sync::Mutex;

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::logic::{
    error::{EngineError, EngineResult},
    types::Score,
};

// Produces the score of a match between two competitors of the given tiers.
#[async_trait]
pub trait MatchOutcomeGenerator: Send + Sync {
    async fn generate(&self, home_tier: Option<u8>, away_tier: Option<u8>, allow_draw: bool) -> EngineResult<Score>;
}

// Weighted randomness. Return index.
// None if there is nothing to pick or the weights add up past u32::MAX.
pub fn random_with_weights<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> Option<usize> {
    let total = weights.iter().try_fold(0u32, |sum, w| sum.checked_add(*w))?;
    if total == 0 {
        return None;
    }

    let random = rng.random_range(0..total);
    let mut counter = 0;
    for (i, weight) in weights.iter().enumerate() {
        counter += weight;
        if random < counter {
            return Some(i);
        }
    }
    return None;
}

// Best of three maps, or two maps when draws are allowed.
// Lower tiers are stronger and win more often.
#[derive(Debug)]
pub struct TierWeightedOutcome {
    rng: Mutex<StdRng>,
}

// Possible results, decisive first.
const DECISIVE: [Score; 4] = [[2, 0], [2, 1], [1, 2], [0, 2]];
const DRAW: Score = [1, 1];

impl TierWeightedOutcome {
    pub fn build(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        TierWeightedOutcome { rng: Mutex::new(rng) }
    }

    fn strength(tier: Option<u8>) -> u32 {
        match tier {
            Some(t) => 10u32.saturating_sub(u32::from(t)).max(1),
            None => 5,
        }
    }

    fn weights(home_tier: Option<u8>, away_tier: Option<u8>, allow_draw: bool) -> Vec<u32> {
        let home = Self::strength(home_tier);
        let away = Self::strength(away_tier);
        let mut weights = vec![2 * home, home, away, 2 * away];
        if allow_draw {
            weights.push(home + away);
        }
        return weights;
    }
}

#[async_trait]
impl MatchOutcomeGenerator for TierWeightedOutcome {
    async fn generate(&self, home_tier: Option<u8>, away_tier: Option<u8>, allow_draw: bool) -> EngineResult<Score> {
        let weights = Self::weights(home_tier, away_tier, allow_draw);
        let mut rng = self.rng.lock().map_err(|e| EngineError::Outcome(e.to_string()))?;
        let index = random_with_weights(&mut *rng, &weights)
            .ok_or_else(|| EngineError::Outcome("no possible results".to_string()))?;

        return Ok(DECISIVE.get(index).copied().unwrap_or(DRAW));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_indices() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(random_with_weights(&mut rng, &[]), None);
        assert_eq!(random_with_weights(&mut rng, &[0, 0]), None);
        for _ in 0..50 {
            assert_eq!(random_with_weights(&mut rng, &[0, 5, 0]), Some(1));
        }
    }

    #[test]
    fn weights_past_the_limit() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(random_with_weights(&mut rng, &[u32::MAX, 1]), None);
        assert_eq!(random_with_weights(&mut rng, &[u32::MAX, 0]), Some(0));
    }

    #[tokio::test]
    async fn decisive_when_draws_are_not_allowed() {
        let outcome = TierWeightedOutcome::build(Some(8));
        for _ in 0..200 {
            let [home, away] = outcome.generate(Some(1), Some(3), false).await.unwrap();
            assert_ne!(home, away);
            assert!(home == 2 || away == 2);
        }
    }

    #[tokio::test]
    async fn seeded_results_repeat() {
        let a = TierWeightedOutcome::build(Some(21));
        let b = TierWeightedOutcome::build(Some(21));
        for _ in 0..20 {
            assert_eq!(a.generate(None, Some(2), true).await.unwrap(), b.generate(None, Some(2), true).await.unwrap());
        }
    }
}
