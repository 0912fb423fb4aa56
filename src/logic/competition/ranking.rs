// Functions for ranking competitors within a group.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::logic::competition::Standing;

// What ranking criteria a group stage has.
#[derive(Debug, Serialize, Deserialize)]
#[derive(Eq, Hash, PartialEq)]
#[derive(Clone, Copy)]
pub enum RankCriteria {
    Seed,   // Lower is better.
    Points,
    ScoreDifference,
    ScoresFor,
    ScoresAgainst,  // Lower is better.
    Wins,
    Draws,
    Losses, // Lower is better.
}

type CmpFunc = fn (&Standing, &Standing) -> Ordering;

// Compare functions here.

fn compare_seed(a: &Standing, b: &Standing) -> Ordering {
    a.seed.cmp(&b.seed)
}

fn compare_points(a: &Standing, b: &Standing) -> Ordering {
    b.points.cmp(&a.points)
}

fn compare_score_difference(a: &Standing, b: &Standing) -> Ordering {
    b.score_difference().cmp(&a.score_difference())
}

fn compare_scores_for(a: &Standing, b: &Standing) -> Ordering {
    b.score_for.cmp(&a.score_for)
}

fn compare_scores_against(a: &Standing, b: &Standing) -> Ordering {
    a.score_against.cmp(&b.score_against)
}

fn compare_wins(a: &Standing, b: &Standing) -> Ordering {
    b.wins.cmp(&a.wins)
}

fn compare_draws(a: &Standing, b: &Standing) -> Ordering {
    b.draws.cmp(&a.draws)
}

fn compare_losses(a: &Standing, b: &Standing) -> Ordering {
    a.losses.cmp(&b.losses)
}

impl RankCriteria {
    // Get the compare function of the criteria.
    fn sort_function(&self) -> CmpFunc {
        match self {
            RankCriteria::Seed => compare_seed,
            RankCriteria::Points => compare_points,
            RankCriteria::ScoreDifference => compare_score_difference,
            RankCriteria::ScoresFor => compare_scores_for,
            RankCriteria::ScoresAgainst => compare_scores_against,
            RankCriteria::Wins => compare_wins,
            RankCriteria::Draws => compare_draws,
            RankCriteria::Losses => compare_losses,
        }
    }

    // The order used when a group stage does not define its own.
    pub fn default_order() -> Vec<RankCriteria> {
        vec![
            RankCriteria::Points,
            RankCriteria::ScoreDifference,
            RankCriteria::ScoresFor,
            RankCriteria::Wins,
        ]
    }
}

// Compare two standings with the criteria in order. Seed always decides in the end.
pub fn compare(a: &Standing, b: &Standing, criteria: &[RankCriteria]) -> Ordering {
    criteria.iter()
        .map(|c| c.sort_function()(a, b))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| compare_seed(a, b))
}

// Sort the standings from best to worst.
pub fn sort_standings(standings: &mut [Standing], criteria: &[RankCriteria]) {
    standings.sort_by(|a, b| compare(a, b, criteria));
}
