// Knockout cups.
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::{elimination::{Elimination, EliminationOptions}, MatchId, MatchQuery},
    competitor::{Competitor, CompetitorRegistry},
    error::ScheduleError,
    types::{CompetitionId, CompetitorId, Score},
};

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Cup {
    #[serde(default)]
    pub id: CompetitionId,
    pub name: String,
    #[serde(default = "first_season")]
    pub season: u32,
    pub competitors: CompetitorRegistry,

    // None until the cup has started.
    #[serde(default)]
    pub bracket: Option<Elimination>,
}

fn first_season() -> u32 {
    1
}

// Basics.
impl Cup {
    pub fn build(name: &str, competitors: Vec<Competitor>) -> Result<Self, ScheduleError> {
        Ok(Cup {
            id: 0,
            name: name.to_string(),
            season: first_season(),
            competitors: CompetitorRegistry::build(competitors)?,
            bracket: None,
        })
    }

    pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
        self.competitors.by_id(id)
    }

    // Check that a restored cup is internally consistent.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if let Some(bracket) = self.bracket.as_ref() {
            if bracket.num_players() != self.competitors.len() {
                return Err(ScheduleError::InvalidOptions(format!(
                    "{}: {} competitors for {} seeds", self.name, self.competitors.len(), bracket.num_players()
                )));
            }
        }
        return Ok(());
    }
}

// Functional.
impl Cup {
    // Shuffle the competitors and draw the bracket.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ScheduleError> {
        if self.bracket.is_some() {
            return Err(ScheduleError::AlreadyStarted);
        }

        let mut registry = self.competitors.clone();
        registry.shuffle(rng)?;
        let bracket = Elimination::new(registry.len(), EliminationOptions::short())?;
        registry.lock();

        info!("{}: season {} drawn with {} competitors and {} byes", self.name, self.season, registry.len(), bracket.bye_count());
        self.competitors = registry;
        self.bracket = Some(bracket);
        return Ok(());
    }

    pub fn is_done(&self) -> bool {
        self.bracket.as_ref().is_some_and(Elimination::is_done)
    }

    // Check whether every match of the query has been resolved.
    pub fn matches_done(&self, query: MatchQuery) -> bool {
        self.bracket.as_ref().is_some_and(|b| b.matches_done(query))
    }

    pub fn score(&mut self, id: MatchId, score: Score) -> Result<(), ScheduleError> {
        match self.bracket.as_mut() {
            Some(bracket) => bracket.score(id, score),
            None => Err(ScheduleError::NotStarted),
        }
    }

    pub fn winner(&self) -> Option<&Competitor> {
        let seed = self.bracket.as_ref()?.winner()?;
        self.competitors.by_seed(seed)
    }

    // The same cup for the following season, not yet drawn.
    pub fn next_season(&self) -> Cup {
        Cup {
            id: self.id,
            name: self.name.clone(),
            season: self.season + 1,
            competitors: self.competitors.unlocked_copy(),
            bracket: None,
        }
    }
}
