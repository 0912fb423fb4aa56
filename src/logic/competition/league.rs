// A ladder of divisions with promotion and relegation between neighbours.
use std::collections::HashSet;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::division::{Division, DivisionPhase},
    competitor::Competitor,
    error::ScheduleError,
    types::{CompetitionId, CompetitorId},
};

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct League {
    #[serde(default)]
    pub id: CompetitionId,
    pub name: String,
    #[serde(default = "first_season")]
    pub season: u32,

    // The top division comes first.
    pub divisions: Vec<Division>,

    // Next season's divisions, built by end().
    #[serde(default)]
    pub post_season_divisions: Vec<Division>,
}

fn first_season() -> u32 {
    1
}

// Basics.
impl League {
    pub fn build(name: &str, divisions: Vec<Division>) -> Self {
        League {
            id: 0,
            name: name.to_string(),
            season: first_season(),
            divisions,
            post_season_divisions: Vec::new(),
        }
    }

    pub fn division(&self, name: &str) -> Option<&Division> {
        self.divisions.iter().find(|d| d.name == name)
    }

    pub fn division_mut(&mut self, name: &str) -> Option<&mut Division> {
        self.divisions.iter_mut().find(|d| d.name == name)
    }

    // Find a competitor anywhere in the league.
    pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
        self.divisions.iter().find_map(|d| d.competitors.by_id(id))
    }

    pub fn competitor_count(&self) -> usize {
        self.divisions.iter().map(|d| d.competitors.len()).sum()
    }

    // Check that a restored league is internally consistent.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for division in self.divisions.iter().chain(self.post_season_divisions.iter()) {
            division.validate()?;
        }
        for division in self.divisions.iter() {
            if !names.insert(division.name.as_str()) {
                return Err(ScheduleError::InvalidOptions(format!("{}: duplicate division {}", self.name, division.name)));
            }
            for competitor in division.competitors.iter() {
                if !ids.insert(competitor.id) {
                    return Err(ScheduleError::DuplicateCompetitor(competitor.id));
                }
            }
        }
        return Ok(());
    }

    fn first_not_done<F: Fn(&Division) -> bool>(&self, done: F) -> Option<&Division> {
        self.divisions.iter().find(|d| !done(d))
    }
}

// Functional.
impl League {
    // Start every division. Nothing changes if one of them fails.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ScheduleError> {
        let mut divisions = self.divisions.clone();
        for division in divisions.iter_mut() {
            division.start(rng)?;
        }
        self.divisions = divisions;
        info!("{}: season {} started with {} competitors", self.name, self.season, self.competitor_count());
        return Ok(());
    }

    pub fn is_group_stage_done(&self) -> bool {
        self.divisions.iter().all(Division::is_group_stage_done)
    }

    pub fn is_post_season_started(&self) -> bool {
        self.divisions.iter().all(|d| d.phase >= DivisionPhase::PostSeason)
    }

    // Start the post-season of every division, once they have all finished their group stage.
    // Goes from the bottom up, so that each division knows how many come up from below.
    pub fn start_post_season(&mut self) -> Result<(), ScheduleError> {
        if let Some(division) = self.first_not_done(Division::is_group_stage_done) {
            return Err(ScheduleError::GroupStageNotDone(division.name.clone()));
        }

        let mut divisions = self.divisions.clone();
        for i in (0..divisions.len()).rev() {
            let neighbor_promotion_num = match divisions.get(i + 1) {
                Some(below) => below.promotion_num(),
                None => 0,
            };
            divisions[i].start_post_season(neighbor_promotion_num)?;
        }
        self.divisions = divisions;
        return Ok(());
    }

    pub fn is_done(&self) -> bool {
        self.divisions.iter().all(Division::is_done)
    }

    // End the post-season of every division, once they are all done.
    pub fn end_post_season(&mut self) -> Result<(), ScheduleError> {
        if let Some(division) = self.first_not_done(Division::is_done) {
            return Err(ScheduleError::PostSeasonNotDone(division.name.clone()));
        }

        let mut divisions = self.divisions.clone();
        for division in divisions.iter_mut() {
            division.end_post_season()?;
        }
        self.divisions = divisions;
        return Ok(());
    }

    pub fn is_over(&self) -> bool {
        self.divisions.iter().all(|d| d.phase == DivisionPhase::PostSeasonDone)
    }

    // Build next season's divisions.
    // Everyone stays where they are, except the promoted of every division but the top one,
    // and the relegated of every division but the bottom one.
    pub fn end(&mut self) -> Result<(), ScheduleError> {
        if let Some(division) = self.first_not_done(|d| d.phase == DivisionPhase::PostSeasonDone) {
            return Err(ScheduleError::PostSeasonNotDone(division.name.clone()));
        }

        let last = self.divisions.len().saturating_sub(1);
        let mut next = Vec::with_capacity(self.divisions.len());
        for (i, division) in self.divisions.iter().enumerate() {
            let going_up: Vec<Competitor> = if i > 0 { division.promoted() } else { Vec::new() };
            let going_down: Vec<Competitor> = if i < last { division.relegation_bottomfeeders.clone() } else { Vec::new() };
            let leaving: HashSet<CompetitorId> = going_up.iter().chain(going_down.iter()).map(|c| c.id).collect();

            let mut competitors: Vec<Competitor> = division.competitors.iter()
                .filter(|c| !leaving.contains(&c.id))
                .cloned()
                .collect();
            if let Some(below) = self.divisions.get(i + 1) {
                competitors.extend(below.promoted());
            }
            if i > 0 {
                competitors.extend(self.divisions[i - 1].relegation_bottomfeeders.iter().cloned());
            }

            let mut new_division = division.empty_copy();
            new_division.populate(competitors)?;
            next.push(new_division);
        }

        for (old, new) in self.divisions.iter().zip(next.iter()) {
            info!("{}: {} competitors next season ({} this season)", new.name, new.competitors.len(), old.competitors.len());
        }
        self.post_season_divisions = next;
        return Ok(());
    }

    // The league of the following season.
    pub fn next_season(&self) -> Result<League, ScheduleError> {
        if self.post_season_divisions.len() != self.divisions.len() || self.divisions.is_empty() {
            return Err(ScheduleError::PostSeasonNotDone(self.name.clone()));
        }

        return Ok(League {
            id: self.id,
            name: self.name.clone(),
            season: self.season + 1,
            divisions: self.post_season_divisions.clone(),
            post_season_divisions: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::logic::competition::division::tests::{competitors, play_group_stage, play_post_season};

    // Top: one conference of 8. Middle: 4 conferences of 8. Bottom: 8 conferences of 8.
    fn ladder() -> League {
        let mut top = Division::build("Premier", 8, 8, 0.0);
        top.populate(competitors(1, 8)).unwrap();
        let mut middle = Division::build("Challenger", 32, 8, 0.15);
        middle.populate(competitors(101, 32)).unwrap();
        let mut bottom = Division::build("Open", 64, 8, 0.15);
        bottom.populate(competitors(201, 64)).unwrap();
        League::build("Esports League", vec![top, middle, bottom])
    }

    fn play_season(league: &mut League, seed: u64) {
        league.start(&mut StdRng::seed_from_u64(seed)).unwrap();
        for division in league.divisions.iter_mut() {
            play_group_stage(division);
        }
        league.start_post_season().unwrap();
        for division in league.divisions.iter_mut() {
            play_post_season(division);
        }
        league.end_post_season().unwrap();
        league.end().unwrap();
    }

    #[test]
    fn population_is_conserved() {
        let mut league = ladder();
        let mut all_ids: Vec<CompetitorId> = league.divisions.iter().flat_map(|d| d.competitors.iter().map(|c| c.id)).collect();
        all_ids.sort();

        for season in 0..3 {
            play_season(&mut league, season);
            for (old, new) in league.divisions.iter().zip(league.post_season_divisions.iter()) {
                assert_eq!(new.competitors.len(), old.size);
            }
            league = league.next_season().unwrap();

            let mut ids: Vec<CompetitorId> = league.divisions.iter().flat_map(|d| d.competitors.iter().map(|c| c.id)).collect();
            ids.sort();
            assert_eq!(ids, all_ids);
        }
        assert_eq!(league.season, 4);
    }

    #[test]
    fn promotion_counts_follow_the_division_below() {
        let mut league = ladder();
        league.start(&mut StdRng::seed_from_u64(9)).unwrap();
        for division in league.divisions.iter_mut() {
            play_group_stage(division);
        }
        league.start_post_season().unwrap();

        // The bottom sends up 8 winners and a playoff winner, the middle 4 winners and no playoffs.
        assert_eq!(league.divisions[2].promotion_num(), 9);
        assert_eq!(league.divisions[1].promotion_num(), 4);
        assert_eq!(league.divisions[1].relegation_bottomfeeders.len(), 9);
        assert_eq!(league.divisions[0].relegation_bottomfeeders.len(), 4);
        assert!(league.divisions[2].relegation_bottomfeeders.is_empty());
    }

    #[test]
    fn movement_between_divisions() {
        let mut league = ladder();
        play_season(&mut league, 10);

        let top_relegated = league.divisions[0].relegation_bottomfeeders.clone();
        let middle_promoted = league.divisions[1].promoted();
        let next = &league.post_season_divisions;
        assert!(top_relegated.iter().all(|c| next[1].competitors.contains(c.id)));
        assert!(middle_promoted.iter().all(|c| next[0].competitors.contains(c.id)));

        // The top division keeps its champion.
        let champion = &league.divisions[0].conference_winners[0];
        assert!(next[0].competitors.contains(champion.id));
        assert_eq!(next[0].phase, DivisionPhase::Populated);
    }

    #[test]
    fn gates_are_all_or_nothing() {
        let mut league = ladder();
        league.start(&mut StdRng::seed_from_u64(11)).unwrap();
        play_group_stage(&mut league.divisions[0]);
        play_group_stage(&mut league.divisions[2]);

        let before = league.clone();
        assert_eq!(league.start_post_season(), Err(ScheduleError::GroupStageNotDone("Challenger".to_string())));
        assert_eq!(league, before);
        assert!(league.end_post_season().is_err());
        assert!(league.end().is_err());
        assert!(league.next_season().is_err());
    }

    #[test]
    fn failed_start_changes_nothing() {
        let mut league = ladder();
        league.divisions.push(Division::build("Empty", 8, 8, 0.0));
        let before = league.clone();
        assert!(league.start(&mut StdRng::seed_from_u64(12)).is_err());
        assert_eq!(league, before);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut league = ladder();
        league.start(&mut StdRng::seed_from_u64(13)).unwrap();
        play_group_stage(&mut league.divisions[1]);

        let json = serde_json::to_string(&league).unwrap();
        let restored: League = serde_json::from_str(&json).unwrap();
        restored.validate().unwrap();
        assert_eq!(restored, league);
    }
}
