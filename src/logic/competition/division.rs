// Divisions, their conferences and the promotion playoffs.
use std::collections::HashSet;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::{
        elimination::{Elimination, EliminationOptions},
        round_robin::{RoundRobin, RoundRobinOptions},
        MatchId, Standing,
    },
    competitor::{Competitor, CompetitorRegistry},
    error::ScheduleError,
    types::{convert, CompetitorId, Score},
};

// How far a division has got in its season.
#[derive(Debug, Clone, Copy, Default)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub enum DivisionPhase {
    #[default]
    Empty,
    Populated,
    GroupStage,
    PostSeason,
    PostSeasonDone,
}

// Which part of a division a match belongs to.
#[derive(Debug, Clone, Copy)]
#[derive(PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum ConferenceId {
    Group(u32),
    Promotion(u32),
}

// A group of a division playing a round robin.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Conference {
    pub id: u32,
    pub competitors: CompetitorRegistry,
    pub schedule: RoundRobin,
}

impl Conference {
    fn build(id: u32, competitors: Vec<Competitor>, options: RoundRobinOptions) -> Result<Self, ScheduleError> {
        let schedule = RoundRobin::new(competitors.len(), options.with_group_size(0))?;
        Ok(Conference {
            id,
            competitors: CompetitorRegistry::build_locked(competitors)?,
            schedule,
        })
    }

    // Standings paired with the competitors, best first.
    pub fn standings(&self) -> Vec<(Standing, &Competitor)> {
        self.schedule.results().into_iter()
            .filter_map(|s| self.competitors.by_seed(s.seed).map(|c| (s, c)))
            .collect()
    }
}

// A playoff bracket deciding one promotion spot.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct PromotionConference {
    pub id: u32,
    pub competitors: CompetitorRegistry,
    pub bracket: Elimination,
}

impl PromotionConference {
    fn build(id: u32, competitors: Vec<Competitor>) -> Result<Self, ScheduleError> {
        let bracket = Elimination::new(competitors.len(), EliminationOptions::short())?;
        Ok(PromotionConference {
            id,
            competitors: CompetitorRegistry::build_locked(competitors)?,
            bracket,
        })
    }

    pub fn winner(&self) -> Option<&Competitor> {
        self.bracket.winner().and_then(|seed| self.competitors.by_seed(seed))
    }
}

// A competitor's final group stage result, used for sorting promotion and relegation pools.
#[derive(Debug, Clone)]
struct PoolEntry {
    conference_index: usize,
    standing: Standing,
    competitor: Competitor,
}

// Best first.
fn compare_pool_entries(a: &PoolEntry, b: &PoolEntry) -> std::cmp::Ordering {
    a.standing.group_position.cmp(&b.standing.group_position)
        .then_with(|| b.standing.points.cmp(&a.standing.points))
        .then_with(|| b.standing.score_difference().cmp(&a.standing.score_difference()))
        .then_with(|| b.standing.score_for.cmp(&a.standing.score_for))
        .then_with(|| a.conference_index.cmp(&b.conference_index))
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Division {
    pub name: String,

    // Intended number of competitors.
    pub size: usize,
    pub conference_size: usize,

    // Share of the division promoted each season, between 0 and 1.
    pub promotion_percent: f64,

    #[serde(default)]
    pub group_options: RoundRobinOptions,

    pub competitors: CompetitorRegistry,
    #[serde(default)]
    pub conferences: Vec<Conference>,
    #[serde(default)]
    pub conference_winners: Vec<Competitor>,
    #[serde(default)]
    pub promotion_conferences: Vec<PromotionConference>,
    #[serde(default)]
    pub promotion_winners: Vec<Competitor>,

    // Worst first.
    #[serde(default)]
    pub relegation_bottomfeeders: Vec<Competitor>,

    #[serde(default)]
    pub phase: DivisionPhase,
}

// Basics.
impl Division {
    // Build an empty division.
    pub fn build(name: &str, size: usize, conference_size: usize, promotion_percent: f64) -> Self {
        Division {
            name: name.to_string(),
            size,
            conference_size,
            promotion_percent,
            group_options: RoundRobinOptions::default(),
            competitors: CompetitorRegistry::new(),
            conferences: Vec::new(),
            conference_winners: Vec::new(),
            promotion_conferences: Vec::new(),
            promotion_winners: Vec::new(),
            relegation_bottomfeeders: Vec::new(),
            phase: DivisionPhase::Empty,
        }
    }

    pub fn with_group_options(mut self, options: RoundRobinOptions) -> Self {
        self.group_options = options;
        self
    }

    // An empty division with the same setup as this one.
    pub fn empty_copy(&self) -> Self {
        Self::build(&self.name, self.size, self.conference_size, self.promotion_percent)
            .with_group_options(self.group_options)
    }

    pub fn conference(&self, id: u32) -> Option<&Conference> {
        self.conferences.iter().find(|c| c.id == id)
    }

    pub fn promotion_conference(&self, id: u32) -> Option<&PromotionConference> {
        self.promotion_conferences.iter().find(|c| c.id == id)
    }

    // How many competitors this division sends up. Known once the post-season has started.
    pub fn promotion_num(&self) -> usize {
        self.conference_winners.len() + self.promotion_conferences.len()
    }

    // Everyone going up, once the post-season is done.
    pub fn promoted(&self) -> Vec<Competitor> {
        self.conference_winners.iter().chain(self.promotion_winners.iter()).cloned().collect()
    }

    fn wrong_phase(&self, operation: &'static str) -> ScheduleError {
        ScheduleError::WrongPhase { name: self.name.clone(), operation, phase: self.phase }
    }

    fn validate_setup(&self) -> Result<(), ScheduleError> {
        if self.conference_size < 2 {
            return Err(ScheduleError::InvalidOptions(format!("{}: conferences need room for two", self.name)));
        }
        if !(0.0..=1.0).contains(&self.promotion_percent) {
            return Err(ScheduleError::InvalidOptions(format!("{}: promotion percent {} is out of range", self.name, self.promotion_percent)));
        }
        return Ok(());
    }

    // Check that a restored division is internally consistent.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.validate_setup()?;
        let invalid = |reason: String| Err(ScheduleError::InvalidOptions(format!("{}: {reason}", self.name)));

        if self.phase >= DivisionPhase::GroupStage && self.conferences.is_empty() {
            return invalid(format!("no conferences in phase {:?}", self.phase));
        }
        for conference in self.conferences.iter() {
            if conference.schedule.num_players() != conference.competitors.len() {
                return invalid(format!("conference {} has {} competitors for {} seeds",
                    conference.id, conference.competitors.len(), conference.schedule.num_players()));
            }
        }
        for conference in self.promotion_conferences.iter() {
            if conference.bracket.num_players() != conference.competitors.len() {
                return invalid(format!("promotion conference {} has {} competitors for {} seeds",
                    conference.id, conference.competitors.len(), conference.bracket.num_players()));
            }
        }
        let in_conferences: usize = self.conferences.iter().map(|c| c.competitors.len()).sum();
        if !self.conferences.is_empty() && in_conferences != self.competitors.len() {
            return invalid(format!("{in_conferences} competitors in conferences, {} in the division", self.competitors.len()));
        }
        return Ok(());
    }
}

// Functional.
impl Division {
    // Fill the division with competitors.
    pub fn populate(&mut self, competitors: Vec<Competitor>) -> Result<(), ScheduleError> {
        if self.phase > DivisionPhase::Populated {
            return Err(self.wrong_phase("be populated"));
        }

        let mut registry = self.competitors.clone();
        for competitor in competitors {
            registry.add(competitor)?;
        }
        self.competitors = registry;
        self.phase = DivisionPhase::Populated;
        return Ok(());
    }

    // Remove a competitor before the season starts.
    pub fn remove_competitor(&mut self, id: CompetitorId) -> Result<Competitor, ScheduleError> {
        if self.phase > DivisionPhase::Populated {
            return Err(self.wrong_phase("remove competitors"));
        }
        self.competitors.remove(id)
    }

    // Shuffle the competitors and split them into conferences.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ScheduleError> {
        if self.phase != DivisionPhase::Populated {
            return Err(self.wrong_phase("start"));
        }
        self.validate_setup()?;
        if self.competitors.len() < 2 {
            return Err(ScheduleError::TooFewCompetitors(self.competitors.len()));
        }

        let mut registry = self.competitors.clone();
        registry.shuffle(rng)?;
        registry.lock();

        let mut chunks: Vec<Vec<Competitor>> = registry.as_slice()
            .chunks(self.conference_size)
            .map(|c| c.to_vec())
            .collect();

        // A lone competitor cannot play a round robin, so they join the previous conference.
        if chunks.len() > 1 && chunks.last().is_some_and(|c| c.len() == 1) {
            if let Some(lone) = chunks.pop() {
                if let Some(previous) = chunks.last_mut() {
                    previous.extend(lone);
                }
            }
        }

        let mut conferences = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            conferences.push(Conference::build(i as u32 + 1, chunk, self.group_options)?);
        }

        debug!("{}: {} competitors in {} conferences", self.name, registry.len(), conferences.len());
        self.competitors = registry;
        self.conferences = conferences;
        self.phase = DivisionPhase::GroupStage;
        return Ok(());
    }

    pub fn is_group_stage_done(&self) -> bool {
        self.phase >= DivisionPhase::GroupStage &&
        !self.conferences.is_empty() &&
        self.conferences.iter().all(|c| c.schedule.is_done())
    }

    // Decide who goes up, who goes down and who plays for the remaining promotion spots.
    // `neighbor_promotion_num` is how many competitors the division below sends up.
    pub fn start_post_season(&mut self, neighbor_promotion_num: usize) -> Result<(), ScheduleError> {
        if self.phase != DivisionPhase::GroupStage {
            return Err(self.wrong_phase("start the post-season"));
        }
        if !self.is_group_stage_done() {
            return Err(ScheduleError::GroupStageNotDone(self.name.clone()));
        }

        let standings: Vec<Vec<PoolEntry>> = self.conferences.iter()
            .enumerate()
            .map(|(i, conference)| {
                conference.standings().into_iter()
                    .map(|(standing, competitor)| PoolEntry {
                        conference_index: i,
                        standing,
                        competitor: competitor.clone(),
                    })
                    .collect()
            })
            .collect();

        let (winners, promotion_conferences, relegated) = match standings.len() {
            1 => self.single_conference_post_season(&standings[0], neighbor_promotion_num),
            _ => self.multi_conference_post_season(&standings, neighbor_promotion_num)?,
        };

        info!(
            "{}: {} conference winners, {} promotion playoffs, {} relegation candidates",
            self.name, winners.len(), promotion_conferences.len(), relegated.len()
        );
        self.conference_winners = winners;
        self.promotion_conferences = promotion_conferences;
        self.relegation_bottomfeeders = relegated;
        self.phase = DivisionPhase::PostSeason;
        return Ok(());
    }

    // The conference winner goes up, the bottom `neighbor_promotion_num` go down.
    fn single_conference_post_season(&self, standings: &[PoolEntry], neighbor_promotion_num: usize) -> (Vec<Competitor>, Vec<PromotionConference>, Vec<Competitor>) {
        let winners: Vec<Competitor> = standings.iter().take(1).map(|e| e.competitor.clone()).collect();
        let relegated_count = neighbor_promotion_num.min(standings.len().saturating_sub(1));
        let relegated = standings.iter()
            .rev()
            .take(relegated_count)
            .map(|e| e.competitor.clone())
            .collect();
        return (winners, Vec::new(), relegated);
    }

    fn multi_conference_post_season(&self, standings: &[Vec<PoolEntry>], neighbor_promotion_num: usize) -> Result<(Vec<Competitor>, Vec<PromotionConference>, Vec<Competitor>), ScheduleError> {
        let conference_count = standings.len();
        let quota = convert::floor_to_usize(convert::usize_to_f64(self.size) * self.promotion_percent);
        let playoff_slots = quota.saturating_sub(conference_count);

        // Every conference winner goes up automatically.
        let winners: Vec<Competitor> = standings.iter()
            .filter_map(|s| s.first())
            .map(|e| e.competitor.clone())
            .collect();

        // The worst of the bottom competitors of every conference go down.
        // Winners are never candidates, so a division can only fall short if it is smaller than what comes up.
        let mut relegated: Vec<Competitor> = Vec::new();
        if neighbor_promotion_num > 0 {
            let per_conference = neighbor_promotion_num.div_ceil(conference_count);
            let mut pool: Vec<PoolEntry> = standings.iter()
                .flat_map(|s| s.iter().skip(1).rev().take(per_conference).cloned())
                .collect();
            if pool.len() < neighbor_promotion_num {
                return Err(ScheduleError::InvalidOptions(format!(
                    "{}: {} relegation candidates for {} promotions from below",
                    self.name, pool.len(), neighbor_promotion_num
                )));
            }

            pool.sort_by(|a, b| compare_pool_entries(b, a));
            relegated = pool.into_iter()
                .take(neighbor_promotion_num)
                .map(|e| e.competitor)
                .collect();
        }

        // Ranks 2 to 4 of every conference play for the remaining spots, unless they are going down.
        let relegated_ids: HashSet<CompetitorId> = relegated.iter().map(|c| c.id).collect();
        let mut promotion_conferences = Vec::new();
        let mut pool: Vec<PoolEntry> = standings.iter()
            .flat_map(|s| s.iter().skip(1).take(3).cloned())
            .filter(|e| !relegated_ids.contains(&e.competitor.id))
            .collect();
        pool.sort_by(compare_pool_entries);

        let group_count = playoff_slots.min(pool.len());
        if group_count > 0 {
            let mut groups: Vec<Vec<Competitor>> = vec![Vec::new(); group_count];
            for (i, entry) in pool.into_iter().enumerate() {
                groups[i % group_count].push(entry.competitor);
            }
            for (i, group) in groups.into_iter().enumerate() {
                promotion_conferences.push(PromotionConference::build(i as u32 + 1, group)?);
            }
        }

        return Ok((winners, promotion_conferences, relegated));
    }

    // Whether the whole season of the division has been played.
    pub fn is_done(&self) -> bool {
        self.is_group_stage_done() &&
        self.phase >= DivisionPhase::PostSeason &&
        self.promotion_conferences.iter().all(|c| c.bracket.is_done())
    }

    // Collect the playoff winners.
    pub fn end_post_season(&mut self) -> Result<(), ScheduleError> {
        if self.phase != DivisionPhase::PostSeason {
            return Err(self.wrong_phase("end the post-season"));
        }
        if !self.is_done() {
            return Err(ScheduleError::PostSeasonNotDone(self.name.clone()));
        }

        let mut winners = Vec::with_capacity(self.promotion_conferences.len());
        for conference in self.promotion_conferences.iter() {
            match conference.winner() {
                Some(c) => winners.push(c.clone()),
                None => return Err(ScheduleError::PostSeasonNotDone(self.name.clone())),
            }
        }

        self.promotion_winners = winners;
        self.phase = DivisionPhase::PostSeasonDone;
        return Ok(());
    }

    // Record the result of a match in a conference or a promotion playoff.
    pub fn score(&mut self, conference_id: ConferenceId, id: MatchId, score: Score) -> Result<(), ScheduleError> {
        match conference_id {
            ConferenceId::Group(n) => {
                if self.phase != DivisionPhase::GroupStage {
                    return Err(self.wrong_phase("score group matches"));
                }
                let conference = self.conferences.iter_mut()
                    .find(|c| c.id == n)
                    .ok_or(ScheduleError::NoSuchMatch(id))?;
                conference.schedule.score(id, score)
            },
            ConferenceId::Promotion(n) => {
                if self.phase != DivisionPhase::PostSeason {
                    return Err(self.wrong_phase("score playoff matches"));
                }
                let conference = self.promotion_conferences.iter_mut()
                    .find(|c| c.id == n)
                    .ok_or(ScheduleError::NoSuchMatch(id))?;
                conference.bracket.score(id, score)
            },
        }
    }
}
