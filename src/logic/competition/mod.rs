// Competitions, their schedulers and the shared match types.
pub mod cup;
pub mod division;
pub mod elimination;
pub mod league;
pub mod ranking;
pub mod round_robin;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::{cup::Cup, division::{ConferenceId, DivisionPhase}, elimination::Elimination, league::League, round_robin::RoundRobin},
    competitor::{Competitor, CompetitorRegistry},
    error::{EngineError, EngineResult, ScheduleError},
    types::{CompetitionId, Score, Seed},
};

// Unique within a scheduler.
#[derive(Debug, Clone, Copy, Default)]
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub struct MatchId {
    pub stage: u32,
    pub round: u32,
    pub game: u32,
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.stage, self.round, self.game)
    }
}

impl MatchId {
    pub fn build(stage: u32, round: u32, game: u32) -> Self {
        MatchId { stage, round, game }
    }
}

// Partial match lookup. Fields left as None match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchQuery {
    pub stage: Option<u32>,
    pub round: Option<u32>,
    pub game: Option<u32>,
}

impl MatchQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn round(round: u32) -> Self {
        MatchQuery { round: Some(round), ..Default::default() }
    }

    pub fn stage(stage: u32) -> Self {
        MatchQuery { stage: Some(stage), ..Default::default() }
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn matches(&self, id: &MatchId) -> bool {
        self.stage.is_none_or(|s| s == id.stage) &&
        self.round.is_none_or(|r| r == id.round) &&
        self.game.is_none_or(|g| g == id.game)
    }
}

// A single meeting of two seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub participants: [Option<Seed>; 2],
    pub result: Option<Score>,
}

impl Match {
    pub fn build(id: MatchId, home: Option<Seed>, away: Option<Seed>) -> Self {
        Match { id, participants: [home, away], result: None }
    }

    pub fn is_scored(&self) -> bool {
        self.result.is_some()
    }

    // A first round bracket slot with nobody in it. The other participant advances without playing.
    pub fn is_bye(&self) -> bool {
        self.id.round == 1 && self.participants.iter().filter(|p| p.is_some()).count() == 1
    }

    // Scored or a bye.
    pub fn is_resolved(&self) -> bool {
        self.is_scored() || self.is_bye()
    }

    // Both participants are known.
    pub fn is_ready(&self) -> bool {
        self.participants.iter().all(Option::is_some)
    }

    pub fn has_participant(&self, seed: Seed) -> bool {
        self.participants.contains(&Some(seed))
    }

    // Get the winner. None for draws and unresolved matches.
    pub fn winner(&self) -> Option<Seed> {
        if self.is_bye() {
            return self.participants.iter().flatten().next().copied();
        }
        let [home, away] = self.result?;
        if home > away {
            return self.participants[0];
        }
        if away > home {
            return self.participants[1];
        }
        return None;
    }

    // Get the loser. None for draws, byes and unresolved matches.
    pub fn loser(&self) -> Option<Seed> {
        if self.is_bye() {
            return None;
        }
        let [home, away] = self.result?;
        if home > away {
            return self.participants[1];
        }
        if away > home {
            return self.participants[0];
        }
        return None;
    }
}

// A result as stored in a scheduler snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct RecordedScore {
    pub id: MatchId,
    pub score: Score,
}

// How a seed is doing in a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Standing {
    pub seed: Seed,
    pub position: usize,
    pub group: usize,
    pub group_position: usize,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub score_for: u32,
    pub score_against: u32,
    pub points: u32,
}

impl Standing {
    pub fn build(seed: Seed, group: usize) -> Self {
        Standing { seed, group, ..Default::default() }
    }

    pub fn score_difference(&self) -> i64 {
        i64::from(self.score_for) - i64::from(self.score_against)
    }

    // Add a played match to the stats. Points are handled by the scheduler.
    pub fn record(&mut self, own: u32, other: u32) {
        self.played += 1;
        self.score_for += own;
        self.score_against += other;
        if own > other {
            self.wins += 1;
        }
        else if own < other {
            self.losses += 1;
        }
        else {
            self.draws += 1;
        }
    }
}

// Which scheduler a match lives in.
#[derive(Debug, Clone, Copy)]
pub enum Schedule<'a> {
    Groups(&'a RoundRobin),
    Bracket(&'a Elimination),
}

impl<'a> Schedule<'a> {
    pub fn find(&self, id: MatchId) -> Option<&'a Match> {
        match self {
            Schedule::Groups(rr) => rr.find(id),
            Schedule::Bracket(bracket) => bracket.find(id),
        }
    }

    pub fn find_matches(&self, query: MatchQuery) -> Vec<&'a Match> {
        match self {
            Schedule::Groups(rr) => rr.find_matches(query),
            Schedule::Bracket(bracket) => bracket.find_matches(query),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            Schedule::Groups(rr) => rr.is_done(),
            Schedule::Bracket(bracket) => bracket.is_done(),
        }
    }
}

// A match with its participants resolved to competitors.
#[derive(Debug, Clone)]
pub struct Fixture<'a> {
    pub game: &'a Match,
    pub home: &'a Competitor,
    pub away: &'a Competitor,
    pub allow_draw: bool,
}

// Where a match is found inside a competition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct MatchLocation {
    pub division_name: Option<String>,
    pub conference_id: Option<ConferenceId>,
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Competition {
    League(League),
    Cup(Cup),
}

// Basics.
impl Competition {
    pub fn id(&self) -> CompetitionId {
        match self {
            Competition::League(league) => league.id,
            Competition::Cup(cup) => cup.id,
        }
    }

    pub fn set_id(&mut self, id: CompetitionId) {
        match self {
            Competition::League(league) => league.id = id,
            Competition::Cup(cup) => cup.id = id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Competition::League(league) => &league.name,
            Competition::Cup(cup) => &cup.name,
        }
    }

    pub fn season(&self) -> u32 {
        match self {
            Competition::League(league) => league.season,
            Competition::Cup(cup) => cup.season,
        }
    }

    pub fn is_started(&self) -> bool {
        match self {
            Competition::League(league) => league.divisions.iter().any(|d| d.phase >= DivisionPhase::GroupStage),
            Competition::Cup(cup) => cup.bracket.is_some(),
        }
    }

    // Snapshot for storage.
    pub fn save(&self) -> EngineResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    // Rebuild from a snapshot, rejecting snapshots that are not internally consistent.
    pub fn restore(value: serde_json::Value) -> EngineResult<Self> {
        let competition: Competition = serde_json::from_value(value)?;
        match &competition {
            Competition::League(league) => league.validate()?,
            Competition::Cup(cup) => cup.validate()?,
        }
        return Ok(competition);
    }
}

// Functional.
impl Competition {
    // Find the scheduler and the competitors a match location points to.
    pub fn locate(&self, location: &MatchLocation) -> EngineResult<(Schedule<'_>, &CompetitorRegistry)> {
        match self {
            Competition::Cup(cup) => {
                let bracket = cup.bracket.as_ref().ok_or(ScheduleError::NotStarted)?;
                Ok((Schedule::Bracket(bracket), &cup.competitors))
            },
            Competition::League(league) => {
                let division_name = location.division_name.as_deref()
                    .ok_or_else(|| EngineError::InvalidState(format!("{} needs a division for matches", league.name)))?;
                let division = league.division(division_name)
                    .ok_or_else(|| EngineError::InvalidState(format!("{} has no division {division_name}", league.name)))?;

                match location.conference_id {
                    Some(ConferenceId::Group(id)) => {
                        let conference = division.conference(id)
                            .ok_or_else(|| EngineError::InvalidState(format!("{division_name} has no conference {id}")))?;
                        Ok((Schedule::Groups(&conference.schedule), &conference.competitors))
                    },
                    Some(ConferenceId::Promotion(id)) => {
                        let conference = division.promotion_conference(id)
                            .ok_or_else(|| EngineError::InvalidState(format!("{division_name} has no promotion conference {id}")))?;
                        Ok((Schedule::Bracket(&conference.bracket), &conference.competitors))
                    },
                    None => Err(EngineError::InvalidState(format!("{division_name} needs a conference for matches"))),
                }
            },
        }
    }

    // Get a match with its competitors.
    pub fn fixture(&self, location: &MatchLocation, id: MatchId) -> EngineResult<Fixture<'_>> {
        let (schedule, competitors) = self.locate(location)?;
        let game = schedule.find(id).ok_or(ScheduleError::NoSuchMatch(id))?;
        let [home, away] = match game.participants {
            [Some(home), Some(away)] => [home, away],
            _ => return Err(ScheduleError::NotReady(id).into()),
        };

        let competitor = |seed: Seed| competitors.by_seed(seed)
            .ok_or_else(|| EngineError::InvalidSnapshot(format!("seed {seed} of match {id} has no competitor")));

        return Ok(Fixture {
            game,
            home: competitor(home)?,
            away: competitor(away)?,
            allow_draw: matches!(schedule, Schedule::Groups(_)),
        });
    }

    // Record a result in the scheduler the location points to.
    pub fn score(&mut self, location: &MatchLocation, id: MatchId, score: Score) -> EngineResult<()> {
        match self {
            Competition::Cup(cup) => cup.score(id, score)?,
            Competition::League(league) => {
                let division_name = location.division_name.as_deref()
                    .ok_or_else(|| EngineError::InvalidState(format!("{} needs a division for matches", league.name)))?;
                let conference_id = location.conference_id
                    .ok_or_else(|| EngineError::InvalidState(format!("{division_name} needs a conference for matches")))?;
                let division = league.division_mut(division_name)
                    .ok_or_else(|| EngineError::InvalidState(format!("no division {division_name}")))?;
                division.score(conference_id, id, score)?;
            },
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matching() {
        let id = MatchId::build(1, 3, 2);
        assert!(MatchQuery::all().matches(&id));
        assert!(MatchQuery::round(3).matches(&id));
        assert!(!MatchQuery::round(2).matches(&id));
        assert!(MatchQuery::stage(1).with_round(3).matches(&id));
        assert!(!MatchQuery { game: Some(1), ..Default::default() }.matches(&id));
    }

    #[test]
    fn winners_and_losers() {
        let mut game = Match::build(MatchId::build(1, 2, 1), Some(1), Some(4));
        assert_eq!(game.winner(), None);
        game.result = Some([1, 2]);
        assert_eq!(game.winner(), Some(4));
        assert_eq!(game.loser(), Some(1));

        game.result = Some([1, 1]);
        assert_eq!(game.winner(), None);
        assert_eq!(game.loser(), None);

        let bye = Match::build(MatchId::build(1, 1, 1), Some(1), None);
        assert!(bye.is_bye());
        assert!(bye.is_resolved());
        assert_eq!(bye.winner(), Some(1));
        assert_eq!(bye.loser(), None);

        let waiting = Match::build(MatchId::build(1, 2, 1), Some(1), None);
        assert!(!waiting.is_bye());
        assert!(!waiting.is_ready());
    }

    #[test]
    fn standing_records() {
        let mut standing = Standing::build(3, 1);
        standing.record(2, 0);
        standing.record(1, 1);
        standing.record(0, 2);
        assert_eq!((standing.played, standing.wins, standing.draws, standing.losses), (3, 1, 1, 1));
        assert_eq!(standing.score_difference(), 0);
    }
}
