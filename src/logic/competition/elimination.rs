// Single elimination brackets.
use ordinal::ToOrdinal as _;
use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::{Match, MatchId, MatchQuery, RecordedScore, Standing},
    error::ScheduleError,
    types::{Score, Seed},
};

// Stage of the main bracket and of the third place decider.
pub const MAIN_STAGE: u32 = 1;
pub const BRONZE_STAGE: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct EliminationOptions {
    // Short brackets have no third place decider.
    pub short: bool,
}

impl EliminationOptions {
    pub fn short() -> Self {
        EliminationOptions { short: true }
    }
}

// Everything needed to rebuild a bracket.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct EliminationState {
    pub num_players: usize,
    #[serde(default)]
    pub options: EliminationOptions,
    #[serde(default)]
    pub scores: Vec<RecordedScore>,
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(into = "EliminationState", try_from = "EliminationState")]
pub struct Elimination {
    num_players: usize,
    options: EliminationOptions,

    // Bracket size, the smallest power of two that fits everyone.
    size: usize,
    round_count: u32,

    // Sorted by round, then stage, then game.
    matches: Vec<Match>,
}

// Basics.
impl Elimination {
    pub fn new(num_players: usize, options: EliminationOptions) -> Result<Self, ScheduleError> {
        if num_players == 0 {
            return Err(ScheduleError::TooFewCompetitors(num_players));
        }

        let size = num_players.next_power_of_two();
        let round_count = size.trailing_zeros();
        let mut matches = Vec::new();

        // First round, with the slots of missing seeds left empty.
        if size >= 2 {
            let slot = |seed: Seed| (seed <= num_players).then_some(seed);
            for (i, pair) in seed_positions(size).chunks(2).enumerate() {
                let id = MatchId::build(MAIN_STAGE, 1, i as u32 + 1);
                matches.push(Match::build(id, slot(pair[0]), slot(pair[1])));
            }
        }

        // Later rounds are filled as the bracket progresses.
        for round in 2..=round_count {
            for game in 1..=(size >> round) {
                matches.push(Match::build(MatchId::build(MAIN_STAGE, round, game as u32), None, None));
            }
        }

        if !options.short && num_players >= 4 {
            matches.push(Match::build(MatchId::build(BRONZE_STAGE, round_count, 1), None, None));
        }

        let mut bracket = Elimination { num_players, options, size, round_count, matches };
        let byes: Vec<usize> = bracket.matches.iter()
            .enumerate()
            .filter(|(_, m)| m.is_bye())
            .map(|(i, _)| i)
            .collect();
        for i in byes {
            bracket.advance(i);
        }
        return Ok(bracket);
    }

    pub fn num_players(&self) -> usize {
        self.num_players
    }

    pub fn options(&self) -> &EliminationOptions {
        &self.options
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn bye_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_bye()).count()
    }

    fn index_of(&self, id: MatchId) -> Option<usize> {
        self.matches.iter().position(|m| m.id == id)
    }

    fn final_id(&self) -> MatchId {
        MatchId::build(MAIN_STAGE, self.round_count, 1)
    }

    fn bronze_id(&self) -> MatchId {
        MatchId::build(BRONZE_STAGE, self.round_count, 1)
    }
}

// Functional.
impl Elimination {
    // Iterate over the rounds in order. Every call starts from the first round.
    pub fn rounds(&self) -> impl Iterator<Item = Vec<&Match>> + '_ {
        (1..=self.round_count).map(move |r| self.round(r))
    }

    pub fn round(&self, round: u32) -> Vec<&Match> {
        self.find_matches(MatchQuery::round(round))
    }

    // The first round with matches still to be played.
    pub fn current_round(&self) -> Option<u32> {
        self.matches.iter().find(|m| !m.is_resolved()).map(|m| m.id.round)
    }

    pub fn find(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn find_matches(&self, query: MatchQuery) -> Vec<&Match> {
        self.matches.iter().filter(|m| query.matches(&m.id)).collect()
    }

    // Check whether every match of the query has been resolved.
    pub fn matches_done(&self, query: MatchQuery) -> bool {
        self.matches.iter()
            .filter(|m| query.matches(&m.id))
            .all(Match::is_resolved)
    }

    // Record the result of a match and move the winner on.
    pub fn score(&mut self, id: MatchId, score: Score) -> Result<(), ScheduleError> {
        let index = self.index_of(id).ok_or(ScheduleError::NoSuchMatch(id))?;
        let game = &self.matches[index];

        if game.is_resolved() {
            return Err(ScheduleError::AlreadyScored(id));
        }
        if !game.is_ready() {
            return Err(ScheduleError::NotReady(id));
        }
        if score[0] == score[1] {
            return Err(ScheduleError::DrawNotAllowed(id));
        }

        self.matches[index].result = Some(score);
        self.advance(index);
        return Ok(());
    }

    // Put the winner of a resolved match into the next round.
    // Semi final losers go to the third place decider if there is one.
    fn advance(&mut self, index: usize) {
        let game = &self.matches[index];
        let id = game.id;
        if id.stage != MAIN_STAGE || id.round >= self.round_count {
            return;
        }

        let (winner, loser) = (game.winner(), game.loser());
        let slot = ((id.game - 1) % 2) as usize;

        let next = MatchId::build(MAIN_STAGE, id.round + 1, id.game.div_ceil(2));
        if let (Some(winner), Some(next)) = (winner, self.index_of(next)) {
            self.matches[next].participants[slot] = Some(winner);
        }

        if id.round + 1 == self.round_count {
            if let (Some(loser), Some(bronze)) = (loser, self.index_of(self.bronze_id())) {
                self.matches[bronze].participants[slot] = Some(loser);
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.matches.iter().all(Match::is_resolved)
    }

    // Get the champion, once the final has been played.
    pub fn winner(&self) -> Option<Seed> {
        if self.round_count == 0 {
            return Some(1);
        }
        self.find(self.final_id()).and_then(Match::winner)
    }

    // Position shared by everyone who went out in (or is still alive in) the given round.
    fn round_position(&self, round: u32) -> usize {
        (1usize << self.round_count.saturating_sub(round)) + 1
    }

    // Get the placements of every seed, best first.
    pub fn results(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = (1..=self.num_players).map(|s| Standing::build(s, 1)).collect();
        let mut reached = vec![1u32; self.num_players];

        for game in self.matches.iter() {
            if game.id.stage == MAIN_STAGE {
                for seed in game.participants.iter().flatten() {
                    reached[seed - 1] = reached[seed - 1].max(game.id.round);
                }
            }
            if let ([Some(home), Some(away)], Some([home_score, away_score])) = (game.participants, game.result) {
                standings[home - 1].record(home_score, away_score);
                standings[away - 1].record(away_score, home_score);
            }
        }

        for standing in standings.iter_mut() {
            standing.position = self.round_position(reached[standing.seed - 1]);
        }
        if let Some(champion) = self.winner() {
            standings[champion - 1].position = 1;
        }
        if let Some(bronze) = self.find(self.bronze_id()) {
            if let (Some(third), Some(fourth)) = (bronze.winner(), bronze.loser()) {
                standings[third - 1].position = 3;
                standings[fourth - 1].position = 4;
            }
        }

        for standing in standings.iter_mut() {
            standing.group_position = standing.position;
        }
        standings.sort_by_key(|s| (s.position, s.seed));
        return standings;
    }

    pub fn results_for(&self, seed: Seed) -> Option<Standing> {
        self.results().into_iter().find(|s| s.seed == seed)
    }

    // Get the display name of a round.
    pub fn round_name(&self, round: u32) -> String {
        let rounds_left = (self.round_count + 1).saturating_sub(round);
        match rounds_left {
            1 => "Final".to_string(),
            2 => "Semi Final".to_string(),
            3 => "Quarter Final".to_string(),
            _ => format!("{} Round", (round as usize).to_ordinal_string()),
        }
    }

    pub fn save(&self) -> EliminationState {
        EliminationState {
            num_players: self.num_players,
            options: self.options,
            scores: self.matches.iter()
                .filter_map(|m| m.result.map(|score| RecordedScore { id: m.id, score }))
                .collect(),
        }
    }

    // Rebuild the bracket from a snapshot.
    // The results go into their matches first, then the winners are moved on round by round.
    pub fn restore(state: EliminationState) -> Result<Self, ScheduleError> {
        let mut bracket = Self::new(state.num_players, state.options)?;
        for recorded in state.scores.iter() {
            let index = bracket.index_of(recorded.id).ok_or(ScheduleError::NoSuchMatch(recorded.id))?;
            if recorded.score[0] == recorded.score[1] {
                return Err(ScheduleError::DrawNotAllowed(recorded.id));
            }
            if bracket.matches[index].result.replace(recorded.score).is_some() {
                return Err(ScheduleError::AlreadyScored(recorded.id));
            }
        }

        // Matches are sorted by round, so every match is filled before it is looked at.
        for index in 0..bracket.matches.len() {
            let game = &bracket.matches[index];
            if !game.is_scored() {
                continue;
            }
            if !game.is_ready() {
                return Err(ScheduleError::NotReady(game.id));
            }
            bracket.advance(index);
        }
        return Ok(bracket);
    }
}

impl From<Elimination> for EliminationState {
    fn from(bracket: Elimination) -> Self {
        bracket.save()
    }
}

impl TryFrom<EliminationState> for Elimination {
    type Error = ScheduleError;

    fn try_from(state: EliminationState) -> Result<Self, Self::Error> {
        Self::restore(state)
    }
}

// Standard bracket order: 1 v 8, 4 v 5, 2 v 7, 3 v 6 and so on.
fn seed_positions(size: usize) -> Vec<Seed> {
    let mut seeds = vec![1];
    while seeds.len() < size {
        let n = seeds.len();
        let mut next = Vec::with_capacity(n * 2);
        for seed in seeds.iter().copied() {
            next.push(seed);
            next.push(n * 2 + 1 - seed);
        }
        seeds = next;
    }
    return seeds;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Play every ready match, the lower seed winning.
    fn play_out(bracket: &mut Elimination) {
        while let Some(round) = bracket.current_round() {
            let games: Vec<(MatchId, [Option<Seed>; 2])> = bracket.round(round).iter()
                .filter(|m| !m.is_resolved())
                .map(|m| (m.id, m.participants))
                .collect();
            for (id, [home, away]) in games {
                let score = if home < away { [2, 0] } else { [0, 2] };
                bracket.score(id, score).unwrap();
            }
        }
    }

    #[test]
    fn standard_seeding() {
        assert_eq!(seed_positions(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
        assert_eq!(seed_positions(2), vec![1, 2]);
    }

    #[test]
    fn five_players_get_three_byes() {
        let bracket = Elimination::new(5, EliminationOptions::short()).unwrap();
        assert_eq!(bracket.size(), 8);
        assert_eq!(bracket.round_count(), 3);
        assert_eq!(bracket.bye_count(), 3);

        // Only 4 v 5 is played in the first round, the top seeds wait in round two.
        let round_one: Vec<&Match> = bracket.round(1).into_iter().filter(|m| !m.is_bye()).collect();
        assert_eq!(round_one.len(), 1);
        assert_eq!(round_one[0].participants, [Some(4), Some(5)]);
        assert_eq!(bracket.round(2)[1].participants, [Some(2), Some(3)]);
        assert_eq!(bracket.round(2)[0].participants, [Some(1), None]);
    }

    #[test]
    fn round_counts() {
        for (n, rounds) in [(1, 0), (2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4), (16, 4), (17, 5)] {
            assert_eq!(Elimination::new(n, EliminationOptions::default()).unwrap().round_count(), rounds);
        }
        assert!(Elimination::new(0, EliminationOptions::default()).is_err());
    }

    #[test]
    fn single_player_wins_without_playing() {
        let bracket = Elimination::new(1, EliminationOptions::default()).unwrap();
        assert!(bracket.is_done());
        assert_eq!(bracket.winner(), Some(1));
        assert_eq!(bracket.results()[0].position, 1);
    }

    #[test]
    fn draws_and_unready_matches_are_rejected() {
        let mut bracket = Elimination::new(4, EliminationOptions::short()).unwrap();
        let first = MatchId::build(MAIN_STAGE, 1, 1);
        assert_eq!(bracket.score(first, [1, 1]), Err(ScheduleError::DrawNotAllowed(first)));
        assert!(!bracket.find(first).unwrap().is_scored());

        let final_id = MatchId::build(MAIN_STAGE, 2, 1);
        assert_eq!(bracket.score(final_id, [1, 0]), Err(ScheduleError::NotReady(final_id)));

        bracket.score(first, [3, 1]).unwrap();
        assert_eq!(bracket.score(first, [3, 1]), Err(ScheduleError::AlreadyScored(first)));
        assert_eq!(bracket.find(final_id).unwrap().participants, [Some(1), None]);
    }

    #[test]
    fn byes_cannot_be_scored() {
        let mut bracket = Elimination::new(3, EliminationOptions::short()).unwrap();
        let bye = MatchId::build(MAIN_STAGE, 1, 1);
        assert!(bracket.find(bye).unwrap().is_bye());
        assert_eq!(bracket.score(bye, [1, 0]), Err(ScheduleError::AlreadyScored(bye)));
    }

    #[test]
    fn full_bracket_with_bronze() {
        let mut bracket = Elimination::new(8, EliminationOptions::default()).unwrap();
        assert!(bracket.find(MatchId::build(BRONZE_STAGE, 3, 1)).is_some());
        play_out(&mut bracket);
        assert!(bracket.is_done());
        assert_eq!(bracket.winner(), Some(1));

        let positions: Vec<(Seed, usize)> = bracket.results().iter().map(|s| (s.seed, s.position)).collect();
        assert_eq!(positions, vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 5), (7, 5), (8, 5)]);
    }

    #[test]
    fn short_bracket_shares_third() {
        let mut bracket = Elimination::new(6, EliminationOptions::short()).unwrap();
        assert!(bracket.find(MatchId::build(BRONZE_STAGE, 3, 1)).is_none());
        play_out(&mut bracket);

        let results = bracket.results();
        assert_eq!(results.iter().filter(|s| s.position == 1).count(), 1);
        assert_eq!(results.iter().filter(|s| s.position == 3).count(), 2);
        assert_eq!(results.iter().filter(|s| s.position == 5).count(), 2);
    }

    #[test]
    fn alive_players_share_their_round_position() {
        let mut bracket = Elimination::new(4, EliminationOptions::short()).unwrap();
        bracket.score(MatchId::build(MAIN_STAGE, 1, 1), [2, 0]).unwrap();

        let results = bracket.results();
        assert_eq!(bracket.results_for(1).unwrap().position, 2);
        assert_eq!(bracket.results_for(4).unwrap().position, 3);
        assert_eq!(bracket.results_for(2).unwrap().position, 3);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn round_names() {
        let bracket = Elimination::new(20, EliminationOptions::default()).unwrap();
        assert_eq!(bracket.round_name(1), "1st Round");
        assert_eq!(bracket.round_name(2), "2nd Round");
        assert_eq!(bracket.round_name(3), "Quarter Final");
        assert_eq!(bracket.round_name(4), "Semi Final");
        assert_eq!(bracket.round_name(5), "Final");
    }

    #[test]
    fn save_and_restore() {
        let mut bracket = Elimination::new(7, EliminationOptions::default()).unwrap();
        bracket.score(MatchId::build(MAIN_STAGE, 1, 2), [1, 3]).unwrap();
        bracket.score(MatchId::build(MAIN_STAGE, 1, 3), [4, 3]).unwrap();

        let restored = Elimination::restore(bracket.save()).unwrap();
        assert_eq!(restored, bracket);

        let json = serde_json::to_string(&bracket).unwrap();
        let from_json: Elimination = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json.results(), bracket.results());

        let mut state = bracket.save();
        state.scores.push(RecordedScore { id: MatchId::build(MAIN_STAGE, 3, 1), score: [1, 0] });
        assert!(Elimination::restore(state).is_err());
    }

    #[test]
    fn restore_takes_results_in_any_order() {
        let mut bracket = Elimination::new(6, EliminationOptions::default()).unwrap();
        play_out(&mut bracket);
        assert!(bracket.is_done());

        let mut state = bracket.save();
        state.scores.reverse();
        let restored = Elimination::restore(state).unwrap();
        assert_eq!(restored, bracket);
        assert_eq!(restored.winner(), Some(1));
        assert_eq!(restored.results(), bracket.results());
    }

    #[test]
    fn restore_rejects_results_that_cannot_have_happened() {
        // Seed 1 has a bye, so their first round match was never played.
        let bye = RecordedScore { id: MatchId::build(MAIN_STAGE, 1, 1), score: [1, 0] };
        let state = EliminationState { num_players: 7, options: EliminationOptions::short(), scores: vec![bye] };
        assert_eq!(Elimination::restore(state), Err(ScheduleError::NotReady(MatchId::build(MAIN_STAGE, 1, 1))));

        let draw = RecordedScore { id: MatchId::build(MAIN_STAGE, 1, 2), score: [1, 1] };
        let state = EliminationState { num_players: 7, options: EliminationOptions::short(), scores: vec![draw] };
        assert_eq!(Elimination::restore(state), Err(ScheduleError::DrawNotAllowed(MatchId::build(MAIN_STAGE, 1, 2))));

        let twice = RecordedScore { id: MatchId::build(MAIN_STAGE, 1, 2), score: [2, 1] };
        let state = EliminationState { num_players: 7, options: EliminationOptions::short(), scores: vec![twice, twice] };
        assert_eq!(Elimination::restore(state), Err(ScheduleError::AlreadyScored(MatchId::build(MAIN_STAGE, 1, 2))));
    }
}
