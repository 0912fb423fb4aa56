// Round robin group stages.
use serde::{Deserialize, Serialize};

use crate::logic::{
    competition::{ranking::{self, RankCriteria}, Match, MatchId, MatchQuery, RecordedScore, Standing},
    error::ScheduleError,
    types::{Score, Seed},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct RoundRobinOptions {
    // Maximum size of a group. 0 puts everyone in the same group.
    pub group_size: usize,

    // How many times each pair meets. Every other cycle swaps home and away.
    pub meetings: u32,

    pub points_for_win: u32,
    pub points_for_draw: u32,
    pub points_for_loss: u32,
}

impl Default for RoundRobinOptions {
    fn default() -> Self {
        RoundRobinOptions {
            group_size: 0,
            meetings: 1,
            points_for_win: 3,
            points_for_draw: 1,
            points_for_loss: 0,
        }
    }
}

impl RoundRobinOptions {
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_meetings(mut self, meetings: u32) -> Self {
        self.meetings = meetings;
        self
    }

    // Points for a result from the perspective of one side.
    fn points(&self, own: u32, other: u32) -> u32 {
        if own > other {
            return self.points_for_win;
        }
        if own < other {
            return self.points_for_loss;
        }
        return self.points_for_draw;
    }
}

// Everything needed to rebuild a round robin.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct RoundRobinState {
    pub num_players: usize,
    #[serde(default)]
    pub options: RoundRobinOptions,
    #[serde(default = "RankCriteria::default_order")]
    pub rank_criteria: Vec<RankCriteria>,
    #[serde(default)]
    pub scores: Vec<RecordedScore>,
}

#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(into = "RoundRobinState", try_from = "RoundRobinState")]
pub struct RoundRobin {
    num_players: usize,
    options: RoundRobinOptions,
    rank_criteria: Vec<RankCriteria>,
    groups: Vec<Vec<Seed>>,

    // Sorted by round, then group, then game.
    matches: Vec<Match>,
    round_count: u32,
}

// Basics.
impl RoundRobin {
    // Build the schedule for seeds 1..=num_players.
    pub fn new(num_players: usize, options: RoundRobinOptions) -> Result<Self, ScheduleError> {
        if num_players < 2 {
            return Err(ScheduleError::TooFewCompetitors(num_players));
        }
        if options.meetings == 0 {
            return Err(ScheduleError::InvalidOptions("pairs must meet at least once".to_string()));
        }
        if options.group_size == 1 {
            return Err(ScheduleError::InvalidOptions("groups must have room for two".to_string()));
        }

        let group_size = match options.group_size {
            0 => num_players,
            n => n.min(num_players),
        };
        let groups = serpentine_groups(num_players, num_players.div_ceil(group_size));

        let mut matches = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            matches.extend(group_matches(i as u32 + 1, group, options.meetings));
        }
        matches.sort_by_key(|m| (m.id.round, m.id.stage, m.id.game));
        let round_count = matches.iter().map(|m| m.id.round).max().unwrap_or(0);

        return Ok(RoundRobin {
            num_players,
            options,
            rank_criteria: RankCriteria::default_order(),
            groups,
            matches,
            round_count,
        });
    }

    // Use other ranking criteria than the default ones.
    pub fn with_rank_criteria(mut self, criteria: Vec<RankCriteria>) -> Self {
        self.rank_criteria = criteria;
        self
    }

    pub fn num_players(&self) -> usize {
        self.num_players
    }

    pub fn options(&self) -> &RoundRobinOptions {
        &self.options
    }

    pub fn groups(&self) -> &[Vec<Seed>] {
        &self.groups
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    // Group number (1-based) of a seed.
    pub fn group_of(&self, seed: Seed) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(&seed)).map(|i| i + 1)
    }
}

// Functional.
impl RoundRobin {
    // Iterate over the rounds in order. Every call starts from the first round.
    pub fn rounds(&self) -> impl Iterator<Item = Vec<&Match>> + '_ {
        (1..=self.round_count).map(move |r| self.round(r))
    }

    // Get the matches of a round.
    pub fn round(&self, round: u32) -> Vec<&Match> {
        self.find_matches(MatchQuery::round(round))
    }

    // The first round that still has unscored matches.
    pub fn current_round(&self) -> Option<u32> {
        self.matches.iter().find(|m| !m.is_scored()).map(|m| m.id.round)
    }

    pub fn find(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn find_matches(&self, query: MatchQuery) -> Vec<&Match> {
        self.matches.iter().filter(|m| query.matches(&m.id)).collect()
    }

    // Record the result of a match.
    pub fn score(&mut self, id: MatchId, score: Score) -> Result<(), ScheduleError> {
        let game = self.matches.iter_mut()
            .find(|m| m.id == id)
            .ok_or(ScheduleError::NoSuchMatch(id))?;

        if game.is_scored() {
            return Err(ScheduleError::AlreadyScored(id));
        }
        game.result = Some(score);
        return Ok(());
    }

    pub fn is_done(&self) -> bool {
        self.matches.iter().all(Match::is_scored)
    }

    // Get the standings of every seed, best first.
    // Everyone is first ranked within their group, then the groups are interleaved by group position.
    pub fn results(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = Vec::with_capacity(self.num_players);
        for seed in 1..=self.num_players {
            standings.push(Standing::build(seed, self.group_of(seed).unwrap_or(0)));
        }

        for game in self.matches.iter() {
            let ([Some(home), Some(away)], Some([home_score, away_score])) = (game.participants, game.result) else {
                continue;
            };
            standings[home - 1].record(home_score, away_score);
            standings[home - 1].points += self.options.points(home_score, away_score);
            standings[away - 1].record(away_score, home_score);
            standings[away - 1].points += self.options.points(away_score, home_score);
        }

        for group in self.groups.iter() {
            let mut members: Vec<Standing> = group.iter().map(|seed| standings[seed - 1].clone()).collect();
            ranking::sort_standings(&mut members, &self.rank_criteria);
            for (i, member) in members.iter().enumerate() {
                standings[member.seed - 1].group_position = i + 1;
            }
        }

        standings.sort_by(|a, b| {
            a.group_position.cmp(&b.group_position)
                .then_with(|| ranking::compare(a, b, &self.rank_criteria))
        });
        for (i, standing) in standings.iter_mut().enumerate() {
            standing.position = i + 1;
        }
        return standings;
    }

    // Get the standing of a single seed.
    pub fn results_for(&self, seed: Seed) -> Option<Standing> {
        self.results().into_iter().find(|s| s.seed == seed)
    }

    // Snapshot of the schedule.
    pub fn save(&self) -> RoundRobinState {
        RoundRobinState {
            num_players: self.num_players,
            options: self.options,
            rank_criteria: self.rank_criteria.clone(),
            scores: self.matches.iter()
                .filter_map(|m| m.result.map(|score| RecordedScore { id: m.id, score }))
                .collect(),
        }
    }

    // Rebuild the schedule from a snapshot.
    // The recorded results go straight into the generated matches.
    pub fn restore(state: RoundRobinState) -> Result<Self, ScheduleError> {
        let mut rr = Self::new(state.num_players, state.options)?
            .with_rank_criteria(state.rank_criteria);
        for recorded in state.scores.iter() {
            let game = rr.matches.iter_mut()
                .find(|m| m.id == recorded.id)
                .ok_or(ScheduleError::NoSuchMatch(recorded.id))?;
            if game.result.replace(recorded.score).is_some() {
                return Err(ScheduleError::AlreadyScored(recorded.id));
            }
        }
        return Ok(rr);
    }
}

impl From<RoundRobin> for RoundRobinState {
    fn from(rr: RoundRobin) -> Self {
        rr.save()
    }
}

impl TryFrom<RoundRobinState> for RoundRobin {
    type Error = ScheduleError;

    fn try_from(state: RoundRobinState) -> Result<Self, Self::Error> {
        Self::restore(state)
    }
}

// Deal seeds into groups back and forth so that the group sizes differ by one at most.
fn serpentine_groups(num_players: usize, group_count: usize) -> Vec<Vec<Seed>> {
    let mut groups = vec![Vec::new(); group_count];
    for i in 0..num_players {
        let pass = i / group_count;
        let index = i % group_count;
        let group = if pass % 2 == 0 { index } else { group_count - 1 - index };
        groups[group].push(i + 1);
    }
    return groups;
}

// Generate the matches of a single group with the circle method.
fn group_matches(stage: u32, members: &[Seed], meetings: u32) -> Vec<Match> {
    let mut slots: Vec<Option<Seed>> = members.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let slot_count = slots.len();
    if slot_count < 2 {
        return Vec::new();
    }

    // Pairings of a single cycle, as (round index, [home, away]).
    let rounds_per_cycle = slot_count - 1;
    let mut pairings = Vec::new();
    for round in 0..rounds_per_cycle {
        for i in 0..slot_count / 2 {
            if let (Some(a), Some(b)) = (slots[i], slots[slot_count - 1 - i]) {
                // The fixed slot alternates between home and away.
                let pair = if i == 0 && round % 2 == 1 { [b, a] } else { [a, b] };
                pairings.push((round, pair));
            }
        }
        slots[1..].rotate_right(1);
    }

    let mut matches = Vec::new();
    for cycle in 0..meetings {
        let mut game = 0;
        let mut previous_round = None;
        for (round, [home, away]) in pairings.iter().copied() {
            if previous_round != Some(round) {
                game = 0;
                previous_round = Some(round);
            }
            game += 1;

            let round_number = cycle * rounds_per_cycle as u32 + round as u32 + 1;
            let id = MatchId::build(stage, round_number, game);
            let fixture = match cycle % 2 {
                0 => Match::build(id, Some(home), Some(away)),
                _ => Match::build(id, Some(away), Some(home)),
            };
            matches.push(fixture);
        }
    }
    return matches;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn options(group_size: usize, meetings: u32) -> RoundRobinOptions {
        RoundRobinOptions::default().with_group_size(group_size).with_meetings(meetings)
    }

    // Count how many times each unordered pair meets.
    fn pair_counts(rr: &RoundRobin) -> HashMap<(Seed, Seed), u32> {
        let mut counts = HashMap::new();
        for game in rr.matches() {
            let [Some(a), Some(b)] = game.participants else { panic!("empty slot in {}", game.id) };
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn every_pair_meets_once() {
        for n in 2..=11 {
            let rr = RoundRobin::new(n, RoundRobinOptions::default()).unwrap();
            let counts = pair_counts(&rr);
            assert_eq!(counts.len(), n * (n - 1) / 2);
            assert!(counts.values().all(|c| *c == 1));

            let expected_rounds = if n % 2 == 0 { n - 1 } else { n };
            assert_eq!(rr.round_count() as usize, expected_rounds);
        }
    }

    #[test]
    fn nobody_plays_twice_in_a_round() {
        let rr = RoundRobin::new(9, RoundRobinOptions::default()).unwrap();
        for round in rr.rounds() {
            let mut seen = Vec::new();
            for game in round {
                for seed in game.participants.iter().flatten() {
                    assert!(!seen.contains(seed));
                    seen.push(*seed);
                }
            }
        }
    }

    #[test]
    fn double_meetings_swap_home_and_away() {
        let rr = RoundRobin::new(6, options(0, 2)).unwrap();
        assert_eq!(rr.round_count(), 10);

        let mut home_away = HashMap::new();
        for game in rr.matches() {
            let [Some(home), Some(away)] = game.participants else { panic!() };
            *home_away.entry((home, away)).or_insert(0) += 1;
        }
        assert_eq!(home_away.len(), 30);
        assert!(home_away.values().all(|c| *c == 1));
    }

    #[test]
    fn groups_are_balanced_serpentine() {
        let rr = RoundRobin::new(10, options(4, 1)).unwrap();
        assert_eq!(rr.groups(), &[vec![1, 6, 7], vec![2, 5, 8], vec![3, 4, 9, 10]]);

        let counts = pair_counts(&rr);
        assert_eq!(counts.len(), 3 + 3 + 6);
        assert_eq!(rr.group_of(9), Some(3));
    }

    #[test]
    fn invalid_options() {
        assert_eq!(RoundRobin::new(1, RoundRobinOptions::default()), Err(ScheduleError::TooFewCompetitors(1)));
        assert!(RoundRobin::new(4, options(1, 1)).is_err());
        assert!(RoundRobin::new(4, options(0, 0)).is_err());
    }

    #[test]
    fn scoring_progresses_the_rounds() {
        let mut rr = RoundRobin::new(4, RoundRobinOptions::default()).unwrap();
        assert_eq!(rr.current_round(), Some(1));

        let ids: Vec<MatchId> = rr.round(1).iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 2);
        for id in ids.iter() {
            rr.score(*id, [2, 1]).unwrap();
        }
        assert_eq!(rr.current_round(), Some(2));
        assert!(!rr.is_done());

        assert_eq!(rr.score(ids[0], [0, 0]), Err(ScheduleError::AlreadyScored(ids[0])));
        assert_eq!(rr.find(ids[0]).unwrap().result, Some([2, 1]));

        let missing = MatchId::build(1, 9, 1);
        assert_eq!(rr.score(missing, [1, 0]), Err(ScheduleError::NoSuchMatch(missing)));

        let rest: Vec<MatchId> = rr.matches().iter().filter(|m| !m.is_scored()).map(|m| m.id).collect();
        for id in rest {
            rr.score(id, [1, 1]).unwrap();
        }
        assert!(rr.is_done());
        assert_eq!(rr.current_round(), None);
    }

    #[test]
    fn results_rank_by_points() {
        let mut rr = RoundRobin::new(3, RoundRobinOptions::default()).unwrap();
        let ids: Vec<(MatchId, [Option<Seed>; 2])> = rr.matches().iter().map(|m| (m.id, m.participants)).collect();
        for (id, [home, away]) in ids {
            // The higher seed always wins.
            let score = if home > away { [3, 0] } else { [0, 3] };
            rr.score(id, score).unwrap();
        }

        let results = rr.results();
        let order: Vec<Seed> = results.iter().map(|s| s.seed).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(results[0].points, 6);
        assert_eq!(results[0].position, 1);
        assert_eq!(results[2].losses, 2);
        assert_eq!(rr.results_for(2).unwrap().position, 2);
    }

    #[test]
    fn positions_interleave_groups() {
        let rr = RoundRobin::new(8, options(4, 1)).unwrap();
        let results = rr.results();
        let group_positions: Vec<usize> = results.iter().map(|s| s.group_position).collect();
        assert_eq!(group_positions, vec![1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn save_and_restore() {
        let mut rr = RoundRobin::new(7, options(4, 2)).unwrap();
        let ids: Vec<MatchId> = rr.matches().iter().take(5).map(|m| m.id).collect();
        for (i, id) in ids.iter().enumerate() {
            rr.score(*id, [i as u32, 1]).unwrap();
        }

        let restored = RoundRobin::restore(rr.save()).unwrap();
        assert_eq!(restored, rr);
        assert_eq!(restored.results(), rr.results());

        let json = serde_json::to_string(&rr).unwrap();
        let from_json: RoundRobin = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json, rr);
    }

    #[test]
    fn restore_rejects_inconsistent_state() {
        let mut state = RoundRobin::new(4, RoundRobinOptions::default()).unwrap().save();
        state.scores.push(RecordedScore { id: MatchId::build(3, 1, 1), score: [1, 0] });
        assert!(RoundRobin::restore(state).is_err());

        let json = r#"{"num_players": 1}"#;
        assert!(serde_json::from_str::<RoundRobin>(json).is_err());

        let mut state = RoundRobin::new(4, RoundRobinOptions::default()).unwrap().save();
        let first = MatchId::build(1, 1, 1);
        state.scores = vec![RecordedScore { id: first, score: [1, 0] }, RecordedScore { id: first, score: [0, 1] }];
        assert_eq!(RoundRobin::restore(state), Err(ScheduleError::AlreadyScored(first)));
    }

    #[test]
    fn restore_takes_results_in_any_order() {
        let mut rr = RoundRobin::new(6, options(0, 1)).unwrap();
        let ids: Vec<MatchId> = rr.matches().iter().map(|m| m.id).collect();
        for (i, id) in ids.iter().enumerate() {
            rr.score(*id, [i as u32 % 3, 1]).unwrap();
        }

        let mut state = rr.save();
        state.scores.reverse();
        let restored = RoundRobin::restore(state).unwrap();
        assert_eq!(restored, rr);
        assert!(restored.is_done());
    }
}
