use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use season_engine::logic::{
    competition::{
        elimination::{Elimination, EliminationOptions},
        round_robin::{RoundRobin, RoundRobinOptions},
        MatchId, MatchQuery,
    },
    types::Seed,
};

// Play out a bracket with the lower seed always winning.
fn play_bracket(bracket: &mut Elimination) {
    loop {
        let playable: Vec<_> = bracket.matches().iter()
            .filter(|m| m.is_ready() && !m.is_resolved())
            .map(|m| (m.id, m.participants))
            .collect();
        if playable.is_empty() {
            break;
        }
        for (id, participants) in playable {
            let score = if participants[0] < participants[1] { [2, 0] } else { [0, 2] };
            bracket.score(id, score).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn every_pair_meets_the_right_number_of_times(n in 2usize..20, meetings in 1u32..4) {
        let mut rr = RoundRobin::new(n, RoundRobinOptions::default().with_meetings(meetings)).unwrap();
        let mut meets: HashMap<(Seed, Seed), u32> = HashMap::new();
        for game in rr.matches() {
            let [Some(home), Some(away)] = game.participants else {
                panic!("round robin match {} has an empty slot", game.id);
            };
            *meets.entry((home.min(away), home.max(away))).or_default() += 1;
        }

        prop_assert_eq!(meets.len(), n * (n - 1) / 2);
        prop_assert!(meets.values().all(|m| *m == meetings));

        // Not done until the very last match has a result.
        let ids: Vec<MatchId> = rr.matches().iter().map(|m| m.id).collect();
        let (last, rest) = ids.split_last().unwrap();
        for id in rest {
            rr.score(*id, [1, 0]).unwrap();
            prop_assert!(!rr.is_done());
        }
        rr.score(*last, [1, 1]).unwrap();
        prop_assert!(rr.is_done());
    }

    #[test]
    fn nobody_plays_twice_in_a_round(n in 2usize..20, group_size in prop_oneof![Just(0usize), 2usize..8]) {
        let rr = RoundRobin::new(n, RoundRobinOptions::default().with_group_size(group_size)).unwrap();
        for round in rr.rounds() {
            let mut seen = HashSet::new();
            for game in round {
                for seed in game.participants.iter().flatten() {
                    prop_assert!(seen.insert(*seed));
                }
            }
        }
    }

    #[test]
    fn brackets_have_one_champion(n in 1usize..70, short in any::<bool>()) {
        let options = match short {
            true => EliminationOptions::short(),
            false => EliminationOptions::default(),
        };
        let mut bracket = Elimination::new(n, options).unwrap();
        let expected_rounds = n.next_power_of_two().trailing_zeros();
        prop_assert_eq!(bracket.round_count(), expected_rounds);
        prop_assert_eq!(bracket.bye_count(), if n > 1 { n.next_power_of_two() - n } else { 0 });

        play_bracket(&mut bracket);
        prop_assert!(bracket.is_done());
        prop_assert!(bracket.matches_done(MatchQuery::all()));
        prop_assert_eq!(bracket.winner(), Some(1));

        let results = bracket.results();
        prop_assert_eq!(results.len(), n);
        prop_assert_eq!(results.iter().filter(|s| s.position == 1).count(), 1);
        prop_assert_eq!(results[0].seed, 1);
    }
}
