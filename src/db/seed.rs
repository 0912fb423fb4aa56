// The starting world: a three-tier league, a cup and one transfer target.
use log::info;
use time::Duration;

use crate::logic::{
    calendar::action::ActionQueueEntry,
    competition::{
        cup::Cup, division::Division, league::League, round_robin::RoundRobinOptions, Competition,
    },
    competitor::Competitor,
    config::EngineConfig,
    error::{EngineError, EngineResult},
    storage::Storage,
    transfer::{Player, TransferOffer},
    types::CompetitorId,
};

const TEAM_NAMES: [&str; 16] = [
    "Ruiske", "Atomi", "Uupuneet", "SantaClaus", "HardCore", "Ikirouta", "Kelarotat", "Vety",
    "Saappaat", "Siat", "Turmio", "Sirkus", "Polkka", "Teurastus", "Myrsky", "Routa",
];

// Division name, size, conference size, promotion percent.
const DIVISIONS: [(&str, usize, usize, f64); 3] = [
    ("Premier", 8, 8, 0.0),
    ("Challenger", 32, 8, 0.15),
    ("Open", 64, 8, 0.15),
];

const CUP_SIZE: usize = 24;

// Give every team a unique name, cycling through the list with a number.
fn team_name(id: CompetitorId) -> String {
    let index = (id as usize - 1) % TEAM_NAMES.len();
    let round = (id as usize - 1) / TEAM_NAMES.len();
    match round {
        0 => TEAM_NAMES[index].to_string(),
        _ => format!("{} {}", TEAM_NAMES[index], round + 1),
    }
}

fn build_league() -> EngineResult<(League, Vec<Competitor>)> {
    let mut divisions = Vec::with_capacity(DIVISIONS.len());
    let mut everyone = Vec::new();
    let mut next_id: CompetitorId = 1;

    for (tier, (name, size, conference_size, promotion_percent)) in DIVISIONS.iter().enumerate() {
        let competitors: Vec<Competitor> = (next_id..next_id + *size as CompetitorId)
            .map(|id| Competitor::build(id, &team_name(id)).with_tier(tier as u8 + 1))
            .collect();
        next_id += *size as CompetitorId;

        let mut division = Division::build(name, *size, *conference_size, *promotion_percent)
            .with_group_options(RoundRobinOptions::default().with_meetings(2));
        division.populate(competitors.clone())?;
        everyone.extend(competitors);
        divisions.push(division);
    }

    let league = League::build("Esports League", divisions);
    league.validate()?;
    return Ok((league, everyone));
}

// Fill an empty storage. Returns false if there was something there already.
pub async fn initialise(storage: &dyn Storage, config: &EngineConfig) -> EngineResult<bool> {
    if !storage.competition_ids().await?.is_empty() {
        info!("Found an existing world, not seeding");
        return Ok(false);
    }

    let (league, competitors) = build_league()?;
    let mut league = Competition::League(league);
    let league_id = storage.insert_competition(&mut league).await?;

    let cup_competitors: Vec<Competitor> = competitors.iter().take(CUP_SIZE).cloned().collect();
    let mut cup = Competition::Cup(Cup::build("Open Cup", cup_competitors)?);
    let cup_id = storage.insert_competition(&mut cup).await?;

    // One player on the move, to exercise the transfer desk.
    let buyer = config.user_competitor_id.unwrap_or(1);
    let seller = competitors.iter().map(|c| c.id).find(|id| *id != buyer)
        .ok_or_else(|| EngineError::InvalidState("no team to sell a player".to_string()))?;
    let mut player = Player::build("kaapo", Some(seller), 50_000);
    storage.insert_player(&mut player).await?;
    let mut offer = TransferOffer::build(&player, buyer, 45_000);
    let offer_id = storage.insert_offer(&mut offer).await?;

    let response_date = config.start_date.checked_add(Duration::days(2))
        .ok_or_else(|| EngineError::InvalidState(format!("no date after {}", config.start_date)))?;
    storage.insert_actions(&[
        ActionQueueEntry::competition_start(league_id, config.start_date),
        ActionQueueEntry::competition_start(cup_id, config.start_date),
        ActionQueueEntry::offer_response(offer_id, None, response_date),
    ]).await?;

    info!("Seeded {} competitors into {} and {}", competitors.len(), league.name(), cup.name());
    return Ok(true);
}
