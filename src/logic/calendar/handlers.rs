// Handlers that resolve the entries of the action queue.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use time::{Date, Duration};

use crate::logic::{
    calendar::{
        action::{ActionPayload, ActionQueueEntry, ActionType, MatchdayPayload},
        notify::Notification,
        outcome::MatchOutcomeGenerator,
    },
    competition::{
        cup::Cup, division::ConferenceId, elimination::Elimination, league::League,
        Competition, Match, MatchLocation, MatchQuery, Schedule,
    },
    competitor::CompetitorRegistry,
    config::EngineConfig,
    email::Email,
    error::{EngineError, EngineResult},
    storage::{DayChanges, Storage},
    time::matchday_in_week,
    transfer::{OfferResponse, OfferStatus, Player, TransferOffer},
    types::{ActionId, CompetitionId, EmailId, OfferId, PlayerId},
};

// What became of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,

    // The player has to play this one. The day cannot end before they do.
    AwaitingUser,
}

// Changes made while resolving entries, written when the day is committed.
#[derive(Debug, Default)]
struct Staged {
    competitions: BTreeMap<CompetitionId, Competition>,
    offers: BTreeMap<OfferId, TransferOffer>,
    players: BTreeMap<PlayerId, Player>,
    emails: BTreeMap<EmailId, Email>,
    new_emails: Vec<(Email, Date)>,
    new_actions: Vec<ActionQueueEntry>,
    notifications: Vec<Notification>,
}

impl Staged {
    // Take over the changes of a later entry.
    fn absorb(&mut self, later: Staged) {
        self.competitions.extend(later.competitions);
        self.offers.extend(later.offers);
        self.players.extend(later.players);
        self.emails.extend(later.emails);
        self.new_emails.extend(later.new_emails);
        self.new_actions.extend(later.new_actions);
        self.notifications.extend(later.notifications);
    }
}

// Everything a handler may use during a day.
// Reads see what earlier entries of the day changed. Nothing is written before the day is committed.
pub struct DayContext<'a> {
    pub today: Date,
    pub outcome: &'a dyn MatchOutcomeGenerator,
    pub config: &'a EngineConfig,
    pub rng: &'a mut StdRng,
    storage: &'a dyn Storage,

    // Changes of the entries resolved so far, and of the one being resolved.
    day: Staged,
    entry: Staged,
}

impl<'a> DayContext<'a> {
    pub fn build(today: Date, storage: &'a dyn Storage, outcome: &'a dyn MatchOutcomeGenerator, config: &'a EngineConfig, rng: &'a mut StdRng) -> Self {
        DayContext {
            today,
            outcome,
            config,
            rng,
            storage,
            day: Staged::default(),
            entry: Staged::default(),
        }
    }

    pub async fn competition(&self, id: CompetitionId) -> EngineResult<Competition> {
        match self.entry.competitions.get(&id).or_else(|| self.day.competitions.get(&id)) {
            Some(competition) => Ok(competition.clone()),
            None => self.storage.competition(id).await,
        }
    }

    pub fn save_competition(&mut self, competition: Competition) {
        self.entry.competitions.insert(competition.id(), competition);
    }

    pub async fn offer(&self, id: OfferId) -> EngineResult<TransferOffer> {
        match self.entry.offers.get(&id).or_else(|| self.day.offers.get(&id)) {
            Some(offer) => Ok(offer.clone()),
            None => self.storage.offer(id).await,
        }
    }

    pub fn save_offer(&mut self, offer: TransferOffer) {
        self.entry.offers.insert(offer.id, offer);
    }

    pub async fn player(&self, id: PlayerId) -> EngineResult<Player> {
        match self.entry.players.get(&id).or_else(|| self.day.players.get(&id)) {
            Some(player) => Ok(player.clone()),
            None => self.storage.player(id).await,
        }
    }

    pub fn save_player(&mut self, player: Player) {
        self.entry.players.insert(player.id, player);
    }

    pub async fn email(&self, id: EmailId) -> EngineResult<Email> {
        match self.entry.emails.get(&id).or_else(|| self.day.emails.get(&id)) {
            Some(email) => Ok(email.clone()),
            None => self.storage.email(id).await,
        }
    }

    pub fn save_email(&mut self, email: Email) {
        self.entry.emails.insert(email.id, email);
    }

    // Store a new email and queue its delivery.
    pub fn send_email(&mut self, email: Email, delivery: Date) {
        self.entry.new_emails.push((email, delivery));
    }

    pub fn schedule(&mut self, entry: ActionQueueEntry) {
        self.entry.new_actions.push(entry);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.entry.notifications.push(notification);
    }

    // Keep the changes of the entry just resolved.
    pub fn finish_entry(&mut self) {
        let entry = std::mem::take(&mut self.entry);
        self.day.absorb(entry);
    }

    // Forget the changes of an entry that failed.
    pub fn discard_entry(&mut self) {
        self.entry = Staged::default();
    }

    // Everything the finished entries changed, and the notifications to send once it is written.
    pub fn into_changes(self, completed: Vec<ActionId>, today: Option<Date>) -> (DayChanges, Vec<Notification>) {
        let day = self.day;
        let changes = DayChanges {
            competitions: day.competitions.into_values().collect(),
            offers: day.offers.into_values().collect(),
            players: day.players.into_values().collect(),
            emails: day.emails.into_values().collect(),
            new_emails: day.new_emails,
            new_actions: day.new_actions,
            completed,
            today,
        };
        return (changes, day.notifications);
    }

    // The date a number of days from today. At least tomorrow.
    pub fn days_from_today(&self, days: u32) -> EngineResult<Date> {
        self.today.checked_add(Duration::days(i64::from(days.max(1))))
            .ok_or_else(|| EngineError::InvalidState(format!("no date {days} days after {}", self.today)))
    }

    pub fn tomorrow(&self) -> EngineResult<Date> {
        self.days_from_today(1)
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution>;
}

// Maps every action type to its handler. Built once at startup.
pub struct HandlerTable {
    handlers: HashMap<ActionType, Box<dyn ActionHandler>>,
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerTable {
    // A table with no handlers at all.
    pub fn empty() -> Self {
        HandlerTable { handlers: HashMap::new() }
    }

    // A table with the built-in handler of every action type.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(ActionType::CompetitionStart, CompetitionStartHandler)
            .with(ActionType::MatchdayUser, MatchdayUserHandler)
            .with(ActionType::MatchdayNpc, MatchdayNpcHandler)
            .with(ActionType::EmailDelivery, EmailDeliveryHandler)
            .with(ActionType::TransferOfferResponse, TransferOfferResponseHandler)
            .with(ActionType::TransferFinalize, TransferFinalizeHandler)
            .with(ActionType::SeasonCheck, SeasonCheckHandler)
    }

    // Set the handler of an action type, replacing any earlier one.
    pub fn with<H: ActionHandler + 'static>(mut self, action_type: ActionType, handler: H) -> Self {
        self.handlers.insert(action_type, Box::new(handler));
        self
    }

    pub fn get(&self, action_type: ActionType) -> Option<&dyn ActionHandler> {
        self.handlers.get(&action_type).map(|h| h.as_ref())
    }
}

fn wrong_payload(entry: &ActionQueueEntry) -> EngineError {
    EngineError::InvalidAction {
        id: entry.id,
        reason: format!("{:?} payload for a {:?} action", entry.payload, entry.action_type),
    }
}

fn matchday_payload(entry: &ActionQueueEntry) -> EngineResult<&MatchdayPayload> {
    match &entry.payload {
        ActionPayload::Matchday(payload) => Ok(payload),
        _ => Err(wrong_payload(entry)),
    }
}

// Whether the player's competitor takes part in a match.
fn is_user_match(config: &EngineConfig, competitors: &CompetitorRegistry, game: &Match) -> bool {
    let Some(user) = config.user_competitor_id else {
        return false;
    };
    game.participants.iter()
        .flatten()
        .filter_map(|seed| competitors.by_seed(*seed))
        .any(|c| c.id == user)
}

// Queue a matchday entry for every given match.
fn schedule_matches(ctx: &mut DayContext<'_>, competition_id: CompetitionId, location: &MatchLocation, competitors: &CompetitorRegistry, matches: &[&Match], date: Date) -> usize {
    for game in matches.iter() {
        let payload = MatchdayPayload {
            competition_id,
            division_name: location.division_name.clone(),
            conference_id: location.conference_id,
            match_id: game.id,
        };
        let user = is_user_match(ctx.config, competitors, game);
        ctx.schedule(ActionQueueEntry::matchday(user, date, payload));
    }
    return matches.len();
}

// Queue the playable matches of a bracket round for next week.
fn schedule_bracket_round(ctx: &mut DayContext<'_>, competition_id: CompetitionId, location: &MatchLocation, competitors: &CompetitorRegistry, bracket: &Elimination, round: u32) -> usize {
    let matches: Vec<&Match> = bracket.round(round).into_iter()
        .filter(|m| m.is_ready() && !m.is_resolved())
        .collect();
    if matches.is_empty() {
        return 0;
    }

    let date = matchday_in_week(ctx.rng, ctx.today, 1, &ctx.config.match_weekdays);
    debug!("{} scheduled on {date}", bracket.round_name(round));
    return schedule_matches(ctx, competition_id, location, competitors, &matches, date);
}

// Queue every group stage match of a league, one date per round, and the first round of a cup.
fn schedule_season(ctx: &mut DayContext<'_>, competition: &Competition) -> usize {
    let id = competition.id();
    match competition {
        Competition::League(league) => {
            let round_count = league.divisions.iter()
                .flat_map(|d| d.conferences.iter())
                .map(|c| c.schedule.round_count())
                .max()
                .unwrap_or(0);
            let dates: Vec<Date> = (1..=round_count)
                .map(|week| matchday_in_week(ctx.rng, ctx.today, week, &ctx.config.match_weekdays))
                .collect();

            let mut scheduled = 0;
            for division in league.divisions.iter() {
                for conference in division.conferences.iter() {
                    let location = MatchLocation {
                        division_name: Some(division.name.clone()),
                        conference_id: Some(ConferenceId::Group(conference.id)),
                    };
                    for (round, date) in conference.schedule.rounds().zip(dates.iter()) {
                        scheduled += schedule_matches(ctx, id, &location, &conference.competitors, &round, *date);
                    }
                }
            }
            scheduled
        },
        Competition::Cup(cup) => match cup.bracket.as_ref() {
            Some(bracket) => schedule_bracket_round(ctx, id, &MatchLocation::default(), &cup.competitors, bracket, 1),
            None => 0,
        },
    }
}

// Queue the first round of every promotion playoff of a league.
fn schedule_post_season(ctx: &mut DayContext<'_>, league: &League) -> usize {
    let mut scheduled = 0;
    for division in league.divisions.iter() {
        for conference in division.promotion_conferences.iter() {
            let location = MatchLocation {
                division_name: Some(division.name.clone()),
                conference_id: Some(ConferenceId::Promotion(conference.id)),
            };
            scheduled += schedule_bracket_round(ctx, league.id, &location, &conference.competitors, &conference.bracket, 1);
        }
    }
    return scheduled;
}

// After a match has been scored: queue the next bracket round if this one is over,
// and a season check if a whole stage of the competition is over.
pub fn follow_up(ctx: &mut DayContext<'_>, competition: &Competition, payload: &MatchdayPayload) -> EngineResult<()> {
    let location = payload.location();
    let (schedule, competitors) = competition.locate(&location)?;
    if let Schedule::Bracket(bracket) = schedule {
        let round = payload.match_id.round;
        if bracket.matches_done(MatchQuery::round(round)) && !bracket.is_done() {
            schedule_bracket_round(ctx, payload.competition_id, &location, competitors, bracket, round + 1);
        }
    }

    let stage_over = match competition {
        Competition::League(league) => {
            (league.is_group_stage_done() && !league.is_post_season_started()) ||
            (league.is_post_season_started() && league.is_done() && !league.is_over())
        },
        Competition::Cup(cup) => cup.is_done(),
    };
    if stage_over && schedule.is_done() {
        ctx.schedule(ActionQueueEntry::season_check(payload.competition_id, ctx.tomorrow()?));
    }
    return Ok(());
}

// Starts a competition and queues its matches.
pub struct CompetitionStartHandler;

#[async_trait]
impl ActionHandler for CompetitionStartHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let ActionPayload::CompetitionStart { competition_id } = &entry.payload else {
            return Err(wrong_payload(entry));
        };

        let mut competition = ctx.competition(*competition_id).await?;
        if competition.is_started() {
            warn!("{} has already started", competition.name());
            return Ok(Resolution::Resolved);
        }

        match &mut competition {
            Competition::League(league) => league.start(ctx.rng)?,
            Competition::Cup(cup) => cup.start(ctx.rng)?,
        }

        let scheduled = schedule_season(ctx, &competition);
        if scheduled == 0 {
            ctx.schedule(ActionQueueEntry::season_check(competition.id(), ctx.tomorrow()?));
        }
        info!("{} season {} starts with {scheduled} matches", competition.name(), competition.season());
        ctx.save_competition(competition);
        return Ok(Resolution::Resolved);
    }
}

// Leaves the player's matches for them to play.
pub struct MatchdayUserHandler;

#[async_trait]
impl ActionHandler for MatchdayUserHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let payload = matchday_payload(entry)?;
        let competition = ctx.competition(payload.competition_id).await?;
        let fixture = competition.fixture(&payload.location(), payload.match_id)?;
        if fixture.game.is_resolved() {
            return Ok(Resolution::Resolved);
        }

        info!("Waiting for the player: {} v {}", fixture.home.name, fixture.away.name);
        return Ok(Resolution::AwaitingUser);
    }
}

// Plays matches between computer-controlled competitors.
pub struct MatchdayNpcHandler;

#[async_trait]
impl ActionHandler for MatchdayNpcHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let payload = matchday_payload(entry)?;
        let location = payload.location();
        let mut competition = ctx.competition(payload.competition_id).await?;

        let (home_tier, away_tier, allow_draw) = {
            let fixture = competition.fixture(&location, payload.match_id)?;
            if fixture.game.is_resolved() {
                debug!("{} {} was already played", competition.name(), payload.match_id);
                return Ok(Resolution::Resolved);
            }
            (fixture.home.tier, fixture.away.tier, fixture.allow_draw && ctx.config.allow_group_draws)
        };

        let score = ctx.outcome.generate(home_tier, away_tier, allow_draw).await?;
        competition.score(&location, payload.match_id, score)?;
        follow_up(ctx, &competition, payload)?;
        ctx.save_competition(competition);
        return Ok(Resolution::Resolved);
    }
}

// Puts emails into the inbox.
pub struct EmailDeliveryHandler;

#[async_trait]
impl ActionHandler for EmailDeliveryHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let ActionPayload::Email { email_id } = &entry.payload else {
            return Err(wrong_payload(entry));
        };

        let mut email = ctx.email(*email_id).await?;
        if email.deliver() {
            ctx.notify(Notification::NewEmail { email_id: email.id });
            ctx.save_email(email);
        }
        return Ok(Resolution::Resolved);
    }
}

// Answers transfer offers.
pub struct TransferOfferResponseHandler;

#[async_trait]
impl ActionHandler for TransferOfferResponseHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let ActionPayload::TransferOfferResponse { offer_id, response } = &entry.payload else {
            return Err(wrong_payload(entry));
        };

        let mut offer = ctx.offer(*offer_id).await?;
        if offer.status != OfferStatus::Pending {
            debug!("Offer {} was already answered", offer.id);
            return Ok(Resolution::Resolved);
        }

        let player = ctx.player(offer.player_id).await?;
        let response = match response {
            Some(r) => *r,
            None => offer.evaluate(&player, ctx.rng),
        };
        offer.respond(response)?;

        let subject = match response {
            OfferResponse::Accept => format!("Offer for {} accepted", player.name),
            OfferResponse::Reject => format!("Offer for {} rejected", player.name),
        };
        let email = Email::build("Transfers", &subject, "", ctx.today);
        ctx.send_email(email, ctx.tomorrow()?);

        if response == OfferResponse::Accept {
            let date = ctx.days_from_today(ctx.config.transfer_finalize_days)?;
            ctx.schedule(ActionQueueEntry::transfer_finalize(offer.id, date));
        }
        ctx.save_offer(offer);
        info!("{subject}");
        return Ok(Resolution::Resolved);
    }
}

// Moves players whose transfer has been agreed.
pub struct TransferFinalizeHandler;

#[async_trait]
impl ActionHandler for TransferFinalizeHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let ActionPayload::TransferFinalize { offer_id } = &entry.payload else {
            return Err(wrong_payload(entry));
        };

        let mut offer = ctx.offer(*offer_id).await?;
        if offer.status == OfferStatus::Finalized {
            return Ok(Resolution::Resolved);
        }

        let mut player = ctx.player(offer.player_id).await?;
        offer.finalize(&mut player)?;
        info!("{} moved from {:?} to {}", player.name, offer.from_team, offer.to_team);
        ctx.save_player(player);
        ctx.save_offer(offer);
        return Ok(Resolution::Resolved);
    }
}

// Moves competitions from one stage to the next.
pub struct SeasonCheckHandler;

impl SeasonCheckHandler {
    async fn check_league(&self, ctx: &mut DayContext<'_>, mut league: League) -> EngineResult<Resolution> {
        if league.is_group_stage_done() && !league.is_post_season_started() {
            league.start_post_season()?;
            let scheduled = schedule_post_season(ctx, &league);

            // With no playoffs to play the post-season is over right away.
            if scheduled == 0 {
                ctx.schedule(ActionQueueEntry::season_check(league.id, ctx.tomorrow()?));
            }
            info!("{}: post-season starts with {scheduled} matches", league.name);
            ctx.save_competition(Competition::League(league));
            return Ok(Resolution::Resolved);
        }

        if league.is_post_season_started() && league.is_done() && !league.is_over() {
            league.end_post_season()?;
            league.end()?;
            for division in league.divisions.iter() {
                info!("{}: {} promoted, {} relegated", division.name, division.promoted().len(), division.relegation_bottomfeeders.len());
            }
            if let Some(champion) = league.divisions.first().and_then(|d| d.conference_winners.first()) {
                info!("{} season {} champion: {}", league.name, league.season, champion.name);
            }

            let next = league.next_season()?;
            ctx.save_competition(Competition::League(next));
            let date = ctx.days_from_today(ctx.config.off_season_days)?;
            ctx.schedule(ActionQueueEntry::competition_start(league.id, date));
            return Ok(Resolution::Resolved);
        }

        debug!("{}: nothing to do in the season check", league.name);
        return Ok(Resolution::Resolved);
    }

    async fn check_cup(&self, ctx: &mut DayContext<'_>, cup: Cup) -> EngineResult<Resolution> {
        if !cup.is_done() {
            debug!("{}: nothing to do in the season check", cup.name);
            return Ok(Resolution::Resolved);
        }

        if let Some(winner) = cup.winner() {
            info!("{} season {} won by {}", cup.name, cup.season, winner.name);
            let subject = format!("{} won the {}", winner.name, cup.name);
            let email = Email::build(&cup.name, &subject, "", ctx.today);
            ctx.send_email(email, ctx.tomorrow()?);
        }

        ctx.save_competition(Competition::Cup(cup.next_season()));
        let date = ctx.days_from_today(ctx.config.off_season_days)?;
        ctx.schedule(ActionQueueEntry::competition_start(cup.id, date));
        return Ok(Resolution::Resolved);
    }
}

#[async_trait]
impl ActionHandler for SeasonCheckHandler {
    async fn handle(&self, ctx: &mut DayContext<'_>, entry: &ActionQueueEntry) -> EngineResult<Resolution> {
        let ActionPayload::SeasonCheck { competition_id } = &entry.payload else {
            return Err(wrong_payload(entry));
        };

        match ctx.competition(*competition_id).await? {
            Competition::League(league) => self.check_league(ctx, league).await,
            Competition::Cup(cup) => self.check_cup(ctx, cup).await,
        }
    }
}
