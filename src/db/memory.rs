// Storage that lives in memory, for tests and throwaway runs.
use std::collections::BTreeMap;

use async_trait::async_trait;
use time::Date;
use tokio::sync::Mutex;

use crate::logic::{
    calendar::action::ActionQueueEntry,
    competition::Competition,
    email::Email,
    error::{EngineError, EngineResult},
    storage::{DayChanges, Storage},
    transfer::{Player, TransferOffer},
    types::{ActionId, CompetitionId, EmailId, OfferId, PlayerId},
};

#[derive(Debug, Default)]
struct Tables {
    today: Option<Date>,
    actions: BTreeMap<ActionId, ActionQueueEntry>,

    // Kept as snapshots, so that loading goes through the same checks as the database.
    competitions: BTreeMap<CompetitionId, serde_json::Value>,
    emails: BTreeMap<EmailId, Email>,
    offers: BTreeMap<OfferId, TransferOffer>,
    players: BTreeMap<PlayerId, Player>,
}

// IDs start from 1, like in the database.
fn next_id<T>(map: &BTreeMap<u32, T>) -> u32 {
    map.keys().next_back().map_or(1, |id| id + 1)
}

impl Tables {
    fn insert_action(&mut self, entry: &ActionQueueEntry) -> ActionId {
        let id = next_id(&self.actions);
        let mut entry = entry.clone();
        entry.id = id;
        self.actions.insert(id, entry);
        return id;
    }

    fn check_exists<T>(map: &BTreeMap<u32, T>, kind: &'static str, id: u32) -> EngineResult<()> {
        match map.contains_key(&id) {
            true => Ok(()),
            false => Err(EngineError::not_found(kind, id)),
        }
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(start_date: Date) -> Self {
        MemoryStore {
            tables: Mutex::new(Tables { today: Some(start_date), ..Default::default() }),
        }
    }

    // Every entry in the queue, completed or not.
    pub async fn actions(&self) -> Vec<ActionQueueEntry> {
        self.tables.lock().await.actions.values().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn today(&self) -> EngineResult<Date> {
        self.tables.lock().await.today
            .ok_or_else(|| EngineError::InvalidState("no current date".to_string()))
    }

    async fn set_today(&self, today: Date) -> EngineResult<()> {
        self.tables.lock().await.today = Some(today);
        return Ok(());
    }

    async fn due_actions(&self, today: Date) -> EngineResult<Vec<ActionQueueEntry>> {
        let tables = self.tables.lock().await;
        let mut due: Vec<ActionQueueEntry> = tables.actions.values()
            .filter(|e| e.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|e| (e.action_date, e.id));
        return Ok(due);
    }

    async fn insert_actions(&self, entries: &[ActionQueueEntry]) -> EngineResult<Vec<ActionId>> {
        for entry in entries.iter() {
            entry.validate()?;
        }

        let mut tables = self.tables.lock().await;
        return Ok(entries.iter().map(|entry| tables.insert_action(entry)).collect());
    }

    async fn action(&self, id: ActionId) -> EngineResult<ActionQueueEntry> {
        self.tables.lock().await.actions.get(&id).cloned()
            .ok_or_else(|| EngineError::not_found("action", id))
    }

    async fn mark_completed(&self, ids: &[ActionId]) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(id) = ids.iter().find(|id| !tables.actions.contains_key(*id)) {
            return Err(EngineError::not_found("action", *id));
        }
        for id in ids.iter() {
            if let Some(entry) = tables.actions.get_mut(id) {
                entry.completed = true;
            }
        }
        return Ok(());
    }

    async fn competition_ids(&self) -> EngineResult<Vec<CompetitionId>> {
        Ok(self.tables.lock().await.competitions.keys().copied().collect())
    }

    async fn competition(&self, id: CompetitionId) -> EngineResult<Competition> {
        let snapshot = self.tables.lock().await.competitions.get(&id).cloned()
            .ok_or_else(|| EngineError::not_found("competition", id))?;
        let mut competition = Competition::restore(snapshot)?;
        competition.set_id(id);
        return Ok(competition);
    }

    async fn insert_competition(&self, competition: &mut Competition) -> EngineResult<CompetitionId> {
        let mut tables = self.tables.lock().await;
        let id = next_id(&tables.competitions);
        competition.set_id(id);
        tables.competitions.insert(id, competition.save()?);
        return Ok(id);
    }

    async fn save_competition(&self, competition: &Competition) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;
        let snapshot = tables.competitions.get_mut(&competition.id())
            .ok_or_else(|| EngineError::not_found("competition", competition.id()))?;
        *snapshot = competition.save()?;
        return Ok(());
    }

    async fn email(&self, id: EmailId) -> EngineResult<Email> {
        self.tables.lock().await.emails.get(&id).cloned()
            .ok_or_else(|| EngineError::not_found("email", id))
    }

    async fn insert_email(&self, email: &mut Email) -> EngineResult<EmailId> {
        let mut tables = self.tables.lock().await;
        email.id = next_id(&tables.emails);
        tables.emails.insert(email.id, email.clone());
        return Ok(email.id);
    }

    async fn save_email(&self, email: &Email) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables.emails.get_mut(&email.id)
            .ok_or_else(|| EngineError::not_found("email", email.id))?;
        *stored = email.clone();
        return Ok(());
    }

    async fn offer(&self, id: OfferId) -> EngineResult<TransferOffer> {
        self.tables.lock().await.offers.get(&id).cloned()
            .ok_or_else(|| EngineError::not_found("transfer offer", id))
    }

    async fn insert_offer(&self, offer: &mut TransferOffer) -> EngineResult<OfferId> {
        let mut tables = self.tables.lock().await;
        offer.id = next_id(&tables.offers);
        tables.offers.insert(offer.id, offer.clone());
        return Ok(offer.id);
    }

    async fn save_offer(&self, offer: &TransferOffer) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables.offers.get_mut(&offer.id)
            .ok_or_else(|| EngineError::not_found("transfer offer", offer.id))?;
        *stored = offer.clone();
        return Ok(());
    }

    async fn player(&self, id: PlayerId) -> EngineResult<Player> {
        self.tables.lock().await.players.get(&id).cloned()
            .ok_or_else(|| EngineError::not_found("player", id))
    }

    async fn insert_player(&self, player: &mut Player) -> EngineResult<PlayerId> {
        let mut tables = self.tables.lock().await;
        player.id = next_id(&tables.players);
        tables.players.insert(player.id, player.clone());
        return Ok(player.id);
    }

    async fn save_player(&self, player: &Player) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables.players.get_mut(&player.id)
            .ok_or_else(|| EngineError::not_found("player", player.id))?;
        *stored = player.clone();
        return Ok(());
    }

    async fn commit_changes(&self, changes: DayChanges) -> EngineResult<()> {
        let mut tables = self.tables.lock().await;

        // Check everything before touching anything.
        let mut snapshots = Vec::with_capacity(changes.competitions.len());
        for competition in changes.competitions.iter() {
            Tables::check_exists(&tables.competitions, "competition", competition.id())?;
            snapshots.push((competition.id(), competition.save()?));
        }
        for offer in changes.offers.iter() {
            Tables::check_exists(&tables.offers, "transfer offer", offer.id)?;
        }
        for player in changes.players.iter() {
            Tables::check_exists(&tables.players, "player", player.id)?;
        }
        for email in changes.emails.iter() {
            Tables::check_exists(&tables.emails, "email", email.id)?;
        }
        for entry in changes.new_actions.iter() {
            entry.validate()?;
        }
        for id in changes.completed.iter() {
            Tables::check_exists(&tables.actions, "action", *id)?;
        }

        for (id, snapshot) in snapshots {
            tables.competitions.insert(id, snapshot);
        }
        for offer in changes.offers {
            tables.offers.insert(offer.id, offer);
        }
        for player in changes.players {
            tables.players.insert(player.id, player);
        }
        for email in changes.emails {
            tables.emails.insert(email.id, email);
        }
        for (mut email, delivery) in changes.new_emails {
            email.id = next_id(&tables.emails);
            tables.insert_action(&ActionQueueEntry::email(email.id, delivery));
            tables.emails.insert(email.id, email);
        }
        for entry in changes.new_actions.iter() {
            tables.insert_action(entry);
        }
        for id in changes.completed.iter() {
            if let Some(entry) = tables.actions.get_mut(id) {
                entry.completed = true;
            }
        }
        if let Some(today) = changes.today {
            tables.today = Some(today);
        }
        return Ok(());
    }
}
