// The persistence boundary of the engine.
use async_trait::async_trait;
use time::Date;

use crate::logic::{
    calendar::action::ActionQueueEntry,
    competition::Competition,
    email::Email,
    error::EngineResult,
    transfer::{Player, TransferOffer},
    types::{ActionId, CompetitionId, EmailId, OfferId, PlayerId},
};

// Everything a day of the calendar changes.
// Written together or not at all, so that a failed day can be run again from the start.
#[derive(Debug, Default)]
pub struct DayChanges {
    pub competitions: Vec<Competition>,
    pub offers: Vec<TransferOffer>,
    pub players: Vec<Player>,
    pub emails: Vec<Email>,

    // Emails to store, each with the date its delivery is queued for.
    pub new_emails: Vec<(Email, Date)>,
    pub new_actions: Vec<ActionQueueEntry>,
    pub completed: Vec<ActionId>,

    // The date to move to, if the day is over.
    pub today: Option<Date>,
}

// Everything the calendar needs to load and save.
// Inserts give the records their IDs and return them.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn today(&self) -> EngineResult<Date>;
    async fn set_today(&self, today: Date) -> EngineResult<()>;

    // Entries that are not completed and are due on or before the given date,
    // ordered by date and then by ID.
    async fn due_actions(&self, today: Date) -> EngineResult<Vec<ActionQueueEntry>>;
    async fn insert_actions(&self, entries: &[ActionQueueEntry]) -> EngineResult<Vec<ActionId>>;
    async fn action(&self, id: ActionId) -> EngineResult<ActionQueueEntry>;
    async fn mark_completed(&self, ids: &[ActionId]) -> EngineResult<()>;

    async fn competition_ids(&self) -> EngineResult<Vec<CompetitionId>>;
    async fn competition(&self, id: CompetitionId) -> EngineResult<Competition>;
    async fn insert_competition(&self, competition: &mut Competition) -> EngineResult<CompetitionId>;
    async fn save_competition(&self, competition: &Competition) -> EngineResult<()>;

    async fn email(&self, id: EmailId) -> EngineResult<Email>;
    async fn insert_email(&self, email: &mut Email) -> EngineResult<EmailId>;
    async fn save_email(&self, email: &Email) -> EngineResult<()>;

    async fn offer(&self, id: OfferId) -> EngineResult<TransferOffer>;
    async fn insert_offer(&self, offer: &mut TransferOffer) -> EngineResult<OfferId>;
    async fn save_offer(&self, offer: &TransferOffer) -> EngineResult<()>;

    async fn player(&self, id: PlayerId) -> EngineResult<Player>;
    async fn insert_player(&self, player: &mut Player) -> EngineResult<PlayerId>;
    async fn save_player(&self, player: &Player) -> EngineResult<()>;

    // Write the changes of a day in one go. Nothing is written if any part fails.
    async fn commit_changes(&self, changes: DayChanges) -> EngineResult<()>;
}
