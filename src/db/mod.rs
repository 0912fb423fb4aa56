// The engine database.
mod action;
mod competition;
mod email;
mod memory;
pub mod seed;
mod transfer;

use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqliteConnection, SqlitePool};
use time::Date;

use crate::logic::{
    calendar::action::ActionQueueEntry,
    competition::Competition,
    email::Email,
    error::EngineResult,
    storage::{DayChanges, Storage},
    transfer::{Player, TransferOffer},
    types::{ActionId, CompetitionId, EmailId, OfferId, PlayerId},
};

pub use memory::MemoryStore;

pub type Db = SqlitePool;

// Storage in an SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    // Open the database, creating and migrating it if needed.
    // The start date is only written if the database has no date yet.
    pub async fn connect(url: &str, start_date: Date) -> EngineResult<Self> {
        let in_memory = url.contains(":memory:");
        if !in_memory && !Sqlite::database_exists(url).await? {
            Sqlite::create_database(url).await?;
        }

        // Every connection to an in-memory database gets a database of its own,
        // so there must be exactly one that never closes.
        let options = match in_memory {
            true => SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None),
            false => SqlitePoolOptions::new(),
        };
        let db = options.connect(url).await?;
        sqlx::migrate!("sql/migrations").run(&db).await?;

        sqlx::query(
            "INSERT INTO KeyValue (key_name, value_data)
            VALUES ('today', $1)
            ON CONFLICT (key_name) DO NOTHING"
        ).bind(start_date)
        .execute(&db).await?;

        return Ok(SqliteStore { db });
    }
}

async fn set_today(conn: &mut SqliteConnection, today: Date) -> EngineResult<()> {
    sqlx::query(
        "UPDATE KeyValue SET value_data = $1
        WHERE key_name = 'today'"
    ).bind(today)
    .execute(&mut *conn).await?;
    return Ok(());
}

#[async_trait]
impl Storage for SqliteStore {
    // Get the current date.
    async fn today(&self) -> EngineResult<Date> {
        Ok(sqlx::query_scalar(
            "SELECT value_data FROM KeyValue
            WHERE key_name = 'today'"
        ).fetch_one(&self.db).await?)
    }

    async fn set_today(&self, today: Date) -> EngineResult<()> {
        set_today(&mut *self.db.acquire().await?, today).await
    }

    async fn due_actions(&self, today: Date) -> EngineResult<Vec<ActionQueueEntry>> {
        ActionQueueEntry::fetch_due(&self.db, today).await
    }

    async fn insert_actions(&self, entries: &[ActionQueueEntry]) -> EngineResult<Vec<ActionId>> {
        let mut tx = self.db.begin().await?;
        let ids = ActionQueueEntry::save_all(&mut *tx, entries).await?;
        tx.commit().await?;
        return Ok(ids);
    }

    async fn action(&self, id: ActionId) -> EngineResult<ActionQueueEntry> {
        ActionQueueEntry::fetch_from_db(&self.db, id).await
    }

    async fn mark_completed(&self, ids: &[ActionId]) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;
        ActionQueueEntry::mark_completed(&mut *tx, ids).await?;
        tx.commit().await?;
        return Ok(());
    }

    async fn competition_ids(&self) -> EngineResult<Vec<CompetitionId>> {
        Competition::fetch_ids(&self.db).await
    }

    async fn competition(&self, id: CompetitionId) -> EngineResult<Competition> {
        Competition::fetch_from_db(&self.db, id).await
    }

    async fn insert_competition(&self, competition: &mut Competition) -> EngineResult<CompetitionId> {
        competition.save_new(&mut *self.db.acquire().await?).await
    }

    async fn save_competition(&self, competition: &Competition) -> EngineResult<()> {
        competition.save_to_db(&mut *self.db.acquire().await?).await
    }

    async fn email(&self, id: EmailId) -> EngineResult<Email> {
        Email::fetch_from_db(&self.db, id).await
    }

    async fn insert_email(&self, email: &mut Email) -> EngineResult<EmailId> {
        email.save_new(&mut *self.db.acquire().await?).await
    }

    async fn save_email(&self, email: &Email) -> EngineResult<()> {
        email.save_to_db(&mut *self.db.acquire().await?).await
    }

    async fn offer(&self, id: OfferId) -> EngineResult<TransferOffer> {
        TransferOffer::fetch_from_db(&self.db, id).await
    }

    async fn insert_offer(&self, offer: &mut TransferOffer) -> EngineResult<OfferId> {
        offer.save_new(&mut *self.db.acquire().await?).await
    }

    async fn save_offer(&self, offer: &TransferOffer) -> EngineResult<()> {
        offer.save_to_db(&mut *self.db.acquire().await?).await
    }

    async fn player(&self, id: PlayerId) -> EngineResult<Player> {
        Player::fetch_from_db(&self.db, id).await
    }

    async fn insert_player(&self, player: &mut Player) -> EngineResult<PlayerId> {
        player.save_new(&mut *self.db.acquire().await?).await
    }

    async fn save_player(&self, player: &Player) -> EngineResult<()> {
        player.save_to_db(&mut *self.db.acquire().await?).await
    }

    async fn commit_changes(&self, changes: DayChanges) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;
        for competition in changes.competitions.iter() {
            competition.save_to_db(&mut *tx).await?;
        }
        for offer in changes.offers.iter() {
            offer.save_to_db(&mut *tx).await?;
        }
        for player in changes.players.iter() {
            player.save_to_db(&mut *tx).await?;
        }
        for email in changes.emails.iter() {
            email.save_to_db(&mut *tx).await?;
        }

        let mut new_actions = changes.new_actions;
        for (mut email, delivery) in changes.new_emails {
            let id = email.save_new(&mut *tx).await?;
            new_actions.push(ActionQueueEntry::email(id, delivery));
        }
        ActionQueueEntry::save_all(&mut *tx, &new_actions).await?;
        ActionQueueEntry::mark_completed(&mut *tx, &changes.completed).await?;
        if let Some(today) = changes.today {
            set_today(&mut *tx, today).await?;
        }

        // Dropping the transaction before this rolls everything back.
        tx.commit().await?;
        return Ok(());
    }
}
