use sqlx::{types::Json, SqliteConnection};
use time::Date;

use crate::{
    db::Db,
    logic::{
        calendar::action::ActionQueueEntry,
        error::{EngineError, EngineResult},
        types::ActionId,
    },
};

impl ActionQueueEntry {
    // Get an entry from the database.
    pub async fn fetch_from_db(db: &Db, id: ActionId) -> EngineResult<Self> {
        let entry: Option<Self> = sqlx::query_as(
            "SELECT * FROM ActionQueue
            WHERE id = $1"
        ).bind(id)
        .fetch_optional(db).await?;

        let entry = entry.ok_or_else(|| EngineError::not_found("action", id))?;
        entry.validate()?;
        return Ok(entry);
    }

    // Get the entries due on or before the given date, oldest first.
    pub async fn fetch_due(db: &Db, today: Date) -> EngineResult<Vec<Self>> {
        let entries: Vec<Self> = sqlx::query_as(
            "SELECT * FROM ActionQueue
            WHERE completed = FALSE AND action_date <= $1
            ORDER BY action_date ASC, id ASC"
        ).bind(today)
        .fetch_all(db).await?;

        for entry in entries.iter() {
            entry.validate()?;
        }
        return Ok(entries);
    }

    // Save new entries and return their IDs.
    pub async fn save_all(conn: &mut SqliteConnection, entries: &[Self]) -> EngineResult<Vec<ActionId>> {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            entry.validate()?;
            let id: ActionId = sqlx::query_scalar(
                "INSERT INTO ActionQueue
                (action_type, action_date, payload, completed)
                VALUES ($1, $2, $3, $4)
                RETURNING id"
            ).bind(entry.action_type)
            .bind(entry.action_date)
            .bind(Json(&entry.payload))
            .bind(entry.completed)
            .fetch_one(&mut *conn).await?;
            ids.push(id);
        }
        return Ok(ids);
    }

    pub async fn mark_completed(conn: &mut SqliteConnection, ids: &[ActionId]) -> EngineResult<()> {
        for id in ids.iter() {
            let result = sqlx::query(
                "UPDATE ActionQueue SET completed = TRUE
                WHERE id = $1"
            ).bind(*id)
            .execute(&mut *conn).await?;

            if result.rows_affected() == 0 {
                return Err(EngineError::not_found("action", *id));
            }
        }
        return Ok(());
    }
}
