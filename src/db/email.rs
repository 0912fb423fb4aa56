use sqlx::SqliteConnection;

use crate::{
    db::Db,
    logic::{
        email::Email,
        error::{EngineError, EngineResult},
        types::EmailId,
    },
};

impl Email {
    pub async fn fetch_from_db(db: &Db, id: EmailId) -> EngineResult<Self> {
        let email: Option<Self> = sqlx::query_as(
            "SELECT * FROM Email
            WHERE id = $1"
        ).bind(id)
        .fetch_optional(db).await?;

        email.ok_or_else(|| EngineError::not_found("email", id))
    }

    pub async fn save_new(&mut self, conn: &mut SqliteConnection) -> EngineResult<EmailId> {
        self.id = sqlx::query_scalar(
            "INSERT INTO Email
            (sender, subject, body, date, delivered)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id"
        ).bind(&self.sender)
        .bind(&self.subject)
        .bind(&self.body)
        .bind(self.date)
        .bind(self.delivered)
        .fetch_one(&mut *conn).await?;

        return Ok(self.id);
    }

    pub async fn save_to_db(&self, conn: &mut SqliteConnection) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE Email SET delivered = $1
            WHERE id = $2"
        ).bind(self.delivered)
        .bind(self.id)
        .execute(&mut *conn).await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found("email", self.id));
        }
        return Ok(());
    }
}
