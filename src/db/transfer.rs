use sqlx::SqliteConnection;

use crate::{
    db::Db,
    logic::{
        error::{EngineError, EngineResult},
        transfer::{Player, TransferOffer},
        types::{OfferId, PlayerId},
    },
};

impl Player {
    pub async fn fetch_from_db(db: &Db, id: PlayerId) -> EngineResult<Self> {
        let player: Option<Self> = sqlx::query_as(
            "SELECT * FROM Player
            WHERE id = $1"
        ).bind(id)
        .fetch_optional(db).await?;

        player.ok_or_else(|| EngineError::not_found("player", id))
    }

    pub async fn save_new(&mut self, conn: &mut SqliteConnection) -> EngineResult<PlayerId> {
        self.id = sqlx::query_scalar(
            "INSERT INTO Player
            (name, team_id, asking_fee)
            VALUES ($1, $2, $3)
            RETURNING id"
        ).bind(&self.name)
        .bind(self.team_id)
        .bind(self.asking_fee)
        .fetch_one(&mut *conn).await?;

        return Ok(self.id);
    }

    pub async fn save_to_db(&self, conn: &mut SqliteConnection) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE Player SET name = $1, team_id = $2, asking_fee = $3
            WHERE id = $4"
        ).bind(&self.name)
        .bind(self.team_id)
        .bind(self.asking_fee)
        .bind(self.id)
        .execute(&mut *conn).await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found("player", self.id));
        }
        return Ok(());
    }
}

impl TransferOffer {
    pub async fn fetch_from_db(db: &Db, id: OfferId) -> EngineResult<Self> {
        let offer: Option<Self> = sqlx::query_as(
            "SELECT * FROM TransferOffer
            WHERE id = $1"
        ).bind(id)
        .fetch_optional(db).await?;

        offer.ok_or_else(|| EngineError::not_found("transfer offer", id))
    }

    pub async fn save_new(&mut self, conn: &mut SqliteConnection) -> EngineResult<OfferId> {
        self.id = sqlx::query_scalar(
            "INSERT INTO TransferOffer
            (player_id, from_team, to_team, fee, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id"
        ).bind(self.player_id)
        .bind(self.from_team)
        .bind(self.to_team)
        .bind(self.fee)
        .bind(self.status)
        .fetch_one(&mut *conn).await?;

        return Ok(self.id);
    }

    pub async fn save_to_db(&self, conn: &mut SqliteConnection) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE TransferOffer SET status = $1
            WHERE id = $2"
        ).bind(self.status)
        .bind(self.id)
        .execute(&mut *conn).await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found("transfer offer", self.id));
        }
        return Ok(());
    }
}
