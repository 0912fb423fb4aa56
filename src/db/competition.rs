use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::Db,
    logic::{
        competition::Competition,
        error::{EngineError, EngineResult},
        types::CompetitionId,
    },
};

// Competitions are stored as JSON snapshots, with the name and season alongside for queries.
impl Competition {
    pub async fn fetch_from_db(db: &Db, id: CompetitionId) -> EngineResult<Self> {
        let snapshot: Option<Json<serde_json::Value>> = sqlx::query_scalar(
            "SELECT snapshot FROM Competition
            WHERE id = $1"
        ).bind(id)
        .fetch_optional(db).await?;

        let Json(value) = snapshot.ok_or_else(|| EngineError::not_found("competition", id))?;
        let mut competition = Competition::restore(value)?;
        competition.set_id(id);
        return Ok(competition);
    }

    pub async fn fetch_ids(db: &Db) -> EngineResult<Vec<CompetitionId>> {
        Ok(sqlx::query_scalar(
            "SELECT id FROM Competition
            ORDER BY id ASC"
        ).fetch_all(db).await?)
    }

    // Save a new competition and give it its ID.
    pub async fn save_new(&mut self, conn: &mut SqliteConnection) -> EngineResult<CompetitionId> {
        let id: CompetitionId = sqlx::query_scalar(
            "INSERT INTO Competition
            (comp_name, season, snapshot)
            VALUES ($1, $2, $3)
            RETURNING id"
        ).bind(self.name())
        .bind(self.season())
        .bind(Json(self.save()?))
        .fetch_one(&mut *conn).await?;

        self.set_id(id);
        self.save_to_db(conn).await?;
        return Ok(id);
    }

    pub async fn save_to_db(&self, conn: &mut SqliteConnection) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE Competition SET comp_name = $1, season = $2, snapshot = $3
            WHERE id = $4"
        ).bind(self.name())
        .bind(self.season())
        .bind(Json(self.save()?))
        .bind(self.id())
        .execute(&mut *conn).await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found("competition", self.id()));
        }
        return Ok(());
    }
}
