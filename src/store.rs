//! Access to the persistent store.
//!
//! Everything the core needs from the database goes through [`Store`] so the reconciler and the leaderboard can be exercised without a live Postgres.

use {
    async_trait::async_trait,
    sqlx::PgPool,
    crate::{
        leaderboard::Prediction,
        prelude::*,
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Sql(#[from] sqlx::Error),
    #[error("tournament {0} does not exist")]
    MissingRow(TournamentId),
    #[cfg(test)]
    #[error("injected failure: {0}")]
    Injected(&'static str),
}

impl IsNetworkError for Error {
    fn is_network_error(&self) -> bool {
        match self {
            Self::Sql(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Tls(_)) => true,
            Self::Sql(_) | Self::MissingRow(_) => false,
            #[cfg(test)] Self::Injected(_) => false,
        }
    }
}

#[async_trait]
pub(crate) trait Store: Send + Sync {
    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>, Error>;
    async fn tournaments(&self) -> Result<Vec<Tournament>, Error>;
    /// Whether at least one result row references this tournament.
    async fn has_results(&self, id: TournamentId) -> Result<bool, Error>;
    async fn set_status(&self, id: TournamentId, status: TournamentStatus, updated_at: DateTime<Utc>) -> Result<(), Error>;
    async fn set_phase_status(&self, id: TournamentId, phase: &PhaseStatus) -> Result<(), Error>;
    /// All predictions for a tournament joined with their owner's display name. No particular order is guaranteed.
    async fn predictions(&self, tournament: TournamentId) -> Result<Vec<Prediction>, Error>;
}

#[derive(sqlx::FromRow)]
struct TournamentRow {
    id: TournamentId,
    name: String,
    start_time: Option<DateTime<Utc>>,
    cutoff_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    status: Option<String>,
    predictions_open: bool,
    active: bool,
    startgg_url: Option<String>,
    current_phase: Option<String>,
    phase_last_checked: Option<DateTime<Utc>>,
    total_remaining_participants: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<TournamentRow> for Tournament {
    fn from(row: TournamentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            start_time: row.start_time,
            cutoff_time: row.cutoff_time,
            end_time: row.end_time,
            status: row.status.as_deref().and_then(TournamentStatus::from_column),
            predictions_open: row.predictions_open,
            active: row.active,
            startgg_url: row.startgg_url,
            current_phase: row.current_phase,
            phase_last_checked: row.phase_last_checked,
            total_remaining_participants: row.total_remaining_participants,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PredictionRow {
    id: PredictionId,
    user_id: UserId,
    score: Option<i32>,
    created_at: DateTime<Utc>,
    username: Option<String>,
}

const TOURNAMENT_COLUMNS: &str = "id, name, start_time, cutoff_time, end_time, status, predictions_open, active, startgg_url, current_phase, phase_last_checked, total_remaining_participants, updated_at";

/// The production store, backed by a Postgres connection pool.
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>, Error> {
        Ok(sqlx::query_as::<_, TournamentRow>(&format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await?
            .map(Tournament::from))
    }

    async fn tournaments(&self) -> Result<Vec<Tournament>, Error> {
        Ok(sqlx::query_as::<_, TournamentRow>(&format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY cutoff_time"))
            .fetch_all(&self.pool).await?
            .into_iter()
            .map(Tournament::from)
            .collect())
    }

    async fn has_results(&self, id: TournamentId) -> Result<bool, Error> {
        Ok(sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM results WHERE tournament_id = $1)")
            .bind(id)
            .fetch_one(&self.pool).await?)
    }

    async fn set_status(&self, id: TournamentId, status: TournamentStatus, updated_at: DateTime<Utc>) -> Result<(), Error> {
        let result = sqlx::query("UPDATE tournaments SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_column())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(Error::MissingRow(id)) }
        Ok(())
    }

    async fn set_phase_status(&self, id: TournamentId, phase: &PhaseStatus) -> Result<(), Error> {
        let result = sqlx::query("UPDATE tournaments SET current_phase = $1, phase_last_checked = $2, total_remaining_participants = $3 WHERE id = $4")
            .bind(&phase.current_phase)
            .bind(phase.phase_last_checked)
            .bind(phase.active_entrant_count)
            .bind(id)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(Error::MissingRow(id)) }
        Ok(())
    }

    async fn predictions(&self, tournament: TournamentId) -> Result<Vec<Prediction>, Error> {
        Ok(sqlx::query_as::<_, PredictionRow>(r#"
            SELECT p.id, p.user_id, p.score, p.created_at, pr.username
            FROM predictions p
            LEFT JOIN profiles pr ON pr.id = p.user_id
            WHERE p.tournament_id = $1
            ORDER BY p.created_at DESC
        "#)
            .bind(tournament)
            .fetch_all(&self.pool).await?
            .into_iter()
            .map(|PredictionRow { id, user_id, score, created_at, username }| Prediction { id, user_id, score, created_at, username })
            .collect())
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;
