//! Tournament lifecycle status and correction of the cached `status` column.

use crate::prelude::*;

/// A tournament with results is completed. Otherwise it is upcoming until the prediction cutoff and active after.
pub(crate) fn derive_status(has_results: bool, cutoff_time: DateTime<Utc>, now: DateTime<Utc>) -> TournamentStatus {
    if has_results {
        TournamentStatus::Completed
    } else if now < cutoff_time {
        TournamentStatus::Upcoming
    } else {
        TournamentStatus::Active
    }
}

pub(crate) async fn compute_status(store: &dyn Store, id: TournamentId, cutoff_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<TournamentStatus, Error> {
    if store.has_results(id).await? { return Ok(TournamentStatus::Completed) }
    let cutoff_time = cutoff_time.ok_or(Error::InvalidTournamentState(id, "missing cutoff time"))?;
    Ok(derive_status(false, cutoff_time, now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reconciled {
    Unchanged(TournamentStatus),
    Updated {
        from: Option<TournamentStatus>,
        to: TournamentStatus,
    },
}

/// Recomputes the status of a tournament and writes it back if the stored value has drifted.
///
/// Writing the same status twice is harmless, so concurrent reconciliation needs no locking.
pub(crate) async fn reconcile(store: &dyn Store, tournament: &Tournament, now: DateTime<Utc>) -> Result<Reconciled, Error> {
    let status = compute_status(store, tournament.id, tournament.cutoff_time, now).await?;
    if tournament.status == Some(status) { return Ok(Reconciled::Unchanged(status)) }
    store.set_status(tournament.id, status, now).await?;
    log::info!("status of tournament {:?} ({}) corrected: {} → {status}", tournament.name, tournament.id, tournament.status.map_or("<invalid>", |status| status.as_column()));
    Ok(Reconciled::Updated { from: tournament.status, to: status })
}

/// The current status of a single tournament. Drift is corrected opportunistically.
pub(crate) async fn current_status(store: &dyn Store, id: TournamentId, now: DateTime<Utc>) -> Result<Warned<TournamentStatus>, Error> {
    let tournament = store.tournament(id).await?.ok_or(Error::NotFound(Entity::Tournament(id)))?;
    let status = compute_status(store, id, tournament.cutoff_time, now).await?;
    let mut warned = Warned::new(status);
    if tournament.status != Some(status) {
        if let Err(e) = store.set_status(id, status, now).await {
            warned.warn(format!("failed to correct stored status of tournament {id} to {status}: {e}"));
        }
    }
    Ok(warned)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchFailure {
    pub(crate) tournament_id: TournamentId,
    pub(crate) name: String,
    pub(crate) error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchReport {
    pub(crate) updated_count: usize,
    pub(crate) unchanged_count: usize,
    pub(crate) failures: Vec<BatchFailure>,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} updated, {} already correct, {} failed", self.updated_count, self.unchanged_count, self.failures.len())?;
        for BatchFailure { tournament_id, name, error } in &self.failures {
            write!(f, "\n  {name} ({tournament_id}): {error}")?;
        }
        Ok(())
    }
}

/// Reconciles every tournament. A failure on one tournament is recorded and the rest are still processed.
pub(crate) async fn reconcile_all(store: &dyn Store, now: DateTime<Utc>) -> Result<BatchReport, Error> {
    let mut report = BatchReport::default();
    for tournament in store.tournaments().await? {
        match reconcile(store, &tournament, now).await {
            Ok(Reconciled::Unchanged(_)) => report.unchanged_count += 1,
            Ok(Reconciled::Updated { .. }) => report.updated_count += 1,
            Err(e) => {
                log::warn!("failed to reconcile status of tournament {:?} ({}): {e}", tournament.name, tournament.id);
                report.failures.push(BatchFailure {
                    tournament_id: tournament.id,
                    name: tournament.name,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}
