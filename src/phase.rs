//! Current bracket phase of tournaments, looked up through the [`BracketProvider`] and cached on the tournament row.

use crate::{
    prelude::*,
    startgg,
};

/// Looks up the current phase for a bracket URL.
pub(crate) async fn fetch(provider: &dyn BracketProvider, bracket_url: &str, display_name: &str, now: DateTime<Utc>) -> Result<PhaseStatus, Error> {
    let slug = startgg::extract_slug(bracket_url)?;
    Ok(provider.phase_status(&slug, display_name, now).await?)
}

/// Fetches the current phase of a tournament and writes it to the tournament's cache fields.
///
/// `override_url` takes precedence over the stored bracket URL. A failed cache write is reported as a warning.
pub(crate) async fn refresh(store: &dyn Store, provider: &dyn BracketProvider, id: TournamentId, override_url: Option<&str>, now: DateTime<Utc>) -> Result<Warned<PhaseStatus>, Error> {
    let tournament = store.tournament(id).await?.ok_or(Error::NotFound(Entity::Tournament(id)))?;
    let bracket_url = override_url.or(tournament.startgg_url.as_deref()).ok_or(Error::InvalidTournamentState(id, "no bracket URL"))?;
    let phase = fetch(provider, bracket_url, &tournament.name, now).await?;
    let mut warned = Warned::new(phase);
    if let Err(e) = store.set_phase_status(id, &warned.value).await {
        warned.warn(format!("failed to cache phase status of tournament {id}: {e}"));
    }
    Ok(warned)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshReport {
    pub(crate) refreshed: usize,
    pub(crate) failed: usize,
}

/// Refreshes the cached phase of every visible, unfinished tournament that has a bracket URL.
///
/// Each tournament is independent: provider or store failures are logged and counted.
pub(crate) async fn refresh_all(store: &dyn Store, provider: &dyn BracketProvider, now: DateTime<Utc>) -> Result<RefreshReport, Error> {
    let mut report = RefreshReport::default();
    for tournament in store.tournaments().await? {
        if !tournament.active || tournament.status == Some(TournamentStatus::Completed) || tournament.startgg_url.is_none() { continue }
        match refresh(store, provider, tournament.id, None, now).await {
            Ok(Warned { value, warnings }) => {
                if tournament.cached_phase().is_none_or(|cached| cached.current_phase != value.current_phase) {
                    log::info!("tournament {:?} is now in phase {:?} ({} entrants remaining)", tournament.name, value.current_phase, value.active_entrant_count);
                }
                if warnings.is_empty() {
                    report.refreshed += 1;
                } else {
                    report.failed += 1;
                }
            }
            Err(e) => {
                log::warn!("failed to refresh phase of tournament {:?} ({}): {e}", tournament.name, tournament.id);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        std::sync::Mutex,
        async_trait::async_trait,
        crate::{
            error::DataFetchError,
            store::MemoryStore,
        },
        super::*,
    };

    /// Bracket provider serving canned phases by slug.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) phases: HashMap<String, (String, i64)>,
        pub(crate) unreachable: bool,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        pub(crate) fn with_phase(slug: &str, phase: &str, entrants: i64) -> Self {
            let mut provider = Self::default();
            provider.phases.insert(slug.to_owned(), (phase.to_owned(), entrants));
            provider
        }
    }

    #[async_trait]
    impl BracketProvider for FakeProvider {
        async fn phase_status(&self, slug: &str, _: &str, now: DateTime<Utc>) -> Result<PhaseStatus, startgg::Error> {
            self.calls.lock().unwrap().push(slug.to_owned());
            if self.unreachable { return Err(startgg::Error::NoDataNoErrors) }
            let (current_phase, active_entrant_count) = self.phases.get(slug).cloned().ok_or_else(|| startgg::Error::PhaseNotFound(slug.to_owned()))?;
            Ok(PhaseStatus { current_phase, phase_last_checked: now, active_entrant_count })
        }
    }

    fn tournament_with_url(name: &str, url: &str) -> Tournament {
        let mut tournament = Tournament::dummy(name, Utc::now());
        tournament.startgg_url = Some(url.to_owned());
        tournament
    }

    #[tokio::test]
    async fn fetch_parses_url_first() {
        let provider = FakeProvider::with_phase("evo", "Top 8", 8);
        assert!(matches!(fetch(&provider, "https://start.gg/no-match", "Evo", Utc::now()).await, Err(Error::MalformedBracketUrl(_))));
        assert!(provider.calls.lock().unwrap().is_empty());
        assert_eq!(fetch(&provider, "https://start.gg/tournament/evo/details", "Evo", Utc::now()).await.unwrap().current_phase, "Top 8");
    }

    #[tokio::test]
    async fn refresh_writes_back_cache() {
        let store = MemoryStore::default();
        let provider = FakeProvider::with_phase("evo", "Top 64", 64);
        let id = store.insert(tournament_with_url("Evo", "https://www.start.gg/tournament/evo/events"));
        let now = Utc::now();
        let warned = refresh(&store, &provider, id, None, now).await.unwrap();
        assert!(warned.warnings.is_empty());
        assert_eq!(store.get(id).cached_phase(), Some(warned.value));
        assert_eq!(store.get(id).phase_last_checked, Some(now));
    }

    #[tokio::test]
    async fn write_back_failure_is_only_a_warning() {
        let store = MemoryStore::default();
        let provider = FakeProvider::with_phase("evo", "Top 64", 64);
        let id = store.insert(tournament_with_url("Evo", "https://www.start.gg/tournament/evo"));
        store.with(|state| state.fail_phase_writes = true);
        let warned = refresh(&store, &provider, id, None, Utc::now()).await.unwrap();
        assert_eq!(warned.value.current_phase, "Top 64");
        assert_eq!(warned.warnings.len(), 1);
        assert_eq!(store.get(id).current_phase, None);
    }

    #[tokio::test]
    async fn override_url_and_error_cases() {
        let store = MemoryStore::default();
        let provider = FakeProvider::with_phase("override", "Pools", 300);
        let id = store.insert(Tournament::dummy("no url", Utc::now()));
        assert!(matches!(refresh(&store, &provider, id, None, Utc::now()).await, Err(Error::InvalidTournamentState(..))));
        assert_eq!(refresh(&store, &provider, id, Some("https://start.gg/tournament/override"), Utc::now()).await.unwrap().value.current_phase, "Pools");
        assert!(matches!(refresh(&store, &provider, id, Some("https://start.gg/tournament/unknown"), Utc::now()).await, Err(Error::NotFound(Entity::Phase { .. }))));
        assert!(matches!(refresh(&store, &provider, TournamentId::new(), None, Utc::now()).await, Err(Error::NotFound(Entity::Tournament(_)))));
        let unreachable = FakeProvider { unreachable: true, ..FakeProvider::default() };
        assert!(matches!(refresh(&store, &unreachable, id, Some("https://start.gg/tournament/override"), Utc::now()).await, Err(Error::DataFetch(DataFetchError::StartGG(_)))));
    }

    #[tokio::test]
    async fn refresh_all_skips_and_isolates() {
        let store = MemoryStore::default();
        let provider = FakeProvider::with_phase("evo", "Top 8", 8);
        let evo = store.insert(tournament_with_url("Evo", "https://start.gg/tournament/evo"));
        store.insert(tournament_with_url("broken", "https://start.gg/tournament/missing"));
        store.insert(tournament_with_url("bad url", "https://start.gg/events/whatever"));
        let mut hidden = tournament_with_url("hidden", "https://start.gg/tournament/evo");
        hidden.active = false;
        store.insert(hidden);
        let mut done = tournament_with_url("done", "https://start.gg/tournament/evo");
        done.status = Some(TournamentStatus::Completed);
        store.insert(done);
        store.insert(Tournament::dummy("no url", Utc::now()));

        let report = refresh_all(&store, &provider, Utc::now()).await.unwrap();
        assert_eq!(report, RefreshReport { refreshed: 1, failed: 2 });
        assert_eq!(store.get(evo).current_phase.as_deref(), Some("Top 8"));
        assert_eq!(*provider.calls.lock().unwrap(), vec![format!("evo"), format!("missing")]);
    }
}
