//! The start.gg bracket provider.

use {
    async_trait::async_trait,
    graphql_client::GraphQLQuery,
    itertools::Itertools as _,
    tokio::sync::Mutex,
    url::Url,
    crate::prelude::*,
};

/// From https://dev.start.gg/docs/rate-limits:
///
/// > You may not average more than 80 requests per 60 seconds.
const RATE_LIMIT: Duration = Duration::from_millis(60_000 / 80);

const ENDPOINT: &str = "https://api.start.gg/gql/alpha";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error("{} GraphQL errors", .0.len())]
    GraphQL(Vec<graphql_client::Error>),
    #[error("GraphQL response returned neither `data` nor `errors`")]
    NoDataNoErrors,
    #[error("no start.gg tournament with slug {0}")]
    TournamentNotFound(String),
    #[error("start.gg tournament {0} has no active or completed phase")]
    PhaseNotFound(String),
}

impl IsNetworkError for Error {
    fn is_network_error(&self) -> bool {
        match self {
            Self::Reqwest(e) => e.is_request() || e.is_connect() || e.is_timeout() || e.status().is_some_and(|status| status.is_server_error()),
            Self::GraphQL(errors) => errors.iter().all(|graphql_client::Error { message, .. }| message == "An unknown error has occurred"),
            Self::NoDataNoErrors | Self::TournamentNotFound(_) | Self::PhaseNotFound(_) => false,
        }
    }
}

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "assets/graphql/startgg-schema.graphql",
    query_path = "assets/graphql/startgg-phase-status-query.graphql",
    variables_derives = "Debug, Clone",
    response_derives = "Debug, Clone",
)]
pub(crate) struct PhaseStatusQuery;

/// Read-only access to an external bracket provider.
#[async_trait]
pub(crate) trait BracketProvider: Send + Sync {
    /// Looks up the current phase of the tournament with the given slug. `display_name` only appears in diagnostics.
    async fn phase_status(&self, slug: &str, display_name: &str, now: DateTime<Utc>) -> Result<PhaseStatus, Error>;
}

pub(crate) struct StartGG {
    http_client: reqwest::Client,
    auth_token: String,
    next_request: Mutex<Instant>,
}

impl StartGG {
    pub(crate) fn new(http_client: reqwest::Client, auth_token: String) -> Self {
        Self {
            http_client,
            auth_token,
            next_request: Mutex::new(Instant::now()),
        }
    }

    async fn query<T: GraphQLQuery>(&self, variables: T::Variables) -> Result<T::ResponseData, Error> {
        let mut next_request = self.next_request.lock().await;
        sleep_until(*next_request).await;
        let response = self.http_client.post(ENDPOINT)
            .bearer_auth(&self.auth_token)
            .json(&T::build_query(variables))
            .send().await;
        *next_request = Instant::now() + RATE_LIMIT;
        let graphql_client::Response { data, errors, extensions: _ } = response?
            .error_for_status()?
            .json::<graphql_client::Response<T::ResponseData>>().await?;
        match (data, errors) {
            (Some(_), Some(errors)) if !errors.is_empty() => Err(Error::GraphQL(errors)),
            (Some(data), _) => Ok(data),
            (None, Some(errors)) => Err(Error::GraphQL(errors)),
            (None, None) => Err(Error::NoDataNoErrors),
        }
    }
}

#[async_trait]
impl BracketProvider for StartGG {
    async fn phase_status(&self, slug: &str, display_name: &str, now: DateTime<Utc>) -> Result<PhaseStatus, Error> {
        log::debug!("checking start.gg phase for {display_name:?} ({slug})");
        let response = self.query::<PhaseStatusQuery>(phase_status_query::Variables { slug: slug.to_owned() }).await?;
        select_phase(slug, phases(slug, response)?, now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseState {
    Active,
    Completed,
    Other,
}

#[derive(Debug, Clone)]
struct PhaseInfo {
    event_idx: usize,
    name: Option<String>,
    state: PhaseState,
    num_seeds: Option<i64>,
    phase_order: Option<i64>,
    event_entrants: Option<i64>,
}

fn phases(slug: &str, response: phase_status_query::ResponseData) -> Result<Vec<PhaseInfo>, Error> {
    let phase_status_query::ResponseData { tournament: Some(tournament) } = response else { return Err(Error::TournamentNotFound(slug.to_owned())) };
    Ok(tournament.events.into_iter()
        .flatten()
        .flatten()
        .enumerate()
        .flat_map(|(event_idx, phase_status_query::PhaseStatusQueryTournamentEvents { name: _, num_entrants, phases })| {
            phases.into_iter()
                .flatten()
                .flatten()
                .map(move |phase_status_query::PhaseStatusQueryTournamentEventsPhases { name, state, num_seeds, phase_order }| PhaseInfo {
                    event_idx,
                    name,
                    state: match state {
                        Some(phase_status_query::ActivityState::ACTIVE) => PhaseState::Active,
                        Some(phase_status_query::ActivityState::COMPLETED) => PhaseState::Completed,
                        _ => PhaseState::Other,
                    },
                    num_seeds,
                    phase_order,
                    event_entrants: num_entrants,
                })
        })
        .collect())
}

/// The first active phase in bracket order, or the last completed one if nothing is running.
fn select_phase(slug: &str, phases: Vec<PhaseInfo>, now: DateTime<Utc>) -> Result<PhaseStatus, Error> {
    let ordered = phases.into_iter()
        .sorted_by_key(|phase| (phase.event_idx, phase.phase_order.unwrap_or(i64::MAX)))
        .collect_vec();
    let phase = ordered.iter().find(|phase| phase.state == PhaseState::Active)
        .or_else(|| ordered.iter().rev().find(|phase| phase.state == PhaseState::Completed))
        .ok_or_else(|| Error::PhaseNotFound(slug.to_owned()))?;
    Ok(PhaseStatus {
        current_phase: phase.name.clone().unwrap_or_else(|| format!("Phase {}", phase.phase_order.unwrap_or_default())),
        phase_last_checked: now,
        active_entrant_count: phase.num_seeds.or(phase.event_entrants).unwrap_or_default(),
    })
}

/// Extracts the tournament slug from a start.gg URL: the path segment right after `tournament`.
///
/// URLs without a scheme are read as `https`, and bare paths like `/tournament/evo` as paths on start.gg.
pub(crate) fn extract_slug(url: &str) -> Result<String, crate::error::Error> {
    let malformed = || crate::error::Error::MalformedBracketUrl(url.to_owned());
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) if trimmed.starts_with('/') => Url::parse(&format!("https://www.start.gg{trimmed}")).map_err(|_| malformed())?,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}")).map_err(|_| malformed())?,
        Err(_) => return Err(malformed()),
    };
    let mut segments = parsed.path_segments().ok_or_else(malformed)?;
    segments.find(|segment| *segment == "tournament").ok_or_else(malformed)?;
    match segments.next() {
        Some(slug) if !slug.is_empty() => Ok(slug.to_owned()),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(event_idx: usize, name: &str, state: PhaseState, order: i64, seeds: i64) -> PhaseInfo {
        PhaseInfo {
            event_idx,
            name: Some(name.to_owned()),
            state,
            num_seeds: Some(seeds),
            phase_order: Some(order),
            event_entrants: Some(512),
        }
    }

    #[test]
    fn slug_follows_tournament_segment() {
        assert_eq!(extract_slug("https://host/tournament/my-event/events").unwrap(), "my-event");
        assert_eq!(extract_slug("https://www.start.gg/tournament/genesis-10/event/ultimate-singles/overview").unwrap(), "genesis-10");
        assert_eq!(extract_slug("start.gg/tournament/evo-2025").unwrap(), "evo-2025");
        assert_eq!(extract_slug("/tournament/evo/details").unwrap(), "evo");
    }

    #[test]
    fn slug_rejects_other_shapes() {
        for url in ["https://host/no-match", "https://host/tournament", "https://host/tournament/", "mailto:someone@example.com", "http://[::1"] {
            assert!(matches!(extract_slug(url), Err(crate::error::Error::MalformedBracketUrl(ref bad)) if bad == url), "{url}");
        }
    }

    #[test]
    fn active_phase_preferred() {
        let now = Utc::now();
        let status = select_phase("evo", vec![
            phase(0, "Top 8", PhaseState::Other, 3, 8),
            phase(0, "Pools", PhaseState::Completed, 1, 512),
            phase(0, "Top 64", PhaseState::Active, 2, 64),
        ], now).unwrap();
        assert_eq!(status, PhaseStatus { current_phase: format!("Top 64"), phase_last_checked: now, active_entrant_count: 64 });
    }

    #[test]
    fn falls_back_to_last_completed_phase() {
        let now = Utc::now();
        let status = select_phase("evo", vec![
            phase(0, "Top 8", PhaseState::Completed, 3, 8),
            phase(0, "Pools", PhaseState::Completed, 1, 512),
            phase(1, "Side event", PhaseState::Other, 1, 32),
        ], now).unwrap();
        assert_eq!(status.current_phase, "Top 8");
        assert_eq!(status.active_entrant_count, 8);
    }

    #[test]
    fn no_started_phase_is_an_error() {
        let result = select_phase("evo", vec![phase(0, "Pools", PhaseState::Other, 1, 512)], Utc::now());
        assert!(matches!(result, Err(Error::PhaseNotFound(ref slug)) if slug == "evo"));
        assert!(matches!(select_phase("evo", Vec::default(), Utc::now()), Err(Error::PhaseNotFound(_))));
    }

    #[test]
    fn entrant_count_falls_back_to_event() {
        let mut only = phase(0, "Bracket", PhaseState::Active, 1, 0);
        only.num_seeds = None;
        only.name = None;
        let status = select_phase("evo", vec![only], Utc::now()).unwrap();
        assert_eq!(status.active_entrant_count, 512);
        assert_eq!(status.current_phase, "Phase 1");
    }

    #[test]
    fn maps_provider_response() {
        let response = serde_json::from_value::<phase_status_query::ResponseData>(serde_json::json!({
            "tournament": {
                "name": "Genesis 10",
                "events": [{
                    "name": "Ultimate Singles",
                    "numEntrants": 1800,
                    "phases": [
                        { "name": "Pools", "state": "COMPLETED", "numSeeds": 1800, "phaseOrder": 1 },
                        { "name": "Top 96", "state": "ACTIVE", "numSeeds": 96, "phaseOrder": 2 },
                    ],
                }],
            },
        })).unwrap();
        let status = select_phase("genesis-10", phases("genesis-10", response).unwrap(), Utc::now()).unwrap();
        assert_eq!(status.current_phase, "Top 96");
        assert_eq!(status.active_entrant_count, 96);
        let missing = serde_json::from_value::<phase_status_query::ResponseData>(serde_json::json!({ "tournament": null })).unwrap();
        assert!(matches!(phases("nope", missing), Err(Error::TournamentNotFound(_))));
    }
}
