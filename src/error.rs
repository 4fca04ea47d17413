use crate::{
    prelude::*,
    startgg,
    store,
};

/// Things a request can refer to that might not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entity {
    Tournament(TournamentId),
    /// The bracket provider knows the tournament but reports no started phase.
    Phase { slug: String },
    /// The bracket provider has no tournament with this slug.
    BracketTournament { slug: String },
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tournament(id) => write!(f, "tournament {id}"),
            Self::Phase { slug } => write!(f, "current phase of start.gg tournament {slug}"),
            Self::BracketTournament { slug } => write!(f, "start.gg tournament {slug}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DataFetchError {
    #[error(transparent)] Store(#[from] store::Error),
    #[error(transparent)] StartGG(#[from] startgg::Error),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("not a start.gg tournament URL: {0}")]
    MalformedBracketUrl(String),
    #[error(transparent)]
    DataFetch(#[from] DataFetchError),
    #[error("tournament {0} is in an invalid state: {1}")]
    InvalidTournamentState(TournamentId, &'static str),
}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Self {
        Self::DataFetch(DataFetchError::Store(e))
    }
}

impl From<startgg::Error> for Error {
    fn from(e: startgg::Error) -> Self {
        match e {
            startgg::Error::TournamentNotFound(slug) => Self::NotFound(Entity::BracketTournament { slug }),
            startgg::Error::PhaseNotFound(slug) => Self::NotFound(Entity::Phase { slug }),
            e => Self::DataFetch(DataFetchError::StartGG(e)),
        }
    }
}

/// Distinguishes transient failures worth retrying from permanent ones.
pub(crate) trait IsNetworkError {
    fn is_network_error(&self) -> bool;
}

impl IsNetworkError for Error {
    fn is_network_error(&self) -> bool {
        match self {
            Self::DataFetch(DataFetchError::Store(e)) => e.is_network_error(),
            Self::DataFetch(DataFetchError::StartGG(e)) => e.is_network_error(),
            Self::NotFound(_) | Self::MalformedBracketUrl(_) | Self::InvalidTournamentState(..) => false,
        }
    }
}

/// A side effect that failed without affecting the primary result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct Warning(pub(crate) String);

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful result along with any best-effort side effects that failed.
#[derive(Debug)]
pub(crate) struct Warned<T> {
    pub(crate) value: T,
    pub(crate) warnings: Vec<Warning>,
}

impl<T> Warned<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value, warnings: Vec::default() }
    }

    /// Logs the failure and records it as a warning.
    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(Warning(message));
    }
}
