use crate::prelude::*;

/// Lifecycle state of a tournament.
///
/// The `status` column is a cache of [`crate::status::derive_status`]; see that module for how drift is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TournamentStatus {
    Upcoming,
    Active,
    Completed,
}

impl TournamentStatus {
    /// Parses the stored column value. Anything unrecognised counts as drift and yields `None`.
    pub(crate) fn from_column(value: &str) -> Option<Self> {
        serde_plain::from_str(value).ok()
    }

    pub(crate) fn as_column(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_column())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tournament {
    pub(crate) id: TournamentId,
    pub(crate) name: String,
    #[allow(dead_code)] // stored for the frontend, not read by the reconciler
    pub(crate) start_time: Option<DateTime<Utc>>,
    /// Predictions close at this instant. `None` means the row is malformed.
    pub(crate) cutoff_time: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    pub(crate) end_time: Option<DateTime<Utc>>,
    /// Cached lifecycle state, `None` if the column holds an unknown value.
    pub(crate) status: Option<TournamentStatus>,
    #[allow(dead_code)] // toggled by admins
    pub(crate) predictions_open: bool,
    /// Visibility flag, independent of `status`.
    pub(crate) active: bool,
    pub(crate) startgg_url: Option<String>,
    pub(crate) current_phase: Option<String>,
    pub(crate) phase_last_checked: Option<DateTime<Utc>>,
    pub(crate) total_remaining_participants: Option<i64>,
    #[allow(dead_code)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// The cached phase fields, if a phase check has ever succeeded.
    pub(crate) fn cached_phase(&self) -> Option<PhaseStatus> {
        Some(PhaseStatus {
            current_phase: self.current_phase.clone()?,
            phase_last_checked: self.phase_last_checked?,
            active_entrant_count: self.total_remaining_participants.unwrap_or_default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn dummy(name: &str, cutoff_time: DateTime<Utc>) -> Self {
        Self {
            id: TournamentId::new(),
            name: name.to_owned(),
            start_time: Some(cutoff_time),
            cutoff_time: Some(cutoff_time),
            end_time: None,
            status: Some(TournamentStatus::Upcoming),
            predictions_open: true,
            active: true,
            startgg_url: None,
            current_phase: None,
            phase_last_checked: None,
            total_remaining_participants: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhaseStatus {
    pub(crate) current_phase: String,
    pub(crate) phase_last_checked: DateTime<Utc>,
    pub(crate) active_entrant_count: i64,
}
