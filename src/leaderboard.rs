use {
    std::{
        cmp::Reverse,
        collections::hash_map,
    },
    crate::prelude::*,
};

/// Score of a prediction that has not been scored yet.
pub(crate) const UNSCORED: i32 = -1;

const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone)]
pub(crate) struct Prediction {
    #[allow(dead_code)] // identifies the row, not read by the ranking
    pub(crate) id: PredictionId,
    pub(crate) user_id: UserId,
    pub(crate) score: Option<i32>,
    pub(crate) created_at: DateTime<Utc>,
    /// The owner's display name from their profile.
    pub(crate) username: Option<String>,
}

impl Prediction {
    fn points(&self) -> Option<i32> {
        self.score.filter(|&score| score != UNSCORED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LeaderboardEntry {
    pub(crate) rank: usize,
    pub(crate) username: String,
    pub(crate) points: i32,
    pub(crate) user_id: UserId,
}

/// Reduces all of a tournament's predictions to a ranked leaderboard.
///
/// Only each user's most recent prediction counts, and it only appears if it has been scored.
/// Equal scores get sequential ranks in the order their users first appear in the input.
pub(crate) fn build_leaderboard(predictions: impl IntoIterator<Item = Prediction>) -> Vec<LeaderboardEntry> {
    let mut latest = Vec::<Prediction>::default();
    let mut positions = HashMap::<UserId, usize>::default();
    for prediction in predictions {
        match positions.entry(prediction.user_id) {
            hash_map::Entry::Occupied(entry) => {
                let current = &mut latest[*entry.get()];
                // on identical timestamps the earlier row is kept
                if prediction.created_at > current.created_at {
                    *current = prediction;
                }
            }
            hash_map::Entry::Vacant(entry) => {
                entry.insert(latest.len());
                latest.push(prediction);
            }
        }
    }
    let mut scored = latest.into_iter()
        .filter_map(|prediction| Some((prediction.points()?, prediction)))
        .collect::<Vec<_>>();
    scored.sort_by_key(|&(points, _)| Reverse(points));
    scored.into_iter()
        .enumerate()
        .map(|(idx, (points, prediction))| LeaderboardEntry {
            rank: idx + 1,
            username: prediction.username.filter(|username| !username.trim().is_empty()).unwrap_or_else(|| ANONYMOUS.to_owned()),
            points,
            user_id: prediction.user_id,
        })
        .collect()
}

/// Fetches a tournament's predictions and ranks them.
pub(crate) async fn leaderboard(store: &dyn Store, tournament: TournamentId) -> Result<Vec<LeaderboardEntry>, Error> {
    if store.tournament(tournament).await?.is_none() {
        return Err(Error::NotFound(Entity::Tournament(tournament)))
    }
    let predictions = store.predictions(tournament).await?;
    Ok(build_leaderboard(predictions))
}
