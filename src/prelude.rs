pub(crate) use {
    std::{
        collections::HashMap,
        fmt,
        sync::Arc,
        time::Duration,
    },
    chrono::prelude::*,
    serde::{
        Deserialize,
        Serialize,
    },
    tokio::time::{
        Instant,
        sleep,
        sleep_until,
    },
    crate::{
        Environment,
        config::Config,
        error::{
            Entity,
            Error,
            IsNetworkError,
            Warned,
            Warning,
        },
        id::{
            PredictionId,
            TournamentId,
            UserId,
        },
        store::Store,
        startgg::BracketProvider,
        tournament::{
            PhaseStatus,
            Tournament,
            TournamentStatus,
        },
    },
};
