use {
    clap::Parser as _,
    futures::future::FutureExt as _,
    rocket::Rocket,
    sqlx::postgres::PgPoolOptions,
    crate::{
        prelude::*,
        startgg::StartGG,
        store::PgStore,
    },
};

mod config;
mod error;
mod http;
mod id;
mod leaderboard;
mod phase;
mod prelude;
mod startgg;
mod status;
mod store;
mod tournament;

/// Upper bound for the retry delay of the sync loop after network errors.
const MAX_BACKOFF: Duration = Duration::from_secs(10 * 60);

#[allow(unused)] // variants only constructed under conditional compilation
#[derive(Default, Clone, Copy)]
pub(crate) enum Environment {
    #[cfg_attr(any(feature = "production", not(any(feature = "dev", feature = "local", debug_assertions))), default)]
    Production,
    #[cfg_attr(any(feature = "dev", all(debug_assertions, not(feature = "production"), not(feature = "local"))), default)]
    Dev,
    #[cfg_attr(feature = "local", default)]
    Local,
}

impl Environment {
    fn is_dev(&self) -> bool {
        match self {
            Self::Production => false,
            Self::Dev => true,
            Self::Local => true,
        }
    }

    fn config_file_name(&self) -> &'static str {
        if self.is_dev() { "pickem-house-dev.json" } else { "pickem-house.json" }
    }

    fn database_name(&self) -> &'static str {
        if self.is_dev() { "pickem_house_dev" } else { "pickem_house" }
    }

    fn default_port(&self) -> u16 {
        if self.is_dev() { 24822 } else { 24820 }
    }
}

fn parse_port(arg: &str) -> Result<u16, std::num::ParseIntError> {
    match arg {
        "production" => Ok(Environment::Production.default_port()),
        "dev" => Ok(Environment::Dev.default_port()),
        _ => arg.parse(),
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Recompute every tournament's status, correct drifted rows, and print a report
    FixStatuses,
    /// Print the current phase of a start.gg tournament
    Phase {
        bracket_url: String,
    },
}

#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    #[clap(long, value_parser = parse_port)]
    port: Option<u16>,
    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Config(#[from] config::Error),
    #[error(transparent)] Core(#[from] error::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Rocket(#[from] rocket::Error),
    #[error(transparent)] Sql(#[from] sqlx::Error),
    #[error(transparent)] Task(#[from] tokio::task::JoinError),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let Args { port, subcommand } = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::load().await?;
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("PickemHouse/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .use_rustls_tls()
        .https_only(true)
        .build()?;
    let provider: Arc<dyn BracketProvider> = Arc::new(StartGG::new(http_client, config.startgg.clone()));
    match subcommand {
        Some(Subcommand::Phase { bracket_url }) => {
            let PhaseStatus { current_phase, phase_last_checked, active_entrant_count } = phase::fetch(&*provider, &bracket_url, &bracket_url, Utc::now()).await?;
            println!("{} {current_phase} ({active_entrant_count} entrants remaining)", phase_last_checked.format("%Y-%m-%d %H:%M:%S"));
        }
        Some(Subcommand::FixStatuses) => {
            let store = connect(&config).await?;
            let report = status::reconcile_all(&*store, Utc::now()).await?;
            println!("{} {report}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        }
        None => {
            let store = connect(&config).await?;
            let default_panic_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                log::error!("Thread panic: {info:?}");
                default_panic_hook(info)
            }));
            let rocket = http::rocket(
                Arc::clone(&store),
                Arc::clone(&provider),
                config.admin_api_key.clone(),
                port.unwrap_or_else(|| Environment::default().default_port()),
            ).ignite().await?;
            let sync_task = tokio::spawn(sync_manager(store, provider, config.sync_interval(), rocket.shutdown())).map(|res| match res {
                Ok(()) => Ok(()),
                Err(e) => Err(Error::Task(e)),
            });
            let rocket_task = tokio::spawn(rocket.launch()).map(|res| match res {
                Ok(Ok(Rocket { .. })) => Ok(()),
                Ok(Err(e)) => Err(Error::from(e)),
                Err(e) => Err(Error::from(e)),
            });
            let ((), ()) = tokio::try_join!(sync_task, rocket_task)?;
        }
    }
    Ok(())
}

async fn connect(config: &Config) -> Result<Arc<dyn Store>, sqlx::Error> {
    let db_pool = PgPoolOptions::default()
        .max_connections(16)
        .connect_with(config.db_options())
        .await?;
    Ok(Arc::new(PgStore::new(db_pool)))
}

/// One pass of the background sync: correct tournament statuses, then refresh bracket phases.
async fn sync(store: &dyn Store, provider: &dyn BracketProvider) -> Result<(), error::Error> {
    let report = status::reconcile_all(store, Utc::now()).await?;
    if report.updated_count > 0 || !report.failures.is_empty() {
        log::info!("status sync: {report}");
    }
    let phase::RefreshReport { refreshed, failed } = phase::refresh_all(store, provider, Utc::now()).await?;
    log::debug!("phase sync: {refreshed} refreshed, {failed} failed");
    Ok(())
}

/// Background task keeping tournament statuses and phase caches current until shutdown.
async fn sync_manager(store: Arc<dyn Store>, provider: Arc<dyn BracketProvider>, interval: Duration, shutdown: rocket::Shutdown) {
    let mut wait_time = interval;
    loop {
        wait_time = match sync(&*store, &*provider).await {
            Ok(()) => interval,
            Err(e) if e.is_network_error() => {
                let wait_time = (wait_time * 2).min(MAX_BACKOFF).max(interval);
                log::warn!("failed to sync tournaments (retrying in {wait_time:?}): {e} ({e:?})");
                wait_time
            }
            Err(e) => {
                log::error!("failed to sync tournaments: {e} ({e:?})");
                interval
            }
        };
        tokio::select! {
            () = sleep(wait_time) => {}
            _ = shutdown.clone() => break,
        }
    }
}
