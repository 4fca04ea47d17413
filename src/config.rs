use {
    sqlx::{
        ConnectOptions as _,
        postgres::PgConnectOptions,
    },
    crate::prelude::*,
};
#[cfg(unix)] use xdg::BaseDirectories;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Io(#[from] std::io::Error),
    #[error(transparent)] Json(#[from] serde_json::Error),
    #[cfg(unix)]
    #[error("missing config file")]
    Missing,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    /// start.gg API token.
    pub(crate) startgg: String,
    /// Bearer key for the admin endpoints. Admin endpoints are disabled if this is missing.
    #[serde(default)]
    pub(crate) admin_api_key: Option<String>,
    #[serde(default)]
    pub(crate) database: Option<ConfigDatabase>,
    #[serde(default = "default_sync_interval_secs")]
    pub(crate) sync_interval_secs: u64,
}

fn default_sync_interval_secs() -> u64 { 5 * 60 }

impl Config {
    pub(crate) async fn load() -> Result<Self, Error> {
        #[cfg(unix)] {
            if let Some(config_path) = BaseDirectories::new().find_config_file(Environment::default().config_file_name()) {
                Self::parse(&tokio::fs::read(config_path).await?)
            } else {
                Err(Error::Missing)
            }
        }
        #[cfg(not(unix))] {
            Self::parse(&tokio::fs::read(format!("cfg/{}", Environment::default().config_file_name())).await?)
        }
    }

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(buf)?)
    }

    pub(crate) fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub(crate) fn db_options(&self) -> PgConnectOptions {
        let mut db_options = PgConnectOptions::default()
            .username("pickem")
            .database(Environment::default().database_name())
            .application_name("pickem-house")
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));
        if let Some(ref db_config) = self.database {
            if let Some(ref host) = db_config.host {
                db_options = db_options.host(host);
            }
            if let Some(port) = db_config.port {
                db_options = db_options.port(port);
            }
            if let Some(ref username) = db_config.username {
                db_options = db_options.username(username);
            }
            if let Some(ref password) = db_config.password {
                db_options = db_options.password(password);
            }
            if let Some(ref database) = db_config.database {
                db_options = db_options.database(database);
            }
        }
        db_options
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigDatabase {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
}
