use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, SyncError};

const DEFAULT_DB_PATH: &str = "./ecommunity.db";
const DEFAULT_SYNC_DIR: &str = "sync/";
const DEFAULT_BASE_PATH: &str = "http://localhost:3000/static/";
const DEFAULT_POLLING_RATE_MS: u64 = 5000;

/// Immutable settings handed to the synchronizer at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// SQLite database holding the grade/course/text_class tables.
    pub db_path: String,
    /// Root directory for processed documents and localized assets.
    /// Always ends with `/` after [`SyncConfig::normalized`].
    pub sync_dir: String,
    /// Public URL prefix the static file server maps onto `{sync_dir}assets/`.
    /// Always ends with `/` after [`SyncConfig::normalized`].
    pub base_path: String,
    pub polling_rate_ms: u64,
    /// Sent as `User-Agent` on every outbound fetch.
    #[serde(default)]
    pub user_agent: String,
}

/// Values supplied on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<String>,
    pub sync_dir: Option<String>,
    pub base_path: Option<String>,
    pub polling_rate_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
            sync_dir: DEFAULT_SYNC_DIR.into(),
            base_path: DEFAULT_BASE_PATH.into(),
            polling_rate_ms: DEFAULT_POLLING_RATE_MS,
            user_agent: String::new(),
        }
    }
}

impl SyncConfig {
    /// Layered load: defaults, optional config file, `MDSYNC_*` environment,
    /// then command-line overrides.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let config_path =
            std::env::var("MDSYNC_CONFIG").unwrap_or_else(|_| "mdsync".to_string());

        let settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("sync_dir", DEFAULT_SYNC_DIR)?
            .set_default("base_path", DEFAULT_BASE_PATH)?
            .set_default("polling_rate_ms", DEFAULT_POLLING_RATE_MS as i64)?
            .set_default("user_agent", "")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("MDSYNC"))
            .set_override_option("db_path", overrides.db_path)?
            .set_override_option("sync_dir", overrides.sync_dir)?
            .set_override_option("base_path", overrides.base_path)?
            .set_override_option("polling_rate_ms", overrides.polling_rate_ms.map(|v| v as i64))?
            .set_override_option("user_agent", overrides.user_agent)?
            .build()?;

        let cfg: SyncConfig = settings.try_deserialize()?;
        cfg.normalized()
    }

    /// Append the trailing slashes every path join relies on and reject a
    /// zero polling rate.
    pub fn normalized(mut self) -> Result<Self> {
        if self.polling_rate_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "polling_rate_ms must be greater than zero".into(),
            ));
        }
        ensure_trailing_slash(&mut self.sync_dir);
        ensure_trailing_slash(&mut self.base_path);
        Ok(self)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_rate_ms)
    }
}

fn ensure_trailing_slash(s: &mut String) {
    if !s.ends_with('/') {
        s.push('/');
    }
}
