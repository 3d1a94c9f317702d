use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Relative link without a base: {0}")]
    RelativeLink(String),

    #[error("Unsupported scheme in {0}")]
    UnsupportedScheme(String),

    #[error("HTML rewrite failed: {0}")]
    Html(String),
}

impl SyncError {
    /// Adapter for `map_err` that tags an I/O error with the path involved.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> SyncError {
        let path = path.as_ref().to_path_buf();
        move |source| SyncError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
