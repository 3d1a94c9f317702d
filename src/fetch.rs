use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Result, SyncError};

/// Outbound GET used for every localized resource.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and return the full body. Non-success statuses are errors.
    async fn get(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Production fetcher: one pooled client, a fixed `User-Agent` header and no
/// timeout beyond the client defaults.
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        Ok(Self::with_client(Client::builder().build()?, user_agent))
    }

    pub fn with_client(http: Client, user_agent: &str) -> Self {
        Self {
            http,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(%url, "GET");
        let res = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(res.bytes().await?.to_vec())
    }
}
