//! Download linked resources and hand back the URLs that replace them.

mod page;

use std::collections::HashMap;
use std::path::Path;

use tracing::info;
use url::Url;

use crate::error::{Result, SyncError};
use crate::fetch::Fetch;
use crate::layout::{resource_name, DocumentLayout, ResourceKind};

/// Localizes the links of one document during one pass.
///
/// The `link -> servable URL` mapping lives exactly as long as this value;
/// nothing is shared between documents or passes.
pub struct DocumentLocalizer<'a, F: Fetch> {
    fetcher: &'a F,
    layout: &'a DocumentLayout,
    mapping: HashMap<String, String>,
}

impl<'a, F: Fetch> DocumentLocalizer<'a, F> {
    pub fn new(fetcher: &'a F, layout: &'a DocumentLayout) -> Self {
        Self {
            fetcher,
            layout,
            mapping: HashMap::new(),
        }
    }

    /// Fetch and store `raw_link` (as written in the markdown) and return the
    /// URL it should be rewritten to. A link seen earlier in this pass is
    /// answered from the mapping without fetching again.
    ///
    /// On error nothing is recorded and the link stays as it was.
    pub async fn localize(&mut self, raw_link: &str) -> Result<String> {
        if let Some(done) = self.mapping.get(raw_link) {
            return Ok(done.clone());
        }

        let url = normalize_link(raw_link, None)?;
        let servable = match ResourceKind::classify(&url) {
            ResourceKind::Page => page::localize_page(self.fetcher, self.layout, &url).await?,
            ResourceKind::Asset => self.localize_asset(&url).await?,
        };

        self.mapping.insert(raw_link.to_string(), servable.clone());
        Ok(servable)
    }

    async fn localize_asset(&self, url: &Url) -> Result<String> {
        let body = self.fetcher.get(url).await?;
        let target = self.layout.asset(&resource_name(url));
        store(&target.path, &body).await?;
        info!(class_id = self.layout.class_id, %url, path = %target.path.display(), "Resource saved");
        Ok(target.url)
    }

    #[cfg(test)]
    pub fn mapping(&self) -> &HashMap<String, String> {
        &self.mapping
    }

    pub fn into_mapping(self) -> HashMap<String, String> {
        self.mapping
    }
}

/// Turn a link into an absolute http(s) URL.
///
/// `//host/x` is protocol-relative and gets `https:`. Relative links need a
/// `base`; markdown documents have none, scraped pages pass their own URL.
pub(crate) fn normalize_link(raw: &str, base: Option<&Url>) -> Result<Url> {
    let link = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };

    let url = match Url::parse(&link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(&link).map_err(|source| SyncError::InvalidUrl {
                url: link.clone(),
                source,
            })?,
            None => return Err(SyncError::RelativeLink(link)),
        },
        Err(source) => return Err(SyncError::InvalidUrl { url: link, source }),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(SyncError::UnsupportedScheme(link)),
    }
}

/// Write `bytes` to `path`, creating parent directories on first use.
pub(crate) async fn store(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(SyncError::io(parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(SyncError::io(path))
}
