use std::collections::HashMap;
use std::sync::LazyLock;

use lol_html::{element, rewrite_str, RewriteStrSettings};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::{normalize_link, store};
use crate::error::{Result, SyncError};
use crate::fetch::Fetch;
use crate::layout::{resource_name, DocumentLayout};

const STYLESHEET_SELECTOR: &str = r#"link[rel="stylesheet"]"#;
const IMAGE_SELECTOR: &str = "img";

static STYLESHEET_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(STYLESHEET_SELECTOR).unwrap());
static IMAGE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(IMAGE_SELECTOR).unwrap());

/// Position of a matched element: the n-th stylesheet link or the n-th
/// image, counting every match whether or not it carries the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Stylesheet(usize),
    Image(usize),
}

impl Slot {
    fn suffix(self) -> &'static str {
        match self {
            Slot::Stylesheet(_) => "_style.css",
            Slot::Image(_) => "_image",
        }
    }
}

/// A stylesheet or image reference found in a scraped page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Embedded {
    slot: Slot,
    /// Attribute value with character references decoded.
    value: String,
}

/// Fetch an HTML page, localize its stylesheets and images into a
/// `_resources/` sibling directory, and save the rewritten page.
pub(super) async fn localize_page<F: Fetch>(
    fetcher: &F,
    layout: &DocumentLayout,
    url: &Url,
) -> Result<String> {
    let body = fetcher.get(url).await?;
    let html = String::from_utf8_lossy(&body).into_owned();

    let name = resource_name(url);
    let resources = layout.page_resources(&name);

    // Rewrites are keyed by element position, so the value the rewriter
    // reads back never has to match the decoded one. `by_value` and `by_url`
    // let repeats and different spellings of one resource share a download.
    let mut rewrites: HashMap<Slot, String> = HashMap::new();
    let mut by_value: HashMap<String, String> = HashMap::new();
    let mut by_url: HashMap<Url, String> = HashMap::new();
    let mut count = 0usize;

    for embedded in collect_embedded(&html) {
        if let Some(done) = by_value.get(&embedded.value) {
            rewrites.insert(embedded.slot, done.clone());
            continue;
        }
        let target_url = match normalize_link(&embedded.value, Some(url)) {
            Ok(u) => u,
            Err(SyncError::UnsupportedScheme(link)) => {
                debug!(%link, "Skipping non-http page resource");
                continue;
            }
            Err(e) => {
                warn!(page = %url, error = %e, "Skipping page resource");
                continue;
            }
        };
        if let Some(done) = by_url.get(&target_url) {
            rewrites.insert(embedded.slot, done.clone());
            by_value.insert(embedded.value, done.clone());
            continue;
        }

        let bytes = match fetcher.get(&target_url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(page = %url, resource = %target_url, error = %e, "Unable to download page resource");
                continue;
            }
        };
        let target = resources.file(&format!("{count}{}", embedded.slot.suffix()));
        count += 1;
        if let Err(e) = store(&target.path, &bytes).await {
            warn!(page = %url, error = %e, "Unable to save page resource");
            continue;
        }
        debug!(resource = %target_url, path = %target.path.display(), "Page resource saved");

        by_url.insert(target_url, target.url.clone());
        by_value.insert(embedded.value, target.url.clone());
        rewrites.insert(embedded.slot, target.url);
    }

    let target = layout.page(&name);
    match rewrite_embedded(&html, &rewrites)? {
        Some(page_html) => store(&target.path, page_html.as_bytes()).await?,
        // Nothing to point elsewhere: keep the page exactly as served.
        None => store(&target.path, &body).await?,
    }
    info!(
        class_id = layout.class_id,
        %url,
        resources = count,
        path = %target.path.display(),
        "Web page saved"
    );
    Ok(target.url)
}

/// Stylesheets first, then images, each in document order.
fn collect_embedded(html: &str) -> Vec<Embedded> {
    let doc = Html::parse_document(html);
    let stylesheets = doc
        .select(&STYLESHEET_SEL)
        .enumerate()
        .map(|(n, el)| (Slot::Stylesheet(n), el.value().attr("href")));
    let images = doc
        .select(&IMAGE_SEL)
        .enumerate()
        .map(|(n, el)| (Slot::Image(n), el.value().attr("src")));

    stylesheets
        .chain(images)
        .filter_map(|(slot, v)| {
            let value = v?.trim();
            (!value.is_empty()).then(|| Embedded {
                slot,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Point every localized `href`/`src` at its servable URL; everything else
/// in the page is left byte for byte. `None` when there is nothing to change.
///
/// Elements are counted per selector in the same order `collect_embedded`
/// enumerates them.
fn rewrite_embedded(html: &str, rewrites: &HashMap<Slot, String>) -> Result<Option<String>> {
    if rewrites.is_empty() {
        return Ok(None);
    }

    let mut sheets = 0usize;
    let mut images = 0usize;
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(STYLESHEET_SELECTOR, |el| {
                    let slot = Slot::Stylesheet(sheets);
                    sheets += 1;
                    if let Some(new) = rewrites.get(&slot) {
                        el.set_attribute("href", new)?;
                    }
                    Ok(())
                }),
                element!(IMAGE_SELECTOR, |el| {
                    let slot = Slot::Image(images);
                    images += 1;
                    if let Some(new) = rewrites.get(&slot) {
                        el.set_attribute("src", new)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map(Some)
    .map_err(|e| SyncError::Html(e.to_string()))
}
