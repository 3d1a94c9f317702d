use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// `![alt](url)` is matched too: the leading `!` is simply outside the match.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]\((.*?)\)").unwrap());

/// One markdown link target found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// Target with any title suffix removed.
    pub url: String,
    /// Full text of the first match, e.g. `[img](https://x.com/a.png "A")`.
    pub raw: String,
}

/// Unique link targets of `markdown`, in first-occurrence order.
pub fn extract_links(markdown: &str) -> impl Iterator<Item = LinkReference> + '_ {
    let mut seen = HashSet::new();
    LINK_RE.captures_iter(markdown).filter_map(move |caps| {
        let target = caps.get(1)?.as_str();
        let url = target.split_whitespace().next()?;
        if !seen.insert(url.to_string()) {
            return None;
        }
        Some(LinkReference {
            url: url.to_string(),
            raw: caps[0].to_string(),
        })
    })
}
