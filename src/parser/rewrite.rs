use std::collections::HashMap;

use regex::{Captures, Regex};

/// Replace every mapping key in `text` with its value in a single pass.
///
/// Matches never overlap, the longest key wins at a given position, and
/// replaced text is never scanned again, so `a -> b, b -> c` turns `a` into
/// `b`, not `c`.
pub fn rewrite(text: &str, mapping: &HashMap<String, String>) -> String {
    let mut keys: Vec<&str> = mapping
        .keys()
        .map(String::as_str)
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return text.to_string();
    }

    // Leftmost-first alternation becomes leftmost-longest once longer keys
    // are tried first.
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(error = %e, keys = keys.len(), "Falling back to per-key replacement");
            return rewrite_sequential(text, &keys, mapping);
        }
    };

    re.replace_all(text, |caps: &Captures| {
        mapping
            .get(&caps[0])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Used only when the combined pattern exceeds the regex size limit.
/// Walks the text once, trying keys longest first at every position.
fn rewrite_sequential(text: &str, keys: &[&str], mapping: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match keys.iter().find(|k| rest.starts_with(**k)) {
            Some(key) => {
                out.push_str(&mapping[*key]);
                rest = &rest[key.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}
