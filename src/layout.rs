//! Storage paths and servable URLs for one document.
//!
//! Every file a pass writes lives under `{sync_dir}assets/{mid}` and is
//! served at `{base_path}{mid}`, where `mid` is `{grade}/{course}/{class}/`.
//! Both sides are built from the same suffix, so the static file server can
//! map any rewritten link back to its file.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::SyncConfig;
use crate::db::PendingDocument;

/// How a link is localized, decided from its path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// No extension: fetched as HTML, with its stylesheets and images.
    Page,
    /// Stored byte for byte.
    Asset,
}

impl ResourceKind {
    /// Any dot in the last segment counts as an extension, so dot files
    /// (`.htaccess`) and trailing dots are assets.
    pub fn classify(url: &Url) -> Self {
        match last_segment(url) {
            Some(seg) if seg.contains('.') => ResourceKind::Asset,
            _ => ResourceKind::Page,
        }
    }
}

/// A file to write and the URL it will be served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub path: PathBuf,
    pub url: String,
}

/// Sibling directory holding a scraped page's stylesheets and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDir {
    pub dir: PathBuf,
    url_prefix: String,
}

impl ResourceDir {
    pub fn file(&self, file_name: &str) -> LocalTarget {
        LocalTarget {
            path: self.dir.join(file_name),
            url: format!("{}{}", self.url_prefix, file_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    pub class_id: i64,
    /// `{grade}/{course}/{class}/`
    pub mid: String,
    /// `{sync_dir}assets/{mid}`
    pub asset_dir: PathBuf,
    /// `{sync_dir}{mid}processed_{source file name}`, stored in the database.
    pub processed_path: String,
    base_path: String,
}

impl DocumentLayout {
    pub fn new(cfg: &SyncConfig, doc: &PendingDocument) -> Self {
        let mid = format!("{}/{}/{}/", doc.grade_id, doc.course_id, doc.class_id);
        let source_name = Path::new(&doc.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.md".to_string());

        Self {
            class_id: doc.class_id,
            asset_dir: PathBuf::from(format!("{}assets/{}", cfg.sync_dir, mid)),
            processed_path: format!("{}{}processed_{}", cfg.sync_dir, mid, source_name),
            base_path: cfg.base_path.clone(),
            mid,
        }
    }

    fn stem(&self, name: &str) -> String {
        format!("{}_{}", self.class_id, name)
    }

    /// `{asset_dir}{class}_{name}`, served at `{base}{mid}{class}_{name}`.
    pub fn asset(&self, name: &str) -> LocalTarget {
        let file = self.stem(name);
        LocalTarget {
            path: self.asset_dir.join(&file),
            url: format!("{}{}{}", self.base_path, self.mid, file),
        }
    }

    /// Same as [`asset`](Self::asset) with an `.html` suffix.
    pub fn page(&self, name: &str) -> LocalTarget {
        self.asset(&format!("{name}.html"))
    }

    pub fn page_resources(&self, name: &str) -> ResourceDir {
        let dir = format!("{}_resources/", self.stem(name));
        ResourceDir {
            dir: self.asset_dir.join(&dir),
            url_prefix: format!("{}{}{}", self.base_path, self.mid, dir),
        }
    }
}

fn last_segment(url: &Url) -> Option<&str> {
    url.path_segments()?.filter(|s| !s.is_empty()).last()
}

/// File-system-safe name for a remote resource: its last path segment, or
/// the host for bare origins.
pub fn resource_name(url: &Url) -> String {
    let raw = last_segment(url)
        .or_else(|| url.host_str())
        .unwrap_or("index");
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
