use std::future::Future;
use std::path::Path;

use indicatif::ProgressBar;
use rusqlite::Connection;
use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::db::{self, PendingDocument};
use crate::error::{Result, SyncError};
use crate::fetch::Fetch;
use crate::layout::DocumentLayout;
use crate::localizer::{store, DocumentLocalizer};
use crate::parser::{extract_links, rewrite};

/// Outcome of one discovery-plus-processing cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub discovered: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Polls the store and localizes every newly uploaded document.
///
/// One instance is one worker: documents and their links are handled
/// strictly one after another, and passes never overlap.
pub struct Synchronizer<F: Fetch> {
    config: SyncConfig,
    conn: Connection,
    fetcher: F,
}

impl<F: Fetch> Synchronizer<F> {
    pub fn new(config: SyncConfig, conn: Connection, fetcher: F) -> Self {
        Self {
            config,
            conn,
            fetcher,
        }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run passes on a fixed period until `shutdown` resolves. Returns the
    /// number of passes run.
    ///
    /// The first pass starts one period after the call. Ticks that come due
    /// while a pass is running collapse into a single pending tick, so a slow
    /// pass delays the next one instead of stacking them. `shutdown` is only
    /// observed between passes; a running pass always finishes.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> usize {
        let period = self.config.polling_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            polling_rate_ms = self.config.polling_rate_ms,
            sync_dir = %self.config.sync_dir,
            "Starting synchronizer"
        );

        tokio::pin!(shutdown);
        let mut passes = 0usize;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(passes, "Synchronizer stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pass().await;
                    passes += 1;
                }
            }
        }
        passes
    }

    pub async fn run_pass(&self) -> PassReport {
        self.run_pass_with(&ProgressBar::hidden()).await
    }

    /// One pass: discover pending documents, then process each in turn. A
    /// failing document is logged and left for a later pass.
    pub async fn run_pass_with(&self, pb: &ProgressBar) -> PassReport {
        info!("Pulling pending documents");
        let pending = match db::fetch_pending(&self.conn) {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Unable to query pending documents");
                return PassReport::default();
            }
        };

        let mut report = PassReport {
            discovered: pending.len(),
            ..PassReport::default()
        };
        pb.set_length(pending.len() as u64);

        for doc in &pending {
            info!(class_id = doc.class_id, source = %doc.source_path, "Processing file");
            match self.process_document(doc).await {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    error!(class_id = doc.class_id, error = %e, "Unable to process document");
                    report.failed += 1;
                }
            }
            pb.inc(1);
        }

        if report.discovered > 0 {
            info!(
                discovered = report.discovered,
                processed = report.processed,
                failed = report.failed,
                "Pass finished"
            );
        }
        report
    }

    /// Localize one document and record it. The processed file is written
    /// before the store is updated; if either step fails the document stays
    /// pending. Returns the processed file path.
    pub async fn process_document(&self, doc: &PendingDocument) -> Result<String> {
        let markdown = tokio::fs::read_to_string(&doc.source_path)
            .await
            .map_err(SyncError::io(&doc.source_path))?;

        let layout = DocumentLayout::new(&self.config, doc);
        let mut localizer = DocumentLocalizer::new(&self.fetcher, &layout);
        for link in extract_links(&markdown) {
            if let Err(e) = localizer.localize(&link.url).await {
                warn!(class_id = doc.class_id, link = %link.raw, error = %e, "Link left unchanged");
            }
        }

        let processed = rewrite(&markdown, &localizer.into_mapping());
        store(Path::new(&layout.processed_path), processed.as_bytes()).await?;
        info!(class_id = doc.class_id, path = %layout.processed_path, "Saved processed file");

        let updated = db::mark_processed(&self.conn, doc.class_id, &layout.processed_path)?;
        if updated != 1 {
            warn!(class_id = doc.class_id, rows = updated, "Unable to update text class");
        }
        Ok(layout.processed_path)
    }
}
