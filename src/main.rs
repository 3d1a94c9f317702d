mod config;
mod db;
mod error;
mod fetch;
mod layout;
mod localizer;
mod parser;
mod sync;
#[cfg(test)]
mod testing;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::{Overrides, SyncConfig};
use crate::fetch::HttpFetcher;
use crate::sync::Synchronizer;

#[derive(Parser)]
#[command(
    name = "mdsync",
    about = "Localize the resources linked from uploaded text classes"
)]
struct Cli {
    /// SQLite database path
    #[arg(short = 'D', long = "db", global = true)]
    db: Option<String>,
    /// Directory holding uploads, processed files and assets
    #[arg(long = "dir", global = true)]
    dir: Option<String>,
    /// Polling rate in milliseconds
    #[arg(short = 'p', long, global = true)]
    polling_rate: Option<u64>,
    /// Public URL prefix for localized assets
    #[arg(short = 'b', long, global = true)]
    base_path: Option<String>,
    /// User-Agent sent with every download
    #[arg(short = 'A', long, global = true)]
    user_agent: Option<String>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the database forever (default)
    Run,
    /// Run a single pass and exit
    Once,
    /// Create the grade/course/text_class tables if missing
    Init,
    /// List documents waiting to be processed
    Pending,
    /// Clear a document's processed path so the next pass redoes it
    Requeue {
        class_id: i64,
    },
    /// Show processing statistics
    Stats,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            db_path: self.db.clone(),
            sync_dir: self.dir.clone(),
            base_path: self.base_path.clone(),
            polling_rate_ms: self.polling_rate,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = SyncConfig::load(cli.overrides()).context("Failed to load configuration")?;
    let conn = db::connect(&cfg.db_path)
        .with_context(|| format!("Failed to open database {}", cfg.db_path))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!(resource = "mdsync", dir = %cfg.sync_dir, base = %cfg.base_path, "Initializing resource");
            let fetcher = HttpFetcher::new(&cfg.user_agent)?;
            let sync = Synchronizer::new(cfg, conn, fetcher);
            sync.run_until(shutdown_signal()).await;
        }
        Commands::Once => {
            let fetcher = HttpFetcher::new(&cfg.user_agent)?;
            let sync = Synchronizer::new(cfg, conn, fetcher);

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} documents")?
                    .progress_chars("=> "),
            );
            let report = sync.run_pass_with(&pb).await;
            pb.finish_and_clear();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Done: {} discovered ({} processed, {} failed).",
                    report.discovered, report.processed, report.failed
                );
            }
        }
        Commands::Init => {
            db::init_schema(&conn)?;
            println!("Schema ready in {}", cfg.db_path);
        }
        Commands::Pending => {
            let rows = db::fetch_pending(&conn)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No pending documents.");
                return Ok(());
            }
            println!("{:>6} | {:>6} | {:>6} | Source", "Class", "Course", "Grade");
            println!("{}", "-".repeat(60));
            for r in &rows {
                println!(
                    "{:>6} | {:>6} | {:>6} | {}",
                    r.class_id, r.course_id, r.grade_id, r.source_path
                );
            }
            println!("\n{} pending", rows.len());
        }
        Commands::Requeue { class_id } => {
            if db::requeue(&conn, class_id)? == 0 {
                bail!("No text class with id {class_id}");
            }
            println!("Text class {class_id} queued for the next pass.");
        }
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&s)?);
            } else {
                println!("Total:       {}", s.total);
                println!("With source: {}", s.with_source);
                println!("Processed:   {}", s.processed);
                println!("Pending:     {}", s.pending);
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
