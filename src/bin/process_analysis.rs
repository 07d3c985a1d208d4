use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use playerpulse::enrich::{self, DrainOptions, ReviewAnalysisStage, VideoAnalysisStage};
use playerpulse::providers::{ChatModel, OpenAiClient, OpenAiConfig};
use playerpulse::store::Db;
use playerpulse::util::env::{self, env_opt, env_parse, preflight_check};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Reviews,
    Videos,
}

#[derive(Parser, Debug)]
#[command(
    name = "process-analysis",
    version,
    about = "Drain pending review and video analysis backlogs"
)]
struct Cli {
    /// Rows fetched per batch (default: ANALYSIS_BATCH_SIZE or 20)
    #[arg(long)]
    batch_size: Option<i64>,
    /// Stop each stage after processing this many items
    #[arg(long)]
    max_items: Option<u64>,
    /// Restrict to one content kind (reviews | videos)
    #[arg(long)]
    kind: Option<String>,
    /// Game the videos are analyzed against (default: GAME_NAME)
    #[arg(long)]
    game_name: Option<String>,
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("process_analysis");
    playerpulse::tracing::init_tracing("info")?;
    let cli = Cli::parse();

    if let Err(e) = preflight_check(
        "process-analysis",
        &["OPENAI_API_KEY"],
        &[
            "DATABASE_URL",
            "DB_URL",
            "DB_MAX_CONNS",
            "OPENAI_BASE_URL",
            "OPENAI_MODEL",
            "ANALYSIS_BATCH_SIZE",
            "GAME_NAME",
        ],
    ) {
        eprintln!("{e}");
        std::process::exit(2);
    }

    let kind = match cli.kind.as_deref() {
        Some("reviews") => Some(ContentKind::Reviews),
        Some("videos") => Some(ContentKind::Videos),
        Some(other) => bail!("unknown --kind {other:?}; expected reviews or videos"),
        None => None,
    };
    let run_reviews = kind != Some(ContentKind::Videos);
    let run_videos = kind != Some(ContentKind::Reviews);

    let game_name = cli.game_name.or_else(|| env_opt("GAME_NAME"));
    if run_videos && game_name.is_none() {
        eprintln!("GAME_NAME must be set (or --game-name passed) to analyze videos");
        std::process::exit(2);
    }

    let database_url = resolve_database_url(cli.db_url)?;
    let db = Db::connect(&database_url, env_parse("DB_MAX_CONNS", 8u32)).await?;

    let model: Arc<dyn ChatModel> = Arc::new(OpenAiClient::new(OpenAiConfig::default())?);
    let opts = DrainOptions {
        batch_size: cli
            .batch_size
            .unwrap_or_else(|| env_parse("ANALYSIS_BATCH_SIZE", 20i64)),
        max_items: cli.max_items,
    };

    if run_reviews {
        let stage = ReviewAnalysisStage::new(Arc::new(db.clone()), model.clone());
        let report = enrich::drain_stage(&stage, &opts).await?;
        println!(
            "[process-analysis] reviews: processed={} succeeded={} failed={} stale={} store_errors={}",
            report.processed, report.succeeded, report.failed, report.stale, report.store_errors
        );
    }
    if run_videos {
        let game = game_name.unwrap_or_default();
        let stage = VideoAnalysisStage::new(Arc::new(db.clone()), model.clone(), game);
        let report = enrich::drain_stage(&stage, &opts).await?;
        println!(
            "[process-analysis] videos: processed={} succeeded={} failed={} stale={} store_errors={}",
            report.processed, report.succeeded, report.failed, report.stale, report.store_errors
        );
    }
    Ok(())
}

fn resolve_database_url(db_url: Option<String>) -> Result<String> {
    if let Some(url) = db_url {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let env_url = env::db_url().with_context(|| "resolve_database_url: missing database URL")?;
    let trimmed = env_url.trim();
    if trimmed.is_empty() {
        bail!("database URL is empty; set DATABASE_URL / DB_URL / DB_* parts or pass --db-url");
    }
    Ok(trimmed.to_string())
}
