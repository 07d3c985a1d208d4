use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use playerpulse::ingest::{
    self, FetchOptions, ReviewIngest, SourceIngest, VideoIngest, VideoIngestConfig,
};
use playerpulse::model::SourceKind;
use playerpulse::providers::{SteamConfig, SteamReviewsClient, SupadataClient, SupadataConfig};
use playerpulse::store::Db;
use playerpulse::util::env::{self, env_parse, env_parse_opt, preflight_check};

#[derive(Parser, Debug)]
#[command(
    name = "fetch",
    version,
    about = "Run one ingestion sweep over all active sources"
)]
struct Cli {
    /// Restrict the sweep to one source kind (steam-app | youtube-channel)
    #[arg(long)]
    kind: Option<String>,
    /// Floor the fetch window at now - N days regardless of watermarks
    #[arg(long)]
    max_age_days: Option<i64>,
    /// Override the number of candidate videos requested per channel
    #[arg(long)]
    channel_limit: Option<u32>,
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("fetch");
    playerpulse::tracing::init_tracing("info")?;
    let cli = Cli::parse();

    let _ = preflight_check(
        "fetch",
        &[],
        &[
            "DATABASE_URL",
            "DB_URL",
            "DB_MAX_CONNS",
            "STEAM_REVIEWS_BASE_URL",
            "STEAM_PAGE_SIZE",
            "STEAM_MAX_PAGES",
            "SUPADATA_BASE_URL",
            "SUPADATA_API_KEY",
            "CHANNEL_FETCH_LIMIT",
            "TRANSCRIPT_LANG",
            "FETCH_MAX_AGE_DAYS",
        ],
    );

    let kind = match cli.kind.as_deref() {
        Some(raw) => match SourceKind::parse(raw) {
            Some(k) => Some(k),
            None => bail!("unknown --kind {raw:?}; expected steam-app or youtube-channel"),
        },
        None => None,
    };

    let database_url = resolve_database_url(cli.db_url)?;
    let db = Db::connect(&database_url, env_parse("DB_MAX_CONNS", 8u32)).await?;

    let mut video_cfg = VideoIngestConfig::default();
    if let Some(limit) = cli.channel_limit {
        video_cfg.channel_limit = limit;
    }

    let steam = SteamReviewsClient::new(SteamConfig::default())?;
    let supadata = SupadataClient::new(SupadataConfig::default())?;
    let ingestors: Vec<Arc<dyn SourceIngest>> = vec![
        Arc::new(ReviewIngest::new(Arc::new(steam), Arc::new(db.clone()))),
        Arc::new(VideoIngest::new(
            Arc::new(supadata),
            Arc::new(db.clone()),
            video_cfg,
        )),
    ];

    let opts = FetchOptions {
        kind,
        max_age_days: cli
            .max_age_days
            .or_else(|| env_parse_opt("FETCH_MAX_AGE_DAYS")),
    };
    let summary = ingest::sweep(Arc::new(db), ingestors, &opts).await?;

    println!(
        "[fetch] sources ok={} failed={} | items fetched={} inserted={} skipped={} | transcripts fetched={} unavailable={} failed={}",
        summary.sources_ok,
        summary.sources_failed,
        summary.fetched,
        summary.inserted,
        summary.skipped,
        summary.transcripts_fetched,
        summary.transcripts_unavailable,
        summary.transcripts_failed
    );
    for (label, err) in &summary.failures {
        eprintln!("[fetch] {label} failed: {err}");
    }
    if !summary.is_ok() {
        std::process::exit(1);
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
