use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use playerpulse::enrich::{self, DrainOptions, TranslationStage};
use playerpulse::providers::{OpenAiClient, OpenAiConfig};
use playerpulse::store::Db;
use playerpulse::util::env::{self, env_parse, preflight_check};

#[derive(Parser, Debug)]
#[command(
    name = "process-translation",
    version,
    about = "Drain the pending review translation backlog"
)]
struct Cli {
    /// Rows fetched per batch (default: TRANSLATION_BATCH_SIZE or 50)
    #[arg(long)]
    batch_size: Option<i64>,
    /// Stop after processing this many items
    #[arg(long)]
    max_items: Option<u64>,
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("process_translation");
    playerpulse::tracing::init_tracing("info")?;
    let cli = Cli::parse();

    if let Err(e) = preflight_check(
        "process-translation",
        &["OPENAI_API_KEY"],
        &[
            "DATABASE_URL",
            "DB_URL",
            "DB_MAX_CONNS",
            "OPENAI_BASE_URL",
            "OPENAI_MODEL",
            "TRANSLATION_BATCH_SIZE",
        ],
    ) {
        eprintln!("{e}");
        std::process::exit(2);
    }

    let database_url = resolve_database_url(cli.db_url)?;
    let db = Db::connect(&database_url, env_parse("DB_MAX_CONNS", 8u32)).await?;

    let model = OpenAiClient::new(OpenAiConfig::default())?;
    let stage = TranslationStage::new(Arc::new(db), Arc::new(model));
    let opts = DrainOptions {
        batch_size: cli
            .batch_size
            .unwrap_or_else(|| env_parse("TRANSLATION_BATCH_SIZE", 50i64)),
        max_items: cli.max_items,
    };

    let report = enrich::drain_stage(&stage, &opts).await?;
    println!(
        "[process-translation] processed={} succeeded={} failed={} stale={} store_errors={}",
        report.processed, report.succeeded, report.failed, report.stale, report.store_errors
    );
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
