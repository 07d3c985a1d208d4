use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use playerpulse::model::{SourceKind, TrackedSource};
use playerpulse::providers::{ReviewProvider, SteamConfig, SteamReviewsClient};
use playerpulse::store::{Db, ReviewStore, SourceStore, VideoStore};
use playerpulse::util::env;

#[derive(Parser, Debug)]
#[command(name = "pulse", version, about = "PlayerPulse admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Register a source, or refresh the display name of an existing one
    AddSource {
        /// steam-app or youtube-channel
        kind: String,
        /// Steam app id or YouTube channel handle
        external_id: String,
        /// Display name (Steam apps default to the store's app name)
        #[arg(long)]
        display_name: Option<String>,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// List tracked sources with their fetch watermarks
    ListSources {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Enable or disable fetching for a source
    SetActive {
        /// steam-app or youtube-channel
        kind: String,
        external_id: String,
        /// true or false
        active: bool,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Per-status item counts for one source
    StatusCounts {
        /// steam-app or youtube-channel
        kind: String,
        external_id: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Reset a Steam source's failed translations back to pending
    RequeueTranslations {
        /// Steam app id
        external_id: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Reset a source's failed analyses back to pending
    RequeueAnalyses {
        /// steam-app or youtube-channel
        kind: String,
        external_id: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Apply pending schema migrations
    Migrate {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("pulse");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::AddSource {
            kind,
            external_id,
            display_name,
            db_url,
        } => {
            let kind = parse_kind(&kind)?;
            let db = connect(db_url).await?;
            let display = match display_name {
                Some(name) => name,
                None => default_display_name(kind, &external_id).await,
            };
            let id = db.ensure_source(kind, &external_id, &display).await?;
            println!("[pulse] source {kind}:{external_id} registered (id={id}, display name {display:?})");
        }
        Commands::ListSources { db_url } => {
            let db = connect(db_url).await?;
            let sources = db.list_sources().await?;
            if sources.is_empty() {
                println!("[pulse] no sources registered");
            }
            for s in sources {
                println!(
                    "{:>4}  {:<16} {:<28} active={:<5} last_fetched_ts={:<12} {}",
                    s.id, s.kind, s.external_id, s.active, s.last_fetched_ts, s.display_name
                );
            }
        }
        Commands::SetActive {
            kind,
            external_id,
            active,
            db_url,
        } => {
            let kind = parse_kind(&kind)?;
            let db = connect(db_url).await?;
            if !db.set_source_active(kind, &external_id, active).await? {
                bail!("no source {kind}:{external_id}");
            }
            println!("[pulse] {kind}:{external_id} active={active}");
        }
        Commands::StatusCounts {
            kind,
            external_id,
            db_url,
        } => {
            let kind = parse_kind(&kind)?;
            let db = connect(db_url).await?;
            let source = require_source(&db, kind, &external_id).await?;
            let counts = match kind {
                SourceKind::SteamApp => db.review_status_counts(source.id).await?,
                SourceKind::YoutubeChannel => db.video_status_counts(source.id).await?,
            };
            println!("[pulse] {kind}:{external_id} items={}", counts.items);
            print_counts("translation", &counts.translation);
            print_counts("transcript", &counts.transcript);
            print_counts("analysis", &counts.analysis);
        }
        Commands::RequeueTranslations {
            external_id,
            db_url,
        } => {
            let db = connect(db_url).await?;
            let source = require_source(&db, SourceKind::SteamApp, &external_id).await?;
            let n = db.requeue_failed_translations(source.id).await?;
            println!("[pulse] requeued {n} failed translations for steam_app:{external_id}");
        }
        Commands::RequeueAnalyses {
            kind,
            external_id,
            db_url,
        } => {
            let kind = parse_kind(&kind)?;
            let db = connect(db_url).await?;
            let source = require_source(&db, kind, &external_id).await?;
            let n = match kind {
                SourceKind::SteamApp => db.requeue_failed_review_analyses(source.id).await?,
                SourceKind::YoutubeChannel => db.requeue_failed_video_analyses(source.id).await?,
            };
            println!("[pulse] requeued {n} failed analyses for {kind}:{external_id}");
        }
        Commands::Migrate { db_url } => {
            let db = connect(db_url).await?;
            Db::run_migrations(&db.pool).await?;
            println!("[pulse] migrations up to date");
        }
    }
    Ok(())
}

/// Steam apps can be registered by id alone; ask the storefront for a name.
async fn default_display_name(kind: SourceKind, external_id: &str) -> String {
    if kind != SourceKind::SteamApp {
        return external_id.to_string();
    }
    let client = match SteamReviewsClient::new(SteamConfig::default()) {
        Ok(c) => c,
        Err(_) => return external_id.to_string(),
    };
    match client.app_name(external_id).await {
        Ok(Some(name)) => name,
        Ok(None) => external_id.to_string(),
        Err(e) => {
            eprintln!("[pulse] appdetails lookup failed ({e}); using the app id as display name");
            external_id.to_string()
        }
    }
}

fn print_counts(label: &str, pairs: &[(String, i64)]) {
    if pairs.is_empty() {
        return;
    }
    let line = pairs
        .iter()
        .map(|(status, n)| format!("{status}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("[pulse]   {label}: {line}");
}

fn parse_kind(raw: &str) -> Result<SourceKind> {
    SourceKind::parse(raw)
        .ok_or_else(|| anyhow!("unknown kind {raw:?}; expected steam-app or youtube-channel"))
}

async fn require_source(db: &Db, kind: SourceKind, external_id: &str) -> Result<TrackedSource> {
    db.find_source(kind, external_id)
        .await?
        .ok_or_else(|| anyhow!("no source {kind}:{external_id}"))
}

async fn connect(db_url: Option<String>) -> Result<Db> {
    let database_url = resolve_database_url(db_url)?;
    Db::connect(&database_url, 5).await
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
