//! Status-driven enrichment workers. One generic drain loop runs every
//! stage: pull a batch of pending items, enrich each through the chat model,
//! then commit or fail with a conditional status transition.

pub mod analyze;
pub mod schema;
pub mod translate;
pub mod video_analyze;

pub use analyze::ReviewAnalysisStage;
pub use translate::TranslationStage;
pub use video_analyze::VideoAnalysisStage;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::providers::ProviderError;

use schema::SchemaError;

/// Why one item's enrichment failed. Every variant is terminal for the item:
/// the row goes to `failed` with the note persisted, and processing moves on.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("model refused: {0}")]
    Refusal(String),
    #[error("{0}")]
    Invalid(String),
}

impl EnrichError {
    /// Short form suitable for the `*_error` columns.
    pub fn note(&self) -> String {
        let mut s = match self {
            EnrichError::Provider(p) => format!("provider: {}", p.brief()),
            other => other.to_string(),
        };
        if s.len() > 300 {
            let mut cut = 300;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            s.truncate(cut);
            s.push_str("...");
        }
        s.replace('\n', " ")
    }
}

/// One enrichment stage: a pending-batch query, a provider call with
/// validation, and the two conditional transitions out of `pending`.
#[async_trait::async_trait]
pub trait EnrichmentStage: Send + Sync {
    type Item: Send + Sync;
    type Output: Send;

    fn name(&self) -> &'static str;
    fn item_id(&self, item: &Self::Item) -> i64;

    /// Up to `limit` pending items, including any stage preconditions.
    async fn pending_batch(&self, limit: i64) -> Result<Vec<Self::Item>>;

    async fn enrich(&self, item: &Self::Item) -> Result<Self::Output, EnrichError>;

    /// Persist the output and flip the status, only if the row is still
    /// pending. Returns false when another invocation won the race.
    async fn commit(&self, item: &Self::Item, output: Self::Output) -> Result<bool>;

    /// Conditional transition to `failed` with the note persisted.
    async fn fail(&self, item: &Self::Item, note: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct DrainOptions {
    pub batch_size: i64,
    pub max_items: Option<u64>,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_items: None,
        }
    }
}

/// Tallies for one drain run. Item-level failures live in `failed`; only a
/// failing pending-query aborts the run itself.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Items whose conditional transition matched zero rows (lost races with
    /// an overlapping invocation). Skipped, not errors.
    pub stale: u64,
    /// Store errors that aborted a single item's unit of work.
    pub store_errors: u64,
}

/// Drain one stage's backlog: batches of `batch_size` until a batch comes
/// back short (or `max_items` is reached). Items are processed sequentially
/// with per-item isolation.
pub async fn drain_stage<S: EnrichmentStage>(
    stage: &S,
    opts: &DrainOptions,
) -> Result<StageReport> {
    let mut report = StageReport::default();
    loop {
        let mut limit = opts.batch_size.max(1);
        if let Some(max) = opts.max_items {
            let remaining = max.saturating_sub(report.processed);
            if remaining == 0 {
                break;
            }
            limit = limit.min(remaining as i64);
        }

        let batch = stage.pending_batch(limit).await?;
        if batch.is_empty() {
            break;
        }
        let requested = limit;
        let got = batch.len() as i64;

        for item in &batch {
            report.processed += 1;
            let id = stage.item_id(item);
            match stage.enrich(item).await {
                Ok(output) => match stage.commit(item, output).await {
                    Ok(true) => report.succeeded += 1,
                    Ok(false) => {
                        debug!(stage = stage.name(), id, "item no longer pending; skipping");
                        report.stale += 1;
                    }
                    Err(e) => {
                        error!(stage = stage.name(), id, error = %e, "commit failed; continuing");
                        report.store_errors += 1;
                    }
                },
                Err(e) => {
                    warn!(stage = stage.name(), id, error = %e, "enrichment failed; marking item failed");
                    match stage.fail(item, &e.note()).await {
                        Ok(true) => report.failed += 1,
                        Ok(false) => report.stale += 1,
                        Err(se) => {
                            error!(stage = stage.name(), id, error = %se, "failed-transition write did not apply; continuing");
                            report.store_errors += 1;
                        }
                    }
                }
            }
        }

        if got < requested {
            break;
        }
    }
    info!(
        stage = stage.name(),
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        stale = report.stale,
        store_errors = report.store_errors,
        "stage drained"
    );
    Ok(report)
}
