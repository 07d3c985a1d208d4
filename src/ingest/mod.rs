//! Incremental fetch orchestration. One sweep walks every active source,
//! runs the kind-specific ingestor, and advances the per-source watermark
//! only after that source completed without error.

pub mod reviews;
pub mod videos;

pub use reviews::ReviewIngest;
pub use videos::{VideoIngest, VideoIngestConfig};

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::model::{SourceKind, TrackedSource};
use crate::store::SourceStore;

/// Counters from ingesting one source. `newest_ts` is the maximum item
/// timestamp actually persisted this run; None means nothing new landed and
/// the watermark must stay put.
#[derive(Debug, Default, Clone)]
pub struct IngestOutcome {
    pub fetched: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub newest_ts: Option<i64>,
    pub transcripts_fetched: u64,
    pub transcripts_unavailable: u64,
    pub transcripts_failed: u64,
}

/// Kind-specific ingestion. `ingest` must be all-or-nothing with respect to
/// the watermark: an Err means the pull was incomplete and the caller will
/// not advance the mark, so the next run re-covers the same window.
#[async_trait::async_trait]
pub trait SourceIngest: Send + Sync {
    fn kind(&self) -> SourceKind;
    async fn ingest(&self, source: &TrackedSource, cutoff: i64) -> Result<IngestOutcome>;
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Limit the sweep to one source kind.
    pub kind: Option<SourceKind>,
    /// Floor the fetch cutoff at now - N days, regardless of how stale a
    /// source's watermark is.
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub sources_ok: u64,
    pub sources_failed: u64,
    pub fetched: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub transcripts_fetched: u64,
    pub transcripts_unavailable: u64,
    pub transcripts_failed: u64,
    /// (source label, error) per failed source.
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_ok(&self) -> bool {
        self.sources_failed == 0
    }

    fn merge(&mut self, other: RunSummary) {
        self.sources_ok += other.sources_ok;
        self.sources_failed += other.sources_failed;
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.transcripts_fetched += other.transcripts_fetched;
        self.transcripts_unavailable += other.transcripts_unavailable;
        self.transcripts_failed += other.transcripts_failed;
        self.failures.extend(other.failures);
    }
}

/// Effective fetch floor for one source.
fn cutoff_for(source: &TrackedSource, max_age_days: Option<i64>, now_ts: i64) -> i64 {
    let mut cutoff = source.last_fetched_ts;
    if let Some(days) = max_age_days {
        cutoff = cutoff.max(now_ts - days * 86_400);
    }
    cutoff
}

/// Sweep every active source of one ingestor's kind. Source failures are
/// isolated: they are recorded in the summary and the sweep moves on.
pub async fn sweep_kind(
    store: &dyn SourceStore,
    ingest: &dyn SourceIngest,
    opts: &FetchOptions,
) -> Result<RunSummary> {
    let sources = store.active_sources(ingest.kind()).await?;
    info!(kind = %ingest.kind(), sources = sources.len(), "sweeping sources");
    let now_ts = Utc::now().timestamp();
    let mut summary = RunSummary::default();

    for source in &sources {
        let cutoff = cutoff_for(source, opts.max_age_days, now_ts);
        let label = format!("{}:{}", source.kind, source.external_id);
        match ingest.ingest(source, cutoff).await {
            Ok(outcome) => {
                summary.fetched += outcome.fetched;
                summary.inserted += outcome.inserted;
                summary.skipped += outcome.skipped;
                summary.transcripts_fetched += outcome.transcripts_fetched;
                summary.transcripts_unavailable += outcome.transcripts_unavailable;
                summary.transcripts_failed += outcome.transcripts_failed;

                let advanced = match outcome.newest_ts {
                    Some(ts) => store.advance_watermark(source.id, ts).await.map(|()| Some(ts)),
                    None => Ok(None),
                };
                match advanced {
                    Ok(watermark) => {
                        summary.sources_ok += 1;
                        info!(
                            source = %label,
                            fetched = outcome.fetched,
                            inserted = outcome.inserted,
                            skipped = outcome.skipped,
                            watermark = ?watermark,
                            "source ingested"
                        );
                    }
                    Err(e) => {
                        // Items are persisted; the stale mark just means the
                        // next run re-covers them and the upserts no-op.
                        summary.sources_failed += 1;
                        summary
                            .failures
                            .push((label.clone(), format!("watermark update: {e}")));
                        error!(source = %label, error = %e, "watermark update failed");
                    }
                }
            }
            Err(e) => {
                summary.sources_failed += 1;
                summary.failures.push((label.clone(), format!("{e:#}")));
                warn!(source = %label, error = %e, "source ingest failed; mark not advanced");
            }
        }
    }
    Ok(summary)
}

/// Run every ingestor as its own task (their tables are disjoint) and merge
/// the per-kind summaries. Returns the first task-level error, if any.
pub async fn sweep(
    store: Arc<dyn SourceStore>,
    ingestors: Vec<Arc<dyn SourceIngest>>,
    opts: &FetchOptions,
) -> Result<RunSummary> {
    let mut handles = Vec::new();
    for ing in ingestors {
        if let Some(kind) = opts.kind {
            if ing.kind() != kind {
                continue;
            }
        }
        let store_c = store.clone();
        let opts_c = opts.clone();
        handles.push(tokio::spawn(async move {
            sweep_kind(store_c.as_ref(), ing.as_ref(), &opts_c).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let mut summary = RunSummary::default();
    let mut first_err: Option<anyhow::Error> = None;
    for res in results {
        match res {
            Ok(Ok(part)) => summary.merge(part),
            Ok(Err(e)) => {
                error!(error = %e, "kind sweep failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
            Err(join_err) => {
                error!(error = %join_err, "sweep task panicked");
                if first_err.is_none() {
                    first_err = Some(join_err.into());
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
