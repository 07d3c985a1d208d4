//! Steam review ingestion: pull everything above the cutoff, map to rows,
//! bulk insert idempotently.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::model::{SourceKind, TrackedSource, TranslationStatus};
use crate::providers::{FetchedReview, ReviewProvider};
use crate::store::{NewReview, ReviewStore};

use super::{IngestOutcome, SourceIngest};

pub struct ReviewIngest {
    provider: Arc<dyn ReviewProvider>,
    store: Arc<dyn ReviewStore>,
}

impl ReviewIngest {
    pub fn new(provider: Arc<dyn ReviewProvider>, store: Arc<dyn ReviewStore>) -> Self {
        Self { provider, store }
    }
}

fn to_row(source_id: i64, r: &FetchedReview) -> NewReview {
    // English reviews never enter the translation queue.
    let translation_status = if r.language == "english" {
        TranslationStatus::NotRequired
    } else {
        TranslationStatus::Pending
    };
    NewReview {
        source_id,
        external_id: r.external_id.clone(),
        author_external_id: r.author_external_id.clone(),
        original_language: r.language.clone(),
        original_text: r.text.clone(),
        created_ts: r.created_ts,
        updated_ts: r.updated_ts,
        voted_up: r.voted_up,
        votes_up: r.votes_up,
        votes_funny: r.votes_funny,
        weighted_vote_score: r.weighted_vote_score,
        steam_purchase: r.steam_purchase,
        received_for_free: r.received_for_free,
        written_during_early_access: r.written_during_early_access,
        playtime_forever_min: r.playtime_forever_min,
        playtime_at_review_min: r.playtime_at_review_min,
        translation_status,
    }
}

#[async_trait::async_trait]
impl SourceIngest for ReviewIngest {
    fn kind(&self) -> SourceKind {
        SourceKind::SteamApp
    }

    async fn ingest(&self, source: &TrackedSource, cutoff: i64) -> Result<IngestOutcome> {
        // The pull is all-or-nothing: a page failure surfaces here and the
        // watermark stays put, so no review can be skipped permanently.
        let pull = self
            .provider
            .reviews_since(&source.external_id, cutoff)
            .await
            .with_context(|| format!("fetching reviews for app {}", source.external_id))?;

        let fetched = pull.reviews.len() as u64;
        let rows: Vec<NewReview> = pull.reviews.iter().map(|r| to_row(source.id, r)).collect();
        let inserted = self
            .store
            .insert_reviews(&rows)
            .await
            .with_context(|| format!("inserting reviews for app {}", source.external_id))?;

        Ok(IngestOutcome {
            fetched,
            inserted,
            skipped: fetched.saturating_sub(inserted),
            newest_ts: pull.newest_ts,
            ..IngestOutcome::default()
        })
    }
}
