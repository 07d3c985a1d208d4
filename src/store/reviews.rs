//! Review repository: idempotent ingestion, worker batches, conditional
//! status transitions, and reporting reads.

use anyhow::Result;
use sqlx::{QueryBuilder, Row};

use crate::enrich::analyze::ReviewAnalysis;
use crate::model::{
    AnalyzedReview, PendingReviewAnalysis, PendingTranslation, SourceStatusCounts,
    TranslationStatus,
};

use super::Db;

/// Insert payload for one fetched review. Enrichment columns start at their
/// defaults; `translation_status` is decided at mapping time (English text
/// needs no translation).
#[derive(Debug, Clone)]
pub struct NewReview {
    pub source_id: i64,
    pub external_id: String,
    pub author_external_id: Option<String>,
    pub original_language: String,
    pub original_text: String,
    pub created_ts: i64,
    pub updated_ts: Option<i64>,
    pub voted_up: Option<bool>,
    pub votes_up: Option<i64>,
    pub votes_funny: Option<i64>,
    pub weighted_vote_score: Option<f64>,
    pub steam_purchase: Option<bool>,
    pub received_for_free: Option<bool>,
    pub written_during_early_access: Option<bool>,
    pub playtime_forever_min: Option<i64>,
    pub playtime_at_review_min: Option<i64>,
    pub translation_status: TranslationStatus,
}

#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    /// Bulk insert with ON CONFLICT DO NOTHING on (source_id, external_id).
    /// Returns the number of rows actually inserted; re-ingested duplicates
    /// never touch existing rows.
    async fn insert_reviews(&self, rows: &[NewReview]) -> Result<u64>;

    async fn reviews_pending_translation(&self, limit: i64) -> Result<Vec<PendingTranslation>>;

    /// Persist the translation artifact and flip the row to `translated`,
    /// atomically, only if the row is still `pending`. Returns false when
    /// another invocation already resolved the row.
    async fn record_review_translation(
        &self,
        review_id: i64,
        body: &str,
        model: &str,
    ) -> Result<bool>;

    async fn fail_review_translation(&self, review_id: i64, note: &str) -> Result<bool>;

    /// Reviews ready for analysis: analysis pending AND translation already
    /// terminal (`translated` or `not_required`). The text column is the
    /// English translation when one exists, else the original.
    async fn reviews_pending_analysis(&self, limit: i64) -> Result<Vec<PendingReviewAnalysis>>;

    async fn record_review_analysis(
        &self,
        review_id: i64,
        analysis: &ReviewAnalysis,
        model: &str,
    ) -> Result<bool>;

    async fn fail_review_analysis(&self, review_id: i64, note: &str) -> Result<bool>;

    /// Analyzed reviews for one source with creation timestamp >= since,
    /// newest first, joined with their analysis rows.
    async fn reviews_with_analysis(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<AnalyzedReview>>;

    async fn distinct_review_languages(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>>;

    async fn review_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts>;

    /// Operator escape hatch: reset `failed` rows of one stage back to
    /// `pending`. Returns the number of rows re-queued.
    async fn requeue_failed_translations(&self, source_id: i64) -> Result<u64>;
    async fn requeue_failed_review_analyses(&self, source_id: i64) -> Result<u64>;
}

async fn status_counts(db: &Db, source_id: i64, column: &str) -> Result<Vec<(String, i64)>> {
    // column is one of our own identifiers, never user input
    let sql = format!(
        "SELECT {column} AS status, COUNT(*) AS n
         FROM reviews WHERE source_id = $1 GROUP BY 1 ORDER BY 1"
    );
    let rows = sqlx::query(&sql)
        .bind(source_id)
        .persistent(false)
        .fetch_all(&db.pool)
        .await?;
    rows.iter()
        .map(|r| Ok((r.try_get::<String, _>("status")?, r.try_get::<i64, _>("n")?)))
        .collect()
}

#[async_trait::async_trait]
impl ReviewStore for Db {
    async fn insert_reviews(&self, rows: &[NewReview]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO reviews (source_id, external_id, author_external_id, \
             original_language, original_text, created_ts, updated_ts, voted_up, \
             votes_up, votes_funny, weighted_vote_score, steam_purchase, \
             received_for_free, written_during_early_access, playtime_forever_min, \
             playtime_at_review_min, translation_status) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.source_id)
                .push_bind(&r.external_id)
                .push_bind(r.author_external_id.as_ref())
                .push_bind(&r.original_language)
                .push_bind(&r.original_text)
                .push_bind(r.created_ts)
                .push_bind(r.updated_ts)
                .push_bind(r.voted_up)
                .push_bind(r.votes_up)
                .push_bind(r.votes_funny)
                .push_bind(r.weighted_vote_score)
                .push_bind(r.steam_purchase)
                .push_bind(r.received_for_free)
                .push_bind(r.written_during_early_access)
                .push_bind(r.playtime_forever_min)
                .push_bind(r.playtime_at_review_min)
                .push_bind(r.translation_status.as_str());
        });
        qb.push(" ON CONFLICT (source_id, external_id) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    async fn reviews_pending_translation(&self, limit: i64) -> Result<Vec<PendingTranslation>> {
        let rows = sqlx::query(
            "SELECT id, original_language, original_text
             FROM reviews
             WHERE translation_status = 'pending'
             ORDER BY id
             LIMIT $1",
        )
        .bind(limit)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(PendingTranslation {
                    review_id: r.try_get("id")?,
                    original_language: r.try_get("original_language")?,
                    original_text: r.try_get("original_text")?,
                })
            })
            .collect()
    }

    async fn record_review_translation(
        &self,
        review_id: i64,
        body: &str,
        model: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE reviews
             SET translation_status = 'translated', translation_error = NULL
             WHERE id = $1 AND translation_status = 'pending'",
        )
        .bind(review_id)
        .persistent(false)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO review_translations (review_id, language, body, model)
             VALUES ($1, 'english', $2, $3)",
        )
        .bind(review_id)
        .bind(body)
        .bind(model)
        .persistent(false)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn fail_review_translation(&self, review_id: i64, note: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE reviews
             SET translation_status = 'failed', translation_error = $2
             WHERE id = $1 AND translation_status = 'pending'",
        )
        .bind(review_id)
        .bind(note)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reviews_pending_analysis(&self, limit: i64) -> Result<Vec<PendingReviewAnalysis>> {
        let rows = sqlx::query(
            "SELECT r.id, COALESCE(t.body, r.original_text) AS text
             FROM reviews r
             LEFT JOIN review_translations t
               ON t.review_id = r.id AND t.language = 'english'
             WHERE r.analysis_status = 'pending'
               AND r.translation_status IN ('translated', 'not_required')
             ORDER BY r.id
             LIMIT $1",
        )
        .bind(limit)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(PendingReviewAnalysis {
                    review_id: r.try_get("id")?,
                    text: r.try_get("text")?,
                })
            })
            .collect()
    }

    async fn record_review_analysis(
        &self,
        review_id: i64,
        analysis: &ReviewAnalysis,
        model: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE reviews
             SET analysis_status = 'analyzed', analysis_error = NULL
             WHERE id = $1 AND analysis_status = 'pending'",
        )
        .bind(review_id)
        .persistent(false)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO review_analyses (review_id, sentiment, positive_themes, \
             negative_themes, feature_requests, bug_reports, model)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review_id)
        .bind(&analysis.sentiment)
        .bind(&analysis.positive_themes)
        .bind(&analysis.negative_themes)
        .bind(&analysis.feature_requests)
        .bind(&analysis.bug_reports)
        .bind(model)
        .persistent(false)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn fail_review_analysis(&self, review_id: i64, note: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE reviews
             SET analysis_status = 'failed', analysis_error = $2
             WHERE id = $1 AND analysis_status = 'pending'",
        )
        .bind(review_id)
        .bind(note)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reviews_with_analysis(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<AnalyzedReview>> {
        let rows = sqlx::query(
            "SELECT r.id, r.external_id, r.original_language, r.created_ts, r.voted_up,
                    COALESCE(t.body, r.original_text) AS english_text,
                    a.sentiment, a.positive_themes, a.negative_themes,
                    a.feature_requests, a.bug_reports
             FROM reviews r
             JOIN review_analyses a ON a.review_id = r.id
             LEFT JOIN review_translations t
               ON t.review_id = r.id AND t.language = 'english'
             WHERE r.source_id = $1
               AND r.created_ts >= $2
               AND r.analysis_status = 'analyzed'
             ORDER BY r.created_ts DESC",
        )
        .bind(source_id)
        .bind(since_ts)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(AnalyzedReview {
                    review_id: r.try_get("id")?,
                    external_id: r.try_get("external_id")?,
                    original_language: r.try_get("original_language")?,
                    created_ts: r.try_get("created_ts")?,
                    voted_up: r.try_get("voted_up")?,
                    english_text: r.try_get("english_text")?,
                    sentiment: r.try_get("sentiment")?,
                    positive_themes: r.try_get("positive_themes")?,
                    negative_themes: r.try_get("negative_themes")?,
                    feature_requests: r.try_get("feature_requests")?,
                    bug_reports: r.try_get("bug_reports")?,
                })
            })
            .collect()
    }

    async fn distinct_review_languages(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>> {
        let langs: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT original_language
             FROM reviews
             WHERE source_id = $1 AND created_ts >= $2
             ORDER BY 1",
        )
        .bind(source_id)
        .bind(since_ts)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(langs)
    }

    async fn review_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts> {
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE source_id = $1")
            .bind(source_id)
            .persistent(false)
            .fetch_one(&self.pool)
            .await?;
        Ok(SourceStatusCounts {
            items,
            translation: status_counts(self, source_id, "translation_status").await?,
            transcript: Vec::new(),
            analysis: status_counts(self, source_id, "analysis_status").await?,
        })
    }

    async fn requeue_failed_translations(&self, source_id: i64) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE reviews
             SET translation_status = 'pending', translation_error = NULL
             WHERE source_id = $1 AND translation_status = 'failed'",
        )
        .bind(source_id)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn requeue_failed_review_analyses(&self, source_id: i64) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE reviews
             SET analysis_status = 'pending', analysis_error = NULL
             WHERE source_id = $1 AND analysis_status = 'failed'",
        )
        .bind(source_id)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
