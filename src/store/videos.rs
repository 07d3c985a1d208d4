//! Video repository: ingestion, transcript terminal transitions, analysis
//! batches, and reporting reads.

use anyhow::Result;
use sqlx::Row;

use crate::enrich::video_analyze::VideoAnalysis;
use crate::model::{PendingVideoAnalysis, SourceStatusCounts, VideoFeedback};

use super::Db;

/// Insert payload for one fetched video. Transcript and analysis columns
/// start at 'pending'.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub source_id: i64,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub upload_ts: i64,
}

#[async_trait::async_trait]
pub trait VideoStore: Send + Sync {
    /// Subset of `ids` already stored for this source.
    async fn known_video_ids(&self, source_id: i64, ids: &[String]) -> Result<Vec<String>>;

    /// Insert one video; None when (source_id, external_id) already exists.
    async fn insert_video(&self, row: &NewVideo) -> Result<Option<i64>>;

    /// Rows of one source left on transcript_status = 'pending' (process died
    /// between insert and the inline transcript fetch). Returns (id, external_id).
    async fn videos_pending_transcript(&self, source_id: i64) -> Result<Vec<(i64, String)>>;

    /// Persist the transcript artifact and flip the row to `fetched`,
    /// atomically, only if the row is still `pending`.
    async fn record_transcript(&self, video_id: i64, language: &str, body: &str) -> Result<bool>;

    async fn mark_transcript_unavailable(&self, video_id: i64) -> Result<bool>;

    async fn fail_transcript(&self, video_id: i64, note: &str) -> Result<bool>;

    /// Videos ready for analysis: analysis pending AND transcript fetched.
    async fn videos_pending_analysis(&self, limit: i64) -> Result<Vec<PendingVideoAnalysis>>;

    /// Persist the analysis and flip the row to `analyzed`, or `irrelevant`
    /// when the model judged the video off-topic (list fields stored NULL).
    async fn record_video_analysis(
        &self,
        video_id: i64,
        analysis: &VideoAnalysis,
        model: &str,
    ) -> Result<bool>;

    async fn fail_video_analysis(&self, video_id: i64, note: &str) -> Result<bool>;

    /// Relevant analyzed videos for one source with upload timestamp >= since,
    /// newest first, joined with their analysis rows.
    async fn video_feedback(&self, source_id: i64, since_ts: i64) -> Result<Vec<VideoFeedback>>;

    async fn distinct_video_sentiments(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>>;

    async fn video_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts>;

    async fn requeue_failed_video_analyses(&self, source_id: i64) -> Result<u64>;
}

async fn status_counts(db: &Db, source_id: i64, column: &str) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT {column} AS status, COUNT(*) AS n
         FROM videos WHERE source_id = $1 GROUP BY 1 ORDER BY 1"
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
impl VideoStore for Db {
    async fn known_video_ids(&self, source_id: i64, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let known: Vec<String> = sqlx::query_scalar(
            "SELECT external_id FROM videos WHERE source_id = $1 AND external_id = ANY($2)",
        )
        .bind(source_id)
        .bind(ids)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(known)
    }

    async fn insert_video(&self, row: &NewVideo) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO videos (source_id, external_id, title, description, upload_ts)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (source_id, external_id) DO NOTHING
             RETURNING id",
        )
        .bind(row.source_id)
        .bind(&row.external_id)
        .bind(&row.title)
        .bind(row.description.as_ref())
        .bind(row.upload_ts)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn videos_pending_transcript(&self, source_id: i64) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query(
            "SELECT id, external_id FROM videos
             WHERE source_id = $1 AND transcript_status = 'pending'
             ORDER BY id",
        )
        .bind(source_id)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| Ok((r.try_get::<i64, _>("id")?, r.try_get::<String, _>("external_id")?)))
            .collect()
    }

    async fn record_transcript(&self, video_id: i64, language: &str, body: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE videos
             SET transcript_status = 'fetched', transcript_error = NULL
             WHERE id = $1 AND transcript_status = 'pending'",
        )
        .bind(video_id)
        .persistent(false)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO video_transcripts (video_id, language, body)
             VALUES ($1, $2, $3)",
        )
        .bind(video_id)
        .bind(language)
        .bind(body)
        .persistent(false)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn mark_transcript_unavailable(&self, video_id: i64) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE videos
             SET transcript_status = 'unavailable', transcript_error = NULL
             WHERE id = $1 AND transcript_status = 'pending'",
        )
        .bind(video_id)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn fail_transcript(&self, video_id: i64, note: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE videos
             SET transcript_status = 'failed', transcript_error = $2
             WHERE id = $1 AND transcript_status = 'pending'",
        )
        .bind(video_id)
        .bind(note)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn videos_pending_analysis(&self, limit: i64) -> Result<Vec<PendingVideoAnalysis>> {
        let rows = sqlx::query(
            "SELECT v.id, v.title, s.display_name AS channel_name, t.body AS transcript
             FROM videos v
             JOIN tracked_sources s ON s.id = v.source_id
             JOIN video_transcripts t ON t.video_id = v.id
             WHERE v.analysis_status = 'pending'
               AND v.transcript_status = 'fetched'
             ORDER BY v.id
             LIMIT $1",
        )
        .bind(limit)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(PendingVideoAnalysis {
                    video_id: r.try_get("id")?,
                    title: r.try_get("title")?,
                    channel_name: r.try_get("channel_name")?,
                    transcript: r.try_get("transcript")?,
                })
            })
            .collect()
    }

    async fn record_video_analysis(
        &self,
        video_id: i64,
        analysis: &VideoAnalysis,
        model: &str,
    ) -> Result<bool> {
        let status = if analysis.is_relevant {
            "analyzed"
        } else {
            "irrelevant"
        };
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE videos
             SET analysis_status = $2, analysis_error = NULL
             WHERE id = $1 AND analysis_status = 'pending'",
        )
        .bind(video_id)
        .bind(status)
        .persistent(false)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        // Off-topic videos keep only the relevance verdict.
        let (summary, sentiment) = if analysis.is_relevant {
            (analysis.summary.as_ref(), analysis.sentiment.as_ref())
        } else {
            (None, None)
        };
        let lists: [Option<&Vec<String>>; 7] = if analysis.is_relevant {
            [
                Some(&analysis.positive_themes),
                Some(&analysis.negative_themes),
                Some(&analysis.bug_reports),
                Some(&analysis.feature_requests),
                Some(&analysis.balance_feedback),
                Some(&analysis.gameplay_loop_feedback),
                Some(&analysis.monetization_feedback),
            ]
        } else {
            [None; 7]
        };
        sqlx::query(
            "INSERT INTO video_analyses (video_id, is_relevant, summary, sentiment, \
             positive_themes, negative_themes, bug_reports, feature_requests, \
             balance_feedback, gameplay_loop_feedback, monetization_feedback, model)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(video_id)
        .bind(analysis.is_relevant)
        .bind(summary)
        .bind(sentiment)
        .bind(lists[0])
        .bind(lists[1])
        .bind(lists[2])
        .bind(lists[3])
        .bind(lists[4])
        .bind(lists[5])
        .bind(lists[6])
        .bind(model)
        .persistent(false)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn fail_video_analysis(&self, video_id: i64, note: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE videos
             SET analysis_status = 'failed', analysis_error = $2
             WHERE id = $1 AND analysis_status = 'pending'",
        )
        .bind(video_id)
        .bind(note)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn video_feedback(&self, source_id: i64, since_ts: i64) -> Result<Vec<VideoFeedback>> {
        let rows = sqlx::query(
            "SELECT v.id, v.external_id, v.title, v.upload_ts,
                    a.summary, a.sentiment, a.positive_themes, a.negative_themes,
                    a.bug_reports, a.feature_requests, a.balance_feedback,
                    a.gameplay_loop_feedback, a.monetization_feedback
             FROM videos v
             JOIN video_analyses a ON a.video_id = v.id
             WHERE v.source_id = $1
               AND v.upload_ts >= $2
               AND v.analysis_status = 'analyzed'
             ORDER BY v.upload_ts DESC",
        )
        .bind(source_id)
        .bind(since_ts)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                let list = |name: &str| -> Result<Vec<String>> {
                    Ok(r.try_get::<Option<Vec<String>>, _>(name)?.unwrap_or_default())
                };
                Ok(VideoFeedback {
                    video_id: r.try_get("id")?,
                    external_id: r.try_get("external_id")?,
                    title: r.try_get("title")?,
                    upload_ts: r.try_get("upload_ts")?,
                    summary: r.try_get("summary")?,
                    sentiment: r.try_get("sentiment")?,
                    positive_themes: list("positive_themes")?,
                    negative_themes: list("negative_themes")?,
                    bug_reports: list("bug_reports")?,
                    feature_requests: list("feature_requests")?,
                    balance_feedback: list("balance_feedback")?,
                    gameplay_loop_feedback: list("gameplay_loop_feedback")?,
                    monetization_feedback: list("monetization_feedback")?,
                })
            })
            .collect()
    }

    async fn distinct_video_sentiments(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>> {
        let sentiments: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT a.sentiment
             FROM videos v
             JOIN video_analyses a ON a.video_id = v.id
             WHERE v.source_id = $1
               AND v.upload_ts >= $2
               AND v.analysis_status = 'analyzed'
               AND a.sentiment IS NOT NULL
             ORDER BY 1",
        )
        .bind(source_id)
        .bind(since_ts)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(sentiments)
    }

    async fn video_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts> {
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE source_id = $1")
            .bind(source_id)
            .persistent(false)
            .fetch_one(&self.pool)
            .await?;
        Ok(SourceStatusCounts {
            items,
            translation: Vec::new(),
            transcript: status_counts(self, source_id, "transcript_status").await?,
            analysis: status_counts(self, source_id, "analysis_status").await?,
        })
    }

    async fn requeue_failed_video_analyses(&self, source_id: i64) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE videos
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
