//! Tracked-source repository.

use anyhow::{anyhow, Result};
use sqlx::Row;

use crate::model::{SourceKind, TrackedSource};

use super::Db;

#[async_trait::async_trait]
pub trait SourceStore: Send + Sync {
    /// Active sources of one kind, oldest registration first.
    async fn active_sources(&self, kind: SourceKind) -> Result<Vec<TrackedSource>>;

    /// Insert or refresh a tracked source; returns its id.
    async fn ensure_source(
        &self,
        kind: SourceKind,
        external_id: &str,
        display_name: &str,
    ) -> Result<i64>;

    async fn set_source_active(
        &self,
        kind: SourceKind,
        external_id: &str,
        active: bool,
    ) -> Result<bool>;

    async fn find_source(
        &self,
        kind: SourceKind,
        external_id: &str,
    ) -> Result<Option<TrackedSource>>;

    async fn list_sources(&self) -> Result<Vec<TrackedSource>>;

    /// Advance the fetch high-water-mark. The update is guarded with
    /// GREATEST so the mark can never move backwards, regardless of caller
    /// ordering. Call only after every item up to `ts` has been persisted.
    async fn advance_watermark(&self, source_id: i64, ts: i64) -> Result<()>;
}

fn row_to_source(row: &sqlx::postgres::PgRow) -> Result<TrackedSource> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = SourceKind::parse(&kind_raw)
        .ok_or_else(|| anyhow!("unknown source kind in tracked_sources: {kind_raw}"))?;
    Ok(TrackedSource {
        id: row.try_get("id")?,
        kind,
        external_id: row.try_get("external_id")?,
        display_name: row.try_get("display_name")?,
        active: row.try_get("active")?,
        last_fetched_ts: row.try_get("last_fetched_ts")?,
    })
}

#[async_trait::async_trait]
impl SourceStore for Db {
    async fn active_sources(&self, kind: SourceKind) -> Result<Vec<TrackedSource>> {
        let rows = sqlx::query(
            "SELECT id, kind, external_id, display_name, active, last_fetched_ts
             FROM tracked_sources
             WHERE kind = $1 AND active
             ORDER BY id",
        )
        .bind(kind.as_str())
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_source).collect()
    }

    async fn ensure_source(
        &self,
        kind: SourceKind,
        external_id: &str,
        display_name: &str,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tracked_sources (kind, external_id, display_name)
             VALUES ($1, $2, $3)
             ON CONFLICT (kind, external_id)
             DO UPDATE SET display_name = EXCLUDED.display_name
             RETURNING id",
        )
        .bind(kind.as_str())
        .bind(external_id)
        .bind(display_name)
        .persistent(false)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_source_active(
        &self,
        kind: SourceKind,
        external_id: &str,
        active: bool,
    ) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE tracked_sources SET active = $3 WHERE kind = $1 AND external_id = $2",
        )
        .bind(kind.as_str())
        .bind(external_id)
        .bind(active)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_source(
        &self,
        kind: SourceKind,
        external_id: &str,
    ) -> Result<Option<TrackedSource>> {
        let row = sqlx::query(
            "SELECT id, kind, external_id, display_name, active, last_fetched_ts
             FROM tracked_sources
             WHERE kind = $1 AND external_id = $2",
        )
        .bind(kind.as_str())
        .bind(external_id)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn list_sources(&self) -> Result<Vec<TrackedSource>> {
        let rows = sqlx::query(
            "SELECT id, kind, external_id, display_name, active, last_fetched_ts
             FROM tracked_sources
             ORDER BY kind, id",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_source).collect()
    }

    async fn advance_watermark(&self, source_id: i64, ts: i64) -> Result<()> {
        sqlx::query(
            "UPDATE tracked_sources
             SET last_fetched_ts = GREATEST(last_fetched_ts, $2)
             WHERE id = $1",
        )
        .bind(source_id)
        .bind(ts)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
