//! YouTube video ingestion: list channel candidates, fetch metadata per new
//! id, insert, and resolve the transcript inline so every row leaves the
//! sweep on a terminal transcript status.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::model::{SourceKind, TrackedSource};
use crate::providers::{Transcript, VideoProvider};
use crate::store::{NewVideo, VideoStore};
use crate::util::env::{env_opt, env_parse};

use super::{IngestOutcome, SourceIngest};

#[derive(Debug, Clone)]
pub struct VideoIngestConfig {
    /// Newest candidate ids requested per channel sweep.
    pub channel_limit: u32,
    pub transcript_lang: String,
    /// Minimum delay between provider calls within one sweep.
    pub fetch_delay: Duration,
}

impl Default for VideoIngestConfig {
    fn default() -> Self {
        Self {
            channel_limit: env_parse("CHANNEL_FETCH_LIMIT", 30u32),
            transcript_lang: env_opt("TRANSCRIPT_LANG").unwrap_or_else(|| "en".to_string()),
            fetch_delay: Duration::from_millis(env_parse("SUPADATA_FETCH_DELAY_MS", 1000u64)),
        }
    }
}

pub struct VideoIngest {
    provider: Arc<dyn VideoProvider>,
    store: Arc<dyn VideoStore>,
    cfg: VideoIngestConfig,
}

impl VideoIngest {
    pub fn new(
        provider: Arc<dyn VideoProvider>,
        store: Arc<dyn VideoStore>,
        cfg: VideoIngestConfig,
    ) -> Self {
        Self {
            provider,
            store,
            cfg,
        }
    }

    async fn pace(&self) {
        tokio::time::sleep(self.cfg.fetch_delay).await;
    }

    /// Fetch and persist one transcript, landing the row on a terminal
    /// status. Transcript trouble never fails the source; a store error
    /// leaves the row pending for the next sweep's repair pass.
    async fn resolve_transcript(&self, out: &mut IngestOutcome, video_id: i64, external_id: &str) {
        let result = match self
            .provider
            .transcript(external_id, &self.cfg.transcript_lang)
            .await
        {
            Ok(Transcript::Text(body)) => {
                out.transcripts_fetched += 1;
                self.store
                    .record_transcript(video_id, &self.cfg.transcript_lang, &body)
                    .await
            }
            Ok(Transcript::Unavailable) => {
                out.transcripts_unavailable += 1;
                self.store.mark_transcript_unavailable(video_id).await
            }
            Err(e) => {
                warn!(video = external_id, error = %e, "transcript fetch failed");
                out.transcripts_failed += 1;
                self.store.fail_transcript(video_id, &e.brief()).await
            }
        };
        match result {
            Ok(true) => {}
            Ok(false) => {
                // Another invocation already landed this row.
            }
            Err(e) => {
                error!(video = external_id, error = %e, "transcript write failed; row stays pending");
            }
        }
    }
}

#[async_trait::async_trait]
impl SourceIngest for VideoIngest {
    fn kind(&self) -> SourceKind {
        SourceKind::YoutubeChannel
    }

    async fn ingest(&self, source: &TrackedSource, cutoff: i64) -> Result<IngestOutcome> {
        let mut out = IngestOutcome::default();

        // Repair rows a previous crash left between insert and transcript.
        let stuck = self.store.videos_pending_transcript(source.id).await?;
        if !stuck.is_empty() {
            info!(
                channel = %source.external_id,
                count = stuck.len(),
                "retrying transcripts left pending"
            );
        }
        for (video_id, external_id) in stuck {
            self.pace().await;
            self.resolve_transcript(&mut out, video_id, &external_id).await;
        }

        let ids = self
            .provider
            .channel_video_ids(&source.external_id, self.cfg.channel_limit)
            .await
            .with_context(|| format!("listing videos for channel {}", source.external_id))?;
        let known: HashSet<String> = self
            .store
            .known_video_ids(source.id, &ids)
            .await?
            .into_iter()
            .collect();

        for id in ids {
            if known.contains(&id) {
                out.skipped += 1;
                continue;
            }
            self.pace().await;
            let meta = match self.provider.video_metadata(&id).await {
                Ok(m) => m,
                Err(e) if !e.is_transient() => {
                    // Malformed or rejected metadata skips just this video.
                    warn!(video = %id, error = %e, "skipping video with bad metadata");
                    out.skipped += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("fetching metadata for video {id}"));
                }
            };
            out.fetched += 1;
            if meta.upload_ts <= cutoff {
                out.skipped += 1;
                continue;
            }

            let row = NewVideo {
                source_id: source.id,
                external_id: meta.external_id.clone(),
                title: meta.title,
                description: meta.description,
                upload_ts: meta.upload_ts,
            };
            match self.store.insert_video(&row).await? {
                Some(video_id) => {
                    out.inserted += 1;
                    out.newest_ts =
                        Some(out.newest_ts.map_or(meta.upload_ts, |m| m.max(meta.upload_ts)));
                    self.pace().await;
                    self.resolve_transcript(&mut out, video_id, &meta.external_id).await;
                }
                None => {
                    out.skipped += 1;
                }
            }
        }

        Ok(out)
    }
}
