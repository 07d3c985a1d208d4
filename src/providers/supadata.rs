//! Supadata YouTube client: channel video listings, per-video metadata, and
//! plain-text transcripts.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::util::env::{env_opt, env_parse};

use super::{get_json_with_backoff, ProviderError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct SupadataConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SupadataConfig {
    fn default() -> Self {
        Self {
            base_url: env_opt("SUPADATA_BASE_URL")
                .unwrap_or_else(|| "https://api.supadata.ai/v1/youtube".to_string()),
            api_key: env_opt("SUPADATA_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(env_parse("SUPADATA_HTTP_TIMEOUT_SECS", 30u64)),
            retry: RetryPolicy::from_env(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub upload_ts: i64,
}

/// Transcript lookup outcome. Missing transcripts are a normal state of the
/// world, not an error.
#[derive(Debug, Clone)]
pub enum Transcript {
    Text(String),
    Unavailable,
}

#[async_trait::async_trait]
pub trait VideoProvider: Send + Sync {
    /// Newest candidate video ids for a channel handle, newest first.
    async fn channel_video_ids(
        &self,
        handle: &str,
        limit: u32,
    ) -> Result<Vec<String>, ProviderError>;

    /// Metadata for one video. A missing or unparseable upload date is a
    /// permanent error for that video.
    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata, ProviderError>;

    async fn transcript(&self, video_id: &str, lang: &str) -> Result<Transcript, ProviderError>;
}

pub struct SupadataClient {
    client: reqwest::Client,
    cfg: SupadataConfig,
}

impl SupadataClient {
    pub fn new(cfg: SupadataConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("playerpulse/0.1")
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self { client, cfg })
    }

    fn headers(&self) -> [(&'static str, &str); 1] {
        [("x-api-key", self.cfg.api_key.as_str())]
    }
}

// -------- payloads --------

#[derive(Debug, Default, Deserialize)]
struct ChannelVideosPayload {
    #[serde(default, rename = "videoIds")]
    video_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoPayload {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "uploadDate")]
    upload_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptPayload {
    #[serde(default)]
    content: Option<String>,
}

/// Upload dates arrive as full ISO-8601 timestamps; older entries are
/// sometimes bare dates.
fn parse_upload_ts(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc().timestamp());
    }
    None
}

#[async_trait::async_trait]
impl VideoProvider for SupadataClient {
    async fn channel_video_ids(
        &self,
        handle: &str,
        limit: u32,
    ) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/channel/videos", self.cfg.base_url);
        let query = [
            ("id", handle.to_string()),
            ("limit", limit.to_string()),
            ("type", "video".to_string()),
        ];
        let body =
            get_json_with_backoff(&self.client, &url, &query, &self.headers(), &self.cfg.retry)
                .await?;
        let payload: ChannelVideosPayload = serde_json::from_value(body)?;
        debug!(handle, count = payload.video_ids.len(), "listed channel videos");
        Ok(payload.video_ids)
    }

    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata, ProviderError> {
        let url = format!("{}/video", self.cfg.base_url);
        let query = [("id", video_id.to_string())];
        let body =
            get_json_with_backoff(&self.client, &url, &query, &self.headers(), &self.cfg.retry)
                .await?;
        let payload: VideoPayload = serde_json::from_value(body)?;
        let upload_ts = payload
            .upload_date
            .as_deref()
            .and_then(parse_upload_ts)
            .ok_or_else(|| {
                ProviderError::Other(format!("video {video_id}: missing or invalid uploadDate"))
            })?;
        let external_id = if payload.id.is_empty() {
            video_id.to_string()
        } else {
            payload.id
        };
        Ok(VideoMetadata {
            external_id,
            title: payload.title,
            description: payload.description.filter(|d| !d.trim().is_empty()),
            upload_ts,
        })
    }

    async fn transcript(&self, video_id: &str, lang: &str) -> Result<Transcript, ProviderError> {
        let url = format!("{}/transcript", self.cfg.base_url);
        let query = [
            ("videoId", video_id.to_string()),
            ("lang", lang.to_string()),
            ("text", "true".to_string()),
        ];
        let body = match get_json_with_backoff(
            &self.client,
            &url,
            &query,
            &self.headers(),
            &self.cfg.retry,
        )
        .await
        {
            Ok(v) => v,
            // No transcript exists for this video/language.
            Err(ProviderError::Http { status: 404, .. }) => return Ok(Transcript::Unavailable),
            Err(e) => return Err(e),
        };
        let payload: TranscriptPayload = serde_json::from_value(body)?;
        match payload.content {
            Some(text) if !text.trim().is_empty() => Ok(Transcript::Text(text)),
            _ => Ok(Transcript::Unavailable),
        }
    }
}
