//! HTTP provider clients (Steam reviews, Supadata YouTube, OpenAI chat)
//! behind trait seams so pipeline logic takes injected instances.

pub mod openai;
pub mod steam;
pub mod supadata;

pub use openai::{ChatModel, ChatRequest, OpenAiClient, OpenAiConfig};
pub use steam::{FetchedReview, ReviewProvider, ReviewPull, SteamConfig, SteamReviewsClient};
pub use supadata::{SupadataClient, SupadataConfig, Transcript, VideoMetadata, VideoProvider};

use std::time::Duration;
use tracing::{error, warn};

use crate::util::env::env_parse;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Transient errors are worth another attempt (handled inside the
    /// clients); everything else is permanent for the current item/source.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Net(_) => true,
            ProviderError::Json(_) | ProviderError::Other(_) => false,
        }
    }

    /// Short form for persisted error notes; response bodies can be huge.
    pub fn brief(&self) -> String {
        let mut s = self.to_string();
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

/// Retry knobs shared by every client. Delay doubles per attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        Self {
            attempts: env_parse("PROVIDER_RETRY_ATTEMPTS", 3u32),
            base_delay: Duration::from_millis(env_parse("PROVIDER_RETRY_BASE_DELAY_MS", 2000u64)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_env()
    }
}

/// GET a JSON payload with bounded exponential backoff on transient failures
/// (network errors, 429, 5xx). 429 honors a larger Retry-After when present.
/// Permanent statuses return immediately as `Http`.
pub(crate) async fn get_json_with_backoff(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    headers: &[(&str, &str)],
    policy: &RetryPolicy,
) -> Result<serde_json::Value, ProviderError> {
    let max_attempts = policy.attempts.max(1);
    let mut delay = policy.base_delay.max(Duration::from_millis(1));
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let mut req = client.get(url).header("Accept", "application/json");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                if attempt < max_attempts {
                    warn!(url, attempt, error = %e, "request failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    continue;
                }
                return Err(ProviderError::Net(e));
            }
        };
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<serde_json::Value>().await?);
        }
        let retryable = status.as_u16() == 429 || status.is_server_error();
        if retryable && attempt < max_attempts {
            let mut sleep_for = delay;
            if let Some(retry_after) = resp
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
            {
                let hinted = Duration::from_secs(retry_after);
                if hinted > sleep_for {
                    sleep_for = hinted;
                }
            }
            warn!(url, status = status.as_u16(), attempt, "retryable status; backing off");
            tokio::time::sleep(sleep_for).await;
            delay = delay.saturating_mul(2);
            continue;
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        if code == 401 || code == 403 {
            error!(url, status = code, "authentication failure from provider");
        }
        return Err(ProviderError::Http { status: code, body });
    }
}
