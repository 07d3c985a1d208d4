//! Steam appreviews client: newest-first cursor paging that stops at the
//! caller's high-water-mark.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::util::env::{env_opt, env_parse};

use super::{get_json_with_backoff, ProviderError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct SteamConfig {
    pub base_url: String,
    pub page_size: u32,
    /// Hard cap on pages per pull; protects against cursor loops.
    pub max_pages: u32,
    /// Minimum delay between page requests.
    pub fetch_delay: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            base_url: env_opt("STEAM_REVIEWS_BASE_URL")
                .unwrap_or_else(|| "https://store.steampowered.com".to_string()),
            page_size: env_parse("STEAM_PAGE_SIZE", 100u32),
            max_pages: env_parse("STEAM_MAX_PAGES", 200u32),
            fetch_delay: Duration::from_millis(env_parse("STEAM_FETCH_DELAY_MS", 1500u64)),
            timeout: Duration::from_secs(env_parse("STEAM_HTTP_TIMEOUT_SECS", 30u64)),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// One review as fetched, before it is tied to a tracked source.
#[derive(Debug, Clone)]
pub struct FetchedReview {
    pub external_id: String,
    pub author_external_id: Option<String>,
    pub language: String,
    pub text: String,
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
}

/// Result of one incremental pull. `newest_ts` is the maximum creation
/// timestamp observed above the mark (None when nothing new came back).
#[derive(Debug, Default)]
pub struct ReviewPull {
    pub reviews: Vec<FetchedReview>,
    pub newest_ts: Option<i64>,
}

#[async_trait::async_trait]
pub trait ReviewProvider: Send + Sync {
    /// All reviews strictly newer than `mark`, newest first. Errors mean the
    /// pull is incomplete and the caller must not advance its mark.
    async fn reviews_since(&self, app_id: &str, mark: i64) -> Result<ReviewPull, ProviderError>;

    /// Store-page name lookup for operator tooling; None when the app id is
    /// unknown to the store.
    async fn app_name(&self, app_id: &str) -> Result<Option<String>, ProviderError>;
}

pub struct SteamReviewsClient {
    client: reqwest::Client,
    cfg: SteamConfig,
}

impl SteamReviewsClient {
    pub fn new(cfg: SteamConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("playerpulse/0.1")
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self { client, cfg })
    }
}

// -------- appreviews payload --------

#[derive(Debug, Deserialize)]
struct ReviewsPage {
    #[serde(default)]
    success: i64,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    reviews: Vec<ReviewPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewPayload {
    #[serde(default)]
    recommendationid: String,
    #[serde(default)]
    author: AuthorPayload,
    #[serde(default)]
    language: String,
    #[serde(default)]
    review: String,
    #[serde(default)]
    timestamp_created: i64,
    #[serde(default)]
    timestamp_updated: Option<i64>,
    #[serde(default)]
    voted_up: Option<bool>,
    #[serde(default)]
    votes_up: Option<i64>,
    #[serde(default)]
    votes_funny: Option<i64>,
    // Steam sends this as a quoted decimal string on some apps, a number on others.
    #[serde(default)]
    weighted_vote_score: Option<Value>,
    #[serde(default)]
    steam_purchase: Option<bool>,
    #[serde(default)]
    received_for_free: Option<bool>,
    #[serde(default)]
    written_during_early_access: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorPayload {
    #[serde(default)]
    steamid: Option<String>,
    #[serde(default)]
    playtime_forever: Option<i64>,
    #[serde(default)]
    playtime_at_review: Option<i64>,
}

fn vote_score_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn normalize_language(lang: &str) -> String {
    let mut s = lang.to_ascii_lowercase().replace([' ', '-'], "_");
    if s.is_empty() {
        s = "english".into();
    }
    s
}

fn map_review(raw: &ReviewPayload) -> FetchedReview {
    FetchedReview {
        external_id: raw.recommendationid.clone(),
        author_external_id: raw.author.steamid.clone(),
        language: normalize_language(&raw.language),
        text: raw.review.clone(),
        created_ts: raw.timestamp_created,
        updated_ts: raw.timestamp_updated,
        voted_up: raw.voted_up,
        votes_up: raw.votes_up,
        votes_funny: raw.votes_funny,
        weighted_vote_score: raw.weighted_vote_score.as_ref().and_then(vote_score_to_f64),
        steam_purchase: raw.steam_purchase,
        received_for_free: raw.received_for_free,
        written_during_early_access: raw.written_during_early_access,
        playtime_forever_min: raw.author.playtime_forever,
        playtime_at_review_min: raw.author.playtime_at_review,
    }
}

/// Keep reviews strictly newer than the mark. Pages are newest-first, so the
/// first review at or below the mark means every remaining page is older too.
fn take_newer_than(mark: i64, page: &[ReviewPayload]) -> (Vec<FetchedReview>, bool) {
    let mut out = Vec::new();
    for raw in page {
        if raw.timestamp_created <= mark {
            return (out, true);
        }
        out.push(map_review(raw));
    }
    (out, false)
}

#[async_trait::async_trait]
impl ReviewProvider for SteamReviewsClient {
    async fn reviews_since(&self, app_id: &str, mark: i64) -> Result<ReviewPull, ProviderError> {
        let url = format!("{}/appreviews/{}", self.cfg.base_url, app_id);
        let mut cursor = String::from("*");
        let mut pull = ReviewPull::default();
        let mut pages: u32 = 0;

        loop {
            pages += 1;
            if pages > self.cfg.max_pages {
                warn!(app_id, pages, "page cap reached; stopping pull early");
                break;
            }
            if pages > 1 {
                tokio::time::sleep(self.cfg.fetch_delay).await;
            }

            // reqwest's query encoding handles the cursor's reserved characters.
            let query = [
                ("json", "1".to_string()),
                ("cursor", cursor.clone()),
                ("num_per_page", self.cfg.page_size.to_string()),
                ("review_type", "all".to_string()),
                ("language", "all".to_string()),
                ("purchase_type", "all".to_string()),
                ("filter", "recent".to_string()),
            ];
            let body =
                get_json_with_backoff(&self.client, &url, &query, &[], &self.cfg.retry).await?;
            let page: ReviewsPage = serde_json::from_value(body)?;
            if page.success != 1 {
                return Err(ProviderError::Other(format!(
                    "appreviews success={} for app {}",
                    page.success, app_id
                )));
            }
            if page.reviews.is_empty() {
                break;
            }

            let (mut newer, hit_mark) = take_newer_than(mark, &page.reviews);
            for r in &newer {
                pull.newest_ts = Some(pull.newest_ts.map_or(r.created_ts, |m| m.max(r.created_ts)));
            }
            pull.reviews.append(&mut newer);
            debug!(
                app_id,
                page = pages,
                kept = pull.reviews.len(),
                hit_mark,
                "fetched review page"
            );
            if hit_mark {
                break;
            }

            match page.cursor {
                Some(c) if !c.is_empty() && c != cursor => cursor = c,
                _ => break,
            }
        }

        Ok(pull)
    }

    async fn app_name(&self, app_id: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/api/appdetails", self.cfg.base_url);
        let query = [("appids", app_id.to_string())];
        let body =
            get_json_with_backoff(&self.client, &url, &query, &[], &self.cfg.retry).await?;
        let name = body
            .get(app_id)
            .filter(|entry| {
                entry
                    .get("success")
                    .and_then(|b| b.as_bool())
                    .unwrap_or(false)
            })
            .and_then(|entry| entry.get("data"))
            .and_then(|data| data.get("name"))
            .and_then(|n| n.as_str())
            .map(|s| s.to_string());
        Ok(name)
    }
}

#[cfg(test)]
mod tests_payload_map {
    use super::*;
    use serde_json::json;

    fn payload(id: &str, ts: i64) -> ReviewPayload {
        serde_json::from_value(json!({
            "recommendationid": id,
            "author": {"steamid": "765", "playtime_forever": 120, "playtime_at_review": 60},
            "language": "Simplified Chinese",
            "review": "很好玩",
            "timestamp_created": ts,
            "voted_up": true,
            "votes_up": 3,
            "weighted_vote_score": "0.523",
            "steam_purchase": true
        }))
        .unwrap()
    }

    #[test]
    fn maps_fields_and_normalizes_language() {
        let r = map_review(&payload("r1", 1000));
        assert_eq!(r.external_id, "r1");
        assert_eq!(r.language, "simplified_chinese");
        assert_eq!(r.weighted_vote_score, Some(0.523));
        assert_eq!(r.playtime_forever_min, Some(120));
        assert_eq!(r.author_external_id.as_deref(), Some("765"));
    }

    #[test]
    fn vote_score_accepts_string_and_number() {
        assert_eq!(vote_score_to_f64(&json!("0.75")), Some(0.75));
        assert_eq!(vote_score_to_f64(&json!(0.25)), Some(0.25));
        assert_eq!(vote_score_to_f64(&json!(null)), None);
        assert_eq!(vote_score_to_f64(&json!("")), None);
    }

    #[test]
    fn stops_at_mark_and_excludes_boundary() {
        let page = vec![payload("r3", 300), payload("r2", 200), payload("r1", 100)];
        let (kept, hit) = take_newer_than(200, &page);
        assert!(hit);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].external_id, "r3");

        let (kept, hit) = take_newer_than(0, &page);
        assert!(!hit);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let raw: ReviewPayload = serde_json::from_value(json!({
            "recommendationid": "r9",
            "language": "english",
            "review": "ok",
            "timestamp_created": 5
        }))
        .unwrap();
        let r = map_review(&raw);
        assert_eq!(r.voted_up, None);
        assert_eq!(r.weighted_vote_score, None);
        assert_eq!(r.author_external_id, None);
    }
}
