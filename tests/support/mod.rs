// tests/support/mod.rs
//
// In-memory store and scripted provider fakes shared by the integration
// tests. The store mirrors the documented repository contract: idempotent
// inserts, conditional transitions out of `pending`, GREATEST watermarks.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use playerpulse::enrich::analyze::ReviewAnalysis;
use playerpulse::enrich::video_analyze::VideoAnalysis;
use playerpulse::model::{
    AnalyzedReview, PendingReviewAnalysis, PendingTranslation, PendingVideoAnalysis, SourceKind,
    SourceStatusCounts, TrackedSource, TranslationStatus, VideoFeedback,
};
use playerpulse::providers::{
    ChatModel, ChatRequest, FetchedReview, ProviderError, ReviewProvider, ReviewPull, Transcript,
    VideoMetadata, VideoProvider,
};
use playerpulse::store::{NewReview, NewVideo, ReviewStore, SourceStore, VideoStore};

// -------- in-memory store --------

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub original_language: String,
    pub original_text: String,
    pub created_ts: i64,
    pub voted_up: Option<bool>,
    pub translation_status: String,
    pub analysis_status: String,
    pub translation_error: Option<String>,
    pub analysis_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoRow {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub title: String,
    pub upload_ts: i64,
    pub transcript_status: String,
    pub analysis_status: String,
    pub transcript_error: Option<String>,
    pub analysis_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemState {
    pub sources: Vec<TrackedSource>,
    pub reviews: Vec<ReviewRow>,
    pub videos: Vec<VideoRow>,
    /// (review_id, body, model)
    pub translations: Vec<(i64, String, String)>,
    /// (video_id, language, body)
    pub transcripts: Vec<(i64, String, String)>,
    pub review_analyses: Vec<(i64, ReviewAnalysis, String)>,
    pub video_analyses: Vec<(i64, VideoAnalysis, String)>,
}

#[derive(Default)]
pub struct MemStore {
    pub state: Mutex<MemState>,
    next_id: AtomicI64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn add_source(
        &self,
        kind: SourceKind,
        external_id: &str,
        display_name: &str,
    ) -> TrackedSource {
        let src = TrackedSource {
            id: self.alloc_id(),
            kind,
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
            active: true,
            last_fetched_ts: 0,
        };
        self.state.lock().unwrap().sources.push(src.clone());
        src
    }

    pub fn watermark(&self, source_id: i64) -> i64 {
        self.state
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.last_fetched_ts)
            .expect("unknown source")
    }

    pub fn review(&self, review_id: i64) -> ReviewRow {
        self.state
            .lock()
            .unwrap()
            .reviews
            .iter()
            .find(|r| r.id == review_id)
            .cloned()
            .expect("unknown review")
    }

    pub fn review_by_external(&self, source_id: i64, external_id: &str) -> ReviewRow {
        self.state
            .lock()
            .unwrap()
            .reviews
            .iter()
            .find(|r| r.source_id == source_id && r.external_id == external_id)
            .cloned()
            .expect("unknown review")
    }

    pub fn video(&self, video_id: i64) -> VideoRow {
        self.state
            .lock()
            .unwrap()
            .videos
            .iter()
            .find(|v| v.id == video_id)
            .cloned()
            .expect("unknown video")
    }

    pub fn video_by_external(&self, source_id: i64, external_id: &str) -> VideoRow {
        self.state
            .lock()
            .unwrap()
            .videos
            .iter()
            .find(|v| v.source_id == source_id && v.external_id == external_id)
            .cloned()
            .expect("unknown video")
    }
}

#[async_trait]
impl SourceStore for MemStore {
    async fn active_sources(&self, kind: SourceKind) -> Result<Vec<TrackedSource>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .sources
            .iter()
            .filter(|s| s.kind == kind && s.active)
            .cloned()
            .collect())
    }

    async fn ensure_source(
        &self,
        kind: SourceKind,
        external_id: &str,
        display_name: &str,
    ) -> Result<i64> {
        {
            let mut st = self.state.lock().unwrap();
            if let Some(s) = st
                .sources
                .iter_mut()
                .find(|s| s.kind == kind && s.external_id == external_id)
            {
                s.display_name = display_name.to_string();
                return Ok(s.id);
            }
        }
        Ok(self.add_source(kind, external_id, display_name).id)
    }

    async fn set_source_active(
        &self,
        kind: SourceKind,
        external_id: &str,
        active: bool,
    ) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        match st
            .sources
            .iter_mut()
            .find(|s| s.kind == kind && s.external_id == external_id)
        {
            Some(s) => {
                s.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_source(
        &self,
        kind: SourceKind,
        external_id: &str,
    ) -> Result<Option<TrackedSource>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .sources
            .iter()
            .find(|s| s.kind == kind && s.external_id == external_id)
            .cloned())
    }

    async fn list_sources(&self) -> Result<Vec<TrackedSource>> {
        Ok(self.state.lock().unwrap().sources.clone())
    }

    async fn advance_watermark(&self, source_id: i64, ts: i64) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let s = st
            .sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| anyhow!("no source {source_id}"))?;
        s.last_fetched_ts = s.last_fetched_ts.max(ts);
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemStore {
    async fn insert_reviews(&self, rows: &[NewReview]) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let mut inserted = 0;
        for r in rows {
            let exists = st
                .reviews
                .iter()
                .any(|e| e.source_id == r.source_id && e.external_id == r.external_id);
            if exists {
                continue;
            }
            let id = self.alloc_id();
            st.reviews.push(ReviewRow {
                id,
                source_id: r.source_id,
                external_id: r.external_id.clone(),
                original_language: r.original_language.clone(),
                original_text: r.original_text.clone(),
                created_ts: r.created_ts,
                voted_up: r.voted_up,
                translation_status: r.translation_status.as_str().to_string(),
                analysis_status: "pending".to_string(),
                translation_error: None,
                analysis_error: None,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn reviews_pending_translation(&self, limit: i64) -> Result<Vec<PendingTranslation>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .reviews
            .iter()
            .filter(|r| r.translation_status == "pending")
            .take(limit.max(0) as usize)
            .map(|r| PendingTranslation {
                review_id: r.id,
                original_language: r.original_language.clone(),
                original_text: r.original_text.clone(),
            })
            .collect())
    }

    async fn record_review_translation(
        &self,
        review_id: i64,
        body: &str,
        model: &str,
    ) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let applied = match st.reviews.iter_mut().find(|r| r.id == review_id) {
            Some(r) if r.translation_status == "pending" => {
                r.translation_status = "translated".to_string();
                r.translation_error = None;
                true
            }
            _ => false,
        };
        if applied {
            st.translations
                .push((review_id, body.to_string(), model.to_string()));
        }
        Ok(applied)
    }

    async fn fail_review_translation(&self, review_id: i64, note: &str) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        Ok(match st.reviews.iter_mut().find(|r| r.id == review_id) {
            Some(r) if r.translation_status == "pending" => {
                r.translation_status = "failed".to_string();
                r.translation_error = Some(note.to_string());
                true
            }
            _ => false,
        })
    }

    async fn reviews_pending_analysis(&self, limit: i64) -> Result<Vec<PendingReviewAnalysis>> {
        let st = self.state.lock().unwrap();
        let mut out = Vec::new();
        for r in st.reviews.iter().filter(|r| {
            r.analysis_status == "pending"
                && (r.translation_status == "translated" || r.translation_status == "not_required")
        }) {
            let text = st
                .translations
                .iter()
                .find(|(id, _, _)| *id == r.id)
                .map(|(_, body, _)| body.clone())
                .unwrap_or_else(|| r.original_text.clone());
            out.push(PendingReviewAnalysis {
                review_id: r.id,
                text,
            });
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn record_review_analysis(
        &self,
        review_id: i64,
        analysis: &ReviewAnalysis,
        model: &str,
    ) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let applied = match st.reviews.iter_mut().find(|r| r.id == review_id) {
            Some(r) if r.analysis_status == "pending" => {
                r.analysis_status = "analyzed".to_string();
                r.analysis_error = None;
                true
            }
            _ => false,
        };
        if applied {
            st.review_analyses
                .push((review_id, analysis.clone(), model.to_string()));
        }
        Ok(applied)
    }

    async fn fail_review_analysis(&self, review_id: i64, note: &str) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        Ok(match st.reviews.iter_mut().find(|r| r.id == review_id) {
            Some(r) if r.analysis_status == "pending" => {
                r.analysis_status = "failed".to_string();
                r.analysis_error = Some(note.to_string());
                true
            }
            _ => false,
        })
    }

    async fn reviews_with_analysis(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<AnalyzedReview>> {
        let st = self.state.lock().unwrap();
        let mut out: Vec<AnalyzedReview> = st
            .reviews
            .iter()
            .filter(|r| {
                r.source_id == source_id
                    && r.analysis_status == "analyzed"
                    && r.created_ts >= since_ts
            })
            .map(|r| {
                let (_, a, _) = st
                    .review_analyses
                    .iter()
                    .find(|(id, _, _)| *id == r.id)
                    .expect("analyzed review without analysis row");
                let english = st
                    .translations
                    .iter()
                    .find(|(id, _, _)| *id == r.id)
                    .map(|(_, body, _)| body.clone())
                    .unwrap_or_else(|| r.original_text.clone());
                AnalyzedReview {
                    review_id: r.id,
                    external_id: r.external_id.clone(),
                    original_language: r.original_language.clone(),
                    created_ts: r.created_ts,
                    voted_up: r.voted_up,
                    english_text: english,
                    sentiment: a.sentiment.clone(),
                    positive_themes: a.positive_themes.clone(),
                    negative_themes: a.negative_themes.clone(),
                    feature_requests: a.feature_requests.clone(),
                    bug_reports: a.bug_reports.clone(),
                }
            })
            .collect();
        out.sort_by(|x, y| y.created_ts.cmp(&x.created_ts));
        Ok(out)
    }

    async fn distinct_review_languages(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>> {
        let st = self.state.lock().unwrap();
        let langs: BTreeSet<String> = st
            .reviews
            .iter()
            .filter(|r| r.source_id == source_id && r.created_ts >= since_ts)
            .map(|r| r.original_language.clone())
            .collect();
        Ok(langs.into_iter().collect())
    }

    async fn review_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts> {
        let st = self.state.lock().unwrap();
        let rows: Vec<&ReviewRow> = st
            .reviews
            .iter()
            .filter(|r| r.source_id == source_id)
            .collect();
        Ok(SourceStatusCounts {
            items: rows.len() as i64,
            translation: tally(rows.iter().map(|r| r.translation_status.as_str())),
            transcript: Vec::new(),
            analysis: tally(rows.iter().map(|r| r.analysis_status.as_str())),
        })
    }

    async fn requeue_failed_translations(&self, source_id: i64) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let mut n = 0;
        for r in st
            .reviews
            .iter_mut()
            .filter(|r| r.source_id == source_id && r.translation_status == "failed")
        {
            r.translation_status = "pending".to_string();
            r.translation_error = None;
            n += 1;
        }
        Ok(n)
    }

    async fn requeue_failed_review_analyses(&self, source_id: i64) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let mut n = 0;
        for r in st
            .reviews
            .iter_mut()
            .filter(|r| r.source_id == source_id && r.analysis_status == "failed")
        {
            r.analysis_status = "pending".to_string();
            r.analysis_error = None;
            n += 1;
        }
        Ok(n)
    }
}

#[async_trait]
impl VideoStore for MemStore {
    async fn known_video_ids(&self, source_id: i64, ids: &[String]) -> Result<Vec<String>> {
        let st = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| {
                st.videos
                    .iter()
                    .any(|v| v.source_id == source_id && &v.external_id == *id)
            })
            .cloned()
            .collect())
    }

    async fn insert_video(&self, row: &NewVideo) -> Result<Option<i64>> {
        let mut st = self.state.lock().unwrap();
        let exists = st
            .videos
            .iter()
            .any(|v| v.source_id == row.source_id && v.external_id == row.external_id);
        if exists {
            return Ok(None);
        }
        let id = self.alloc_id();
        st.videos.push(VideoRow {
            id,
            source_id: row.source_id,
            external_id: row.external_id.clone(),
            title: row.title.clone(),
            upload_ts: row.upload_ts,
            transcript_status: "pending".to_string(),
            analysis_status: "pending".to_string(),
            transcript_error: None,
            analysis_error: None,
        });
        Ok(Some(id))
    }

    async fn videos_pending_transcript(&self, source_id: i64) -> Result<Vec<(i64, String)>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .videos
            .iter()
            .filter(|v| v.source_id == source_id && v.transcript_status == "pending")
            .map(|v| (v.id, v.external_id.clone()))
            .collect())
    }

    async fn record_transcript(&self, video_id: i64, language: &str, body: &str) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let applied = match st.videos.iter_mut().find(|v| v.id == video_id) {
            Some(v) if v.transcript_status == "pending" => {
                v.transcript_status = "fetched".to_string();
                v.transcript_error = None;
                true
            }
            _ => false,
        };
        if applied {
            st.transcripts
                .push((video_id, language.to_string(), body.to_string()));
        }
        Ok(applied)
    }

    async fn mark_transcript_unavailable(&self, video_id: i64) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        Ok(match st.videos.iter_mut().find(|v| v.id == video_id) {
            Some(v) if v.transcript_status == "pending" => {
                v.transcript_status = "unavailable".to_string();
                true
            }
            _ => false,
        })
    }

    async fn fail_transcript(&self, video_id: i64, note: &str) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        Ok(match st.videos.iter_mut().find(|v| v.id == video_id) {
            Some(v) if v.transcript_status == "pending" => {
                v.transcript_status = "failed".to_string();
                v.transcript_error = Some(note.to_string());
                true
            }
            _ => false,
        })
    }

    async fn videos_pending_analysis(&self, limit: i64) -> Result<Vec<PendingVideoAnalysis>> {
        let st = self.state.lock().unwrap();
        let mut out = Vec::new();
        for v in st
            .videos
            .iter()
            .filter(|v| v.analysis_status == "pending" && v.transcript_status == "fetched")
        {
            let transcript = st
                .transcripts
                .iter()
                .find(|(id, _, _)| *id == v.id)
                .map(|(_, _, body)| body.clone())
                .expect("fetched video without transcript row");
            let channel_name = st
                .sources
                .iter()
                .find(|s| s.id == v.source_id)
                .map(|s| s.display_name.clone())
                .unwrap_or_default();
            out.push(PendingVideoAnalysis {
                video_id: v.id,
                title: v.title.clone(),
                channel_name,
                transcript,
            });
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn record_video_analysis(
        &self,
        video_id: i64,
        analysis: &VideoAnalysis,
        model: &str,
    ) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let applied = match st.videos.iter_mut().find(|v| v.id == video_id) {
            Some(v) if v.analysis_status == "pending" => {
                v.analysis_status = if analysis.is_relevant {
                    "analyzed".to_string()
                } else {
                    "irrelevant".to_string()
                };
                v.analysis_error = None;
                true
            }
            _ => false,
        };
        if applied {
            st.video_analyses
                .push((video_id, analysis.clone(), model.to_string()));
        }
        Ok(applied)
    }

    async fn fail_video_analysis(&self, video_id: i64, note: &str) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        Ok(match st.videos.iter_mut().find(|v| v.id == video_id) {
            Some(v) if v.analysis_status == "pending" => {
                v.analysis_status = "failed".to_string();
                v.analysis_error = Some(note.to_string());
                true
            }
            _ => false,
        })
    }

    async fn video_feedback(&self, source_id: i64, since_ts: i64) -> Result<Vec<VideoFeedback>> {
        let st = self.state.lock().unwrap();
        let mut out: Vec<VideoFeedback> = st
            .videos
            .iter()
            .filter(|v| {
                v.source_id == source_id
                    && v.analysis_status == "analyzed"
                    && v.upload_ts >= since_ts
            })
            .map(|v| {
                let (_, a, _) = st
                    .video_analyses
                    .iter()
                    .find(|(id, _, _)| *id == v.id)
                    .expect("analyzed video without analysis row");
                VideoFeedback {
                    video_id: v.id,
                    external_id: v.external_id.clone(),
                    title: v.title.clone(),
                    upload_ts: v.upload_ts,
                    summary: a.summary.clone(),
                    sentiment: a.sentiment.clone(),
                    positive_themes: a.positive_themes.clone(),
                    negative_themes: a.negative_themes.clone(),
                    bug_reports: a.bug_reports.clone(),
                    feature_requests: a.feature_requests.clone(),
                    balance_feedback: a.balance_feedback.clone(),
                    gameplay_loop_feedback: a.gameplay_loop_feedback.clone(),
                    monetization_feedback: a.monetization_feedback.clone(),
                }
            })
            .collect();
        out.sort_by(|x, y| y.upload_ts.cmp(&x.upload_ts));
        Ok(out)
    }

    async fn distinct_video_sentiments(
        &self,
        source_id: i64,
        since_ts: i64,
    ) -> Result<Vec<String>> {
        let st = self.state.lock().unwrap();
        let mut sentiments = BTreeSet::new();
        for v in st.videos.iter().filter(|v| {
            v.source_id == source_id && v.analysis_status == "analyzed" && v.upload_ts >= since_ts
        }) {
            if let Some((_, a, _)) = st.video_analyses.iter().find(|(id, _, _)| *id == v.id) {
                if let Some(s) = &a.sentiment {
                    sentiments.insert(s.clone());
                }
            }
        }
        Ok(sentiments.into_iter().collect())
    }

    async fn video_status_counts(&self, source_id: i64) -> Result<SourceStatusCounts> {
        let st = self.state.lock().unwrap();
        let rows: Vec<&VideoRow> = st
            .videos
            .iter()
            .filter(|v| v.source_id == source_id)
            .collect();
        Ok(SourceStatusCounts {
            items: rows.len() as i64,
            translation: Vec::new(),
            transcript: tally(rows.iter().map(|v| v.transcript_status.as_str())),
            analysis: tally(rows.iter().map(|v| v.analysis_status.as_str())),
        })
    }

    async fn requeue_failed_video_analyses(&self, source_id: i64) -> Result<u64> {
        let mut st = self.state.lock().unwrap();
        let mut n = 0;
        for v in st
            .videos
            .iter_mut()
            .filter(|v| v.source_id == source_id && v.analysis_status == "failed")
        {
            v.analysis_status = "pending".to_string();
            v.analysis_error = None;
            n += 1;
        }
        Ok(n)
    }
}

fn tally<'a>(statuses: impl Iterator<Item = &'a str>) -> Vec<(String, i64)> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for s in statuses {
        *counts.entry(s).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// -------- scripted providers --------

#[derive(Default)]
pub struct FakeReviewProvider {
    pulls: Mutex<HashMap<String, VecDeque<Result<ReviewPull, ProviderError>>>>,
    pub calls: Mutex<Vec<(String, i64)>>,
}

impl FakeReviewProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pull(&self, app_id: &str, pull: Result<ReviewPull, ProviderError>) {
        self.pulls
            .lock()
            .unwrap()
            .entry(app_id.to_string())
            .or_default()
            .push_back(pull);
    }
}

#[async_trait]
impl ReviewProvider for FakeReviewProvider {
    async fn reviews_since(&self, app_id: &str, mark: i64) -> Result<ReviewPull, ProviderError> {
        self.calls.lock().unwrap().push((app_id.to_string(), mark));
        self.pulls
            .lock()
            .unwrap()
            .get_mut(app_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(ReviewPull::default()))
    }

    async fn app_name(&self, _app_id: &str) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct FakeVideoProvider {
    channels: Mutex<HashMap<String, VecDeque<Result<Vec<String>, ProviderError>>>>,
    metadata: Mutex<HashMap<String, VecDeque<Result<VideoMetadata, ProviderError>>>>,
    transcripts: Mutex<HashMap<String, VecDeque<Result<Transcript, ProviderError>>>>,
    pub metadata_calls: Mutex<Vec<String>>,
}

impl FakeVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_channel(&self, handle: &str, ids: Result<Vec<String>, ProviderError>) {
        self.channels
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_default()
            .push_back(ids);
    }

    pub fn push_metadata(&self, video_id: &str, meta: Result<VideoMetadata, ProviderError>) {
        self.metadata
            .lock()
            .unwrap()
            .entry(video_id.to_string())
            .or_default()
            .push_back(meta);
    }

    pub fn push_transcript(&self, video_id: &str, transcript: Result<Transcript, ProviderError>) {
        self.transcripts
            .lock()
            .unwrap()
            .entry(video_id.to_string())
            .or_default()
            .push_back(transcript);
    }
}

#[async_trait]
impl VideoProvider for FakeVideoProvider {
    async fn channel_video_ids(
        &self,
        handle: &str,
        _limit: u32,
    ) -> Result<Vec<String>, ProviderError> {
        self.channels
            .lock()
            .unwrap()
            .get_mut(handle)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Err(ProviderError::Other(format!("unscripted channel {handle}"))))
    }

    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata, ProviderError> {
        self.metadata_calls.lock().unwrap().push(video_id.to_string());
        self.metadata
            .lock()
            .unwrap()
            .get_mut(video_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Err(ProviderError::Other(format!("unscripted video {video_id}"))))
    }

    async fn transcript(&self, video_id: &str, _lang: &str) -> Result<Transcript, ProviderError> {
        self.transcripts
            .lock()
            .unwrap()
            .get_mut(video_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| {
                Err(ProviderError::Other(format!(
                    "unscripted transcript {video_id}"
                )))
            })
    }
}

#[derive(Default)]
pub struct FakeChatModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: Result<String, ProviderError>) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, req: &ChatRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("unscripted completion".to_string())))
    }
}

// -------- payload builders --------

pub fn fetched_review(external_id: &str, language: &str, text: &str, ts: i64) -> FetchedReview {
    FetchedReview {
        external_id: external_id.to_string(),
        author_external_id: None,
        language: language.to_string(),
        text: text.to_string(),
        created_ts: ts,
        updated_ts: None,
        voted_up: Some(true),
        votes_up: None,
        votes_funny: None,
        weighted_vote_score: None,
        steam_purchase: None,
        received_for_free: None,
        written_during_early_access: None,
        playtime_forever_min: None,
        playtime_at_review_min: None,
    }
}

pub fn pull_of(reviews: Vec<FetchedReview>) -> ReviewPull {
    let newest_ts = reviews.iter().map(|r| r.created_ts).max();
    ReviewPull { reviews, newest_ts }
}

pub fn video_meta(external_id: &str, title: &str, upload_ts: i64) -> VideoMetadata {
    VideoMetadata {
        external_id: external_id.to_string(),
        title: title.to_string(),
        description: None,
        upload_ts,
    }
}

pub fn new_review(
    source_id: i64,
    external_id: &str,
    language: &str,
    text: &str,
    ts: i64,
    translation_status: TranslationStatus,
) -> NewReview {
    NewReview {
        source_id,
        external_id: external_id.to_string(),
        author_external_id: None,
        original_language: language.to_string(),
        original_text: text.to_string(),
        created_ts: ts,
        updated_ts: None,
        voted_up: Some(true),
        votes_up: None,
        votes_funny: None,
        weighted_vote_score: None,
        steam_purchase: None,
        received_for_free: None,
        written_during_early_access: None,
        playtime_forever_min: None,
        playtime_at_review_min: None,
        translation_status,
    }
}

pub fn new_video(source_id: i64, external_id: &str, title: &str, upload_ts: i64) -> NewVideo {
    NewVideo {
        source_id,
        external_id: external_id.to_string(),
        title: title.to_string(),
        description: None,
        upload_ts,
    }
}
