//! Domain types shared across ingestion, enrichment, and reporting.

/// Kind of external origin a tracked source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SteamApp,
    YoutubeChannel,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SteamApp => "steam_app",
            SourceKind::YoutubeChannel => "youtube_channel",
        }
    }

    /// Accepts both the stored form and the kebab-case CLI form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steam_app" | "steam-app" => Some(SourceKind::SteamApp),
            "youtube_channel" | "youtube-channel" => Some(SourceKind::YoutubeChannel),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translation lifecycle of a review. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    Pending,
    NotRequired,
    Translated,
    Failed,
}

impl TranslationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStatus::Pending => "pending",
            TranslationStatus::NotRequired => "not_required",
            TranslationStatus::Translated => "translated",
            TranslationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TranslationStatus::Pending),
            "not_required" => Some(TranslationStatus::NotRequired),
            "translated" => Some(TranslationStatus::Translated),
            "failed" => Some(TranslationStatus::Failed),
            _ => None,
        }
    }
}

/// Analysis lifecycle of a review or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Pending,
    Analyzed,
    Irrelevant,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Irrelevant => "irrelevant",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "analyzed" => Some(AnalysisStatus::Analyzed),
            "irrelevant" => Some(AnalysisStatus::Irrelevant),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

/// Transcript lifecycle of a video. Resolved inline during ingestion; rows
/// only stay `Pending` if the process died between insert and fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStatus {
    Pending,
    Fetched,
    Unavailable,
    Failed,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Pending => "pending",
            TranscriptStatus::Fetched => "fetched",
            TranscriptStatus::Unavailable => "unavailable",
            TranscriptStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TranscriptStatus::Pending),
            "fetched" => Some(TranscriptStatus::Fetched),
            "unavailable" => Some(TranscriptStatus::Unavailable),
            "failed" => Some(TranscriptStatus::Failed),
            _ => None,
        }
    }
}

/// One tracked external origin (a Steam app or a YouTube channel).
#[derive(Debug, Clone)]
pub struct TrackedSource {
    pub id: i64,
    pub kind: SourceKind,
    pub external_id: String,
    pub display_name: String,
    pub active: bool,
    /// Unix seconds of the newest item successfully persisted for this
    /// source. Monotonically non-decreasing; advanced only after a fully
    /// successful fetch.
    pub last_fetched_ts: i64,
}

/// Review awaiting translation (translation_status = 'pending').
#[derive(Debug, Clone)]
pub struct PendingTranslation {
    pub review_id: i64,
    pub original_language: String,
    pub original_text: String,
}

/// Review awaiting analysis with its translation requirement already met.
/// `text` is the English translation when one exists, else the original.
#[derive(Debug, Clone)]
pub struct PendingReviewAnalysis {
    pub review_id: i64,
    pub text: String,
}

/// Video awaiting analysis with a fetched transcript.
#[derive(Debug, Clone)]
pub struct PendingVideoAnalysis {
    pub video_id: i64,
    pub title: String,
    pub channel_name: String,
    pub transcript: String,
}

/// Analyzed review joined with its analysis row, for reporting.
#[derive(Debug, Clone)]
pub struct AnalyzedReview {
    pub review_id: i64,
    pub external_id: String,
    pub original_language: String,
    pub created_ts: i64,
    pub voted_up: Option<bool>,
    pub english_text: String,
    pub sentiment: String,
    pub positive_themes: Vec<String>,
    pub negative_themes: Vec<String>,
    pub feature_requests: Vec<String>,
    pub bug_reports: Vec<String>,
}

/// Relevant analyzed video joined with its analysis row, for reporting.
#[derive(Debug, Clone)]
pub struct VideoFeedback {
    pub video_id: i64,
    pub external_id: String,
    pub title: String,
    pub upload_ts: i64,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub positive_themes: Vec<String>,
    pub negative_themes: Vec<String>,
    pub bug_reports: Vec<String>,
    pub feature_requests: Vec<String>,
    pub balance_feedback: Vec<String>,
    pub gameplay_loop_feedback: Vec<String>,
    pub monetization_feedback: Vec<String>,
}

/// Per-stage status tallies for one source, for the admin CLI.
#[derive(Debug, Clone, Default)]
pub struct SourceStatusCounts {
    pub items: i64,
    pub translation: Vec<(String, i64)>,
    pub transcript: Vec<(String, i64)>,
    pub analysis: Vec<(String, i64)>,
}
