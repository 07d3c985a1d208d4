//! Video analysis stage: relevance gate plus structured feedback extraction
//! over a fetched transcript.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::model::PendingVideoAnalysis;
use crate::providers::{ChatModel, ChatRequest};
use crate::store::VideoStore;

use super::schema::{json_object_slice, string_list, SchemaError};
use super::{EnrichError, EnrichmentStage};

/// Transcripts are truncated before prompting to bound token usage.
const MAX_TRANSCRIPT_CHARS: usize = 20_000;

/// Char-boundary-safe prefix of at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub(crate) fn build_video_analysis_request(game_name: &str, transcript: &str) -> ChatRequest {
    let system = "You are an AI assistant analyzing YouTube video transcripts for game \
                  feedback. Respond ONLY with the JSON structure requested."
        .to_string();
    let truncated = truncate_chars(transcript, MAX_TRANSCRIPT_CHARS);
    let user = format!(
        "Analyze the following YouTube video transcript text specifically regarding the \
         game '{game_name}'.\n\
         Determine if the video is primarily about or contains significant discussion of \
         '{game_name}'.\n\n\
         If it IS relevant to '{game_name}', provide:\n\
         1.  A detailed, structured summary covering only content relevant to game \
         developers: key feedback points, balance discussions, bugs or technical issues, \
         feature requests, player experience comments, and monetization feedback. Exclude \
         video intros, outros, sponsor messages, unrelated chatter, and calls to action.\n\
         2.  An overall sentiment score (e.g., Positive, Negative, Mixed, Neutral).\n\
         3.  A list of positive themes mentioned.\n\
         4.  A list of negative themes mentioned.\n\
         5.  Specific bug reports mentioned.\n\
         6.  Specific feature requests mentioned.\n\
         7.  Specific feedback on game balance.\n\
         8.  Specific feedback on the core gameplay loop.\n\
         9.  Specific feedback on monetization aspects (if any).\n\n\
         If the video is NOT relevant to '{game_name}' (e.g., different game, general \
         channel update, unrelated topic), only state that it is not relevant by setting \
         `is_relevant` to false.\n\n\
         Format the entire response STRICTLY as a JSON object of this shape:\n\
         ```json\n\
         {{\n\
           \"is_relevant\": true,\n\
           \"summary\": \"<string or null>\",\n\
           \"analyzed_sentiment\": \"<string or null>\",\n\
           \"positive_themes\": [\"<string>\"],\n\
           \"negative_themes\": [\"<string>\"],\n\
           \"bug_reports\": [\"<string>\"],\n\
           \"feature_requests\": [\"<string>\"],\n\
           \"balance_feedback\": [\"<string>\"],\n\
           \"gameplay_loop_feedback\": [\"<string>\"],\n\
           \"monetization_feedback\": [\"<string>\"]\n\
         }}\n\
         ```\n\
         `is_relevant` is required; every other field may be null. Ensure the output is \
         ONLY the JSON object, with no surrounding text or markdown formatting.\n\n\
         Transcript Text:\n\
         ---\n\
         {truncated}\n\
         ---\n\n\
         JSON Response:\n"
    );
    ChatRequest {
        system,
        user,
        temperature: 0.2,
        max_tokens: 2048,
    }
}

/// Validated video analysis reply. For irrelevant videos every field except
/// the verdict is dropped, whatever the model populated.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    pub is_relevant: bool,
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

fn opt_string(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl VideoAnalysis {
    pub fn from_response(raw: &str) -> Result<Self, SchemaError> {
        let obj: serde_json::Value = serde_json::from_str(json_object_slice(raw)?)?;
        let is_relevant = obj
            .get("is_relevant")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| SchemaError::field("is_relevant", "missing or not a boolean"))?;
        if !is_relevant {
            return Ok(Self {
                is_relevant: false,
                summary: None,
                sentiment: None,
                positive_themes: Vec::new(),
                negative_themes: Vec::new(),
                bug_reports: Vec::new(),
                feature_requests: Vec::new(),
                balance_feedback: Vec::new(),
                gameplay_loop_feedback: Vec::new(),
                monetization_feedback: Vec::new(),
            });
        }
        Ok(Self {
            is_relevant: true,
            summary: opt_string(obj.get("summary")),
            sentiment: opt_string(obj.get("analyzed_sentiment")),
            positive_themes: string_list(obj.get("positive_themes"), "positive_themes")?,
            negative_themes: string_list(obj.get("negative_themes"), "negative_themes")?,
            bug_reports: string_list(obj.get("bug_reports"), "bug_reports")?,
            feature_requests: string_list(obj.get("feature_requests"), "feature_requests")?,
            balance_feedback: string_list(obj.get("balance_feedback"), "balance_feedback")?,
            gameplay_loop_feedback: string_list(
                obj.get("gameplay_loop_feedback"),
                "gameplay_loop_feedback",
            )?,
            monetization_feedback: string_list(
                obj.get("monetization_feedback"),
                "monetization_feedback",
            )?,
        })
    }
}

pub struct VideoAnalysisStage {
    store: Arc<dyn VideoStore>,
    model: Arc<dyn ChatModel>,
    game_name: String,
}

impl VideoAnalysisStage {
    pub fn new(store: Arc<dyn VideoStore>, model: Arc<dyn ChatModel>, game_name: String) -> Self {
        Self {
            store,
            model,
            game_name,
        }
    }
}

#[async_trait::async_trait]
impl EnrichmentStage for VideoAnalysisStage {
    type Item = PendingVideoAnalysis;
    type Output = VideoAnalysis;

    fn name(&self) -> &'static str {
        "video-analysis"
    }

    fn item_id(&self, item: &Self::Item) -> i64 {
        item.video_id
    }

    async fn pending_batch(&self, limit: i64) -> Result<Vec<Self::Item>> {
        self.store.videos_pending_analysis(limit).await
    }

    async fn enrich(&self, item: &Self::Item) -> Result<Self::Output, EnrichError> {
        if item.transcript.trim().is_empty() {
            return Err(EnrichError::Invalid("empty transcript".into()));
        }
        debug!(
            video_id = item.video_id,
            title = %item.title,
            channel = %item.channel_name,
            "analyzing video transcript"
        );
        let req = build_video_analysis_request(&self.game_name, &item.transcript);
        let reply = self.model.complete(&req).await?;
        if reply.trim_start().starts_with("[REFUSAL") {
            return Err(EnrichError::Refusal(reply));
        }
        Ok(VideoAnalysis::from_response(&reply)?)
    }

    async fn commit(&self, item: &Self::Item, output: Self::Output) -> Result<bool> {
        self.store
            .record_video_analysis(item.video_id, &output, self.model.model_name())
            .await
    }

    async fn fail(&self, item: &Self::Item, note: &str) -> Result<bool> {
        self.store.fail_video_analysis(item.video_id, note).await
    }
}
