//! Review analysis stage: structured feedback extraction over the English
//! text of an already-translated (or natively English) review.

use std::sync::Arc;

use anyhow::Result;

use crate::model::PendingReviewAnalysis;
use crate::providers::{ChatModel, ChatRequest};
use crate::store::ReviewStore;

use super::schema::{json_object_slice, string_list, SchemaError};
use super::{EnrichError, EnrichmentStage};

const SENTIMENT_LABELS: [&str; 4] = ["Positive", "Negative", "Mixed", "Neutral"];

pub(crate) fn build_review_analysis_request(text: &str) -> ChatRequest {
    let system = "You are an expert text analyst. Analyze the following Steam review text.\n\
        Extract key information and respond *only* with a valid JSON object adhering \
        strictly to the following JSON schema.\n\
        Do not include any introductory text, explanations, or markdown formatting \
        outside the JSON object.\n\
        Schema:\n\
        ```json\n\
        {\n\
          \"analyzed_sentiment\": \"Positive\" | \"Negative\" | \"Mixed\" | \"Neutral\",\n\
          \"positive_themes\": [\"<string>\"],\n\
          \"negative_themes\": [\"<string>\"],\n\
          \"feature_requests\": [\"<string>\"],\n\
          \"bug_reports\": [\"<string>\"]\n\
        }\n\
        ```\n\
        Populate the fields based *only* on the provided review text. \
        `analyzed_sentiment` is required. If a category (e.g., bug_reports) has no \
        relevant information, provide an empty list `[]`."
        .to_string();
    let user = format!("Analyze this review text and respond with JSON:\n\n{text}");
    ChatRequest {
        system,
        user,
        temperature: 0.2,
        max_tokens: 1000,
    }
}

/// Validated review analysis reply.
#[derive(Debug, Clone)]
pub struct ReviewAnalysis {
    pub sentiment: String,
    pub positive_themes: Vec<String>,
    pub negative_themes: Vec<String>,
    pub feature_requests: Vec<String>,
    pub bug_reports: Vec<String>,
}

fn canonical_sentiment(raw: &str) -> Option<String> {
    SENTIMENT_LABELS
        .iter()
        .find(|label| label.eq_ignore_ascii_case(raw.trim()))
        .map(|label| label.to_string())
}

impl ReviewAnalysis {
    pub fn from_response(raw: &str) -> Result<Self, SchemaError> {
        let obj: serde_json::Value = serde_json::from_str(json_object_slice(raw)?)?;
        let sentiment = obj
            .get("analyzed_sentiment")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::field("analyzed_sentiment", "missing or not a string"))?;
        let sentiment = canonical_sentiment(sentiment).ok_or_else(|| {
            SchemaError::field(
                "analyzed_sentiment",
                format!("'{sentiment}' is not one of {SENTIMENT_LABELS:?}"),
            )
        })?;
        Ok(Self {
            sentiment,
            positive_themes: string_list(obj.get("positive_themes"), "positive_themes")?,
            negative_themes: string_list(obj.get("negative_themes"), "negative_themes")?,
            feature_requests: string_list(obj.get("feature_requests"), "feature_requests")?,
            bug_reports: string_list(obj.get("bug_reports"), "bug_reports")?,
        })
    }
}

pub struct ReviewAnalysisStage {
    store: Arc<dyn ReviewStore>,
    model: Arc<dyn ChatModel>,
}

impl ReviewAnalysisStage {
    pub fn new(store: Arc<dyn ReviewStore>, model: Arc<dyn ChatModel>) -> Self {
        Self { store, model }
    }
}

#[async_trait::async_trait]
impl EnrichmentStage for ReviewAnalysisStage {
    type Item = PendingReviewAnalysis;
    type Output = ReviewAnalysis;

    fn name(&self) -> &'static str {
        "review-analysis"
    }

    fn item_id(&self, item: &Self::Item) -> i64 {
        item.review_id
    }

    async fn pending_batch(&self, limit: i64) -> Result<Vec<Self::Item>> {
        self.store.reviews_pending_analysis(limit).await
    }

    async fn enrich(&self, item: &Self::Item) -> Result<Self::Output, EnrichError> {
        let text = item.text.trim();
        if text.is_empty() {
            return Err(EnrichError::Invalid("empty review text".into()));
        }
        let req = build_review_analysis_request(text);
        let reply = self.model.complete(&req).await?;
        if reply.trim_start().starts_with("[REFUSAL") {
            return Err(EnrichError::Refusal(reply));
        }
        Ok(ReviewAnalysis::from_response(&reply)?)
    }

    async fn commit(&self, item: &Self::Item, output: Self::Output) -> Result<bool> {
        self.store
            .record_review_analysis(item.review_id, &output, self.model.model_name())
            .await
    }

    async fn fail(&self, item: &Self::Item, note: &str) -> Result<bool> {
        self.store.fail_review_analysis(item.review_id, note).await
    }
}
