//! Review translation stage: non-English reviews are translated to English
//! through the chat model, validated as a structured reply, and stored as a
//! write-once artifact.

use std::sync::Arc;

use anyhow::Result;

use crate::model::PendingTranslation;
use crate::providers::{ChatModel, ChatRequest};
use crate::store::ReviewStore;

use super::schema::{json_object_slice, SchemaError};
use super::{EnrichError, EnrichmentStage};

/// Steam language codes mapped to the names used in prompts. Codes missing
/// here pass through verbatim.
fn language_name(code: &str) -> &str {
    match code {
        "schinese" => "Simplified Chinese",
        "tchinese" => "Traditional Chinese",
        "japanese" => "Japanese",
        "koreana" => "Korean",
        "thai" => "Thai",
        "bulgarian" => "Bulgarian",
        "czech" => "Czech",
        "danish" => "Danish",
        "german" => "German",
        "english" => "English",
        "spanish" => "Spanish - Spain",
        "latam" => "Spanish - Latin America",
        "greek" => "Greek",
        "french" => "French",
        "italian" => "Italian",
        "hungarian" => "Hungarian",
        "dutch" => "Dutch",
        "norwegian" => "Norwegian",
        "polish" => "Polish",
        "portuguese" => "Portuguese - Portugal",
        "brazilian" => "Portuguese - Brazil",
        "romanian" => "Romanian",
        "russian" => "Russian",
        "finnish" => "Finnish",
        "swedish" => "Swedish",
        "turkish" => "Turkish",
        "vietnamese" => "Vietnamese",
        "ukrainian" => "Ukrainian",
        other => other,
    }
}

pub(crate) fn build_translation_request(language_code: &str, text: &str) -> ChatRequest {
    let language = language_name(language_code);
    let system = format!(
        "You are a professional translator specialized in translating game reviews \
         from {language} to English. The input is a Steam review text. Your goal is \
         to accurately translate the user's text to English, preserving the original \
         tone, style, and intent as closely as possible.\n\n\
         If the text is very short, contains potential slang, typos, or seems unclear, \
         translate it directly to English to the best of your ability. Do not add \
         commentary about the input quality or explain difficulties in translation.\n\n\
         Respond with *only* a valid JSON object of the form \
         {{\"translation\": \"<the English translation>\"}}. If a direct translation \
         is truly impossible, set the translation value to \"[REFUSAL] <concise reason>\"."
    );
    let user = format!("Translate this {language} Steam review text to English: {text}");
    ChatRequest {
        system,
        user,
        temperature: 0.3,
        max_tokens: 4096,
    }
}

/// Validated translation reply.
#[derive(Debug, Clone)]
pub struct TranslationOutput {
    pub translation: String,
}

impl TranslationOutput {
    pub fn from_response(raw: &str) -> Result<Self, SchemaError> {
        let obj: serde_json::Value = serde_json::from_str(json_object_slice(raw)?)?;
        let translation = obj
            .get("translation")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| SchemaError::field("translation", "missing or not a string"))?;
        if translation.is_empty() {
            return Err(SchemaError::field("translation", "empty"));
        }
        Ok(Self { translation })
    }
}

fn is_refusal(text: &str) -> bool {
    text.trim_start().starts_with("[REFUSAL")
}

pub struct TranslationStage {
    store: Arc<dyn ReviewStore>,
    model: Arc<dyn ChatModel>,
}

impl TranslationStage {
    pub fn new(store: Arc<dyn ReviewStore>, model: Arc<dyn ChatModel>) -> Self {
        Self { store, model }
    }
}

#[async_trait::async_trait]
impl EnrichmentStage for TranslationStage {
    type Item = PendingTranslation;
    type Output = TranslationOutput;

    fn name(&self) -> &'static str {
        "review-translation"
    }

    fn item_id(&self, item: &Self::Item) -> i64 {
        item.review_id
    }

    async fn pending_batch(&self, limit: i64) -> Result<Vec<Self::Item>> {
        self.store.reviews_pending_translation(limit).await
    }

    async fn enrich(&self, item: &Self::Item) -> Result<Self::Output, EnrichError> {
        let text = item.original_text.trim();
        if text.is_empty() {
            return Err(EnrichError::Invalid("empty review text".into()));
        }
        let req = build_translation_request(&item.original_language, text);
        let reply = self.model.complete(&req).await?;
        if is_refusal(&reply) {
            return Err(EnrichError::Refusal(reply));
        }
        let output = TranslationOutput::from_response(&reply)?;
        if is_refusal(&output.translation) {
            return Err(EnrichError::Refusal(output.translation));
        }
        Ok(output)
    }

    async fn commit(&self, item: &Self::Item, output: Self::Output) -> Result<bool> {
        self.store
            .record_review_translation(item.review_id, &output.translation, self.model.model_name())
            .await
    }

    async fn fail(&self, item: &Self::Item, note: &str) -> Result<bool> {
        self.store.fail_review_translation(item.review_id, note).await
    }
}
