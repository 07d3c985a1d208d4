//! OpenAI chat-completions client behind the `ChatModel` seam the enrichment
//! stages are written against.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::util::env::{env_opt, env_parse};

use super::{ProviderError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: env_opt("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key: env_opt("OPENAI_API_KEY").unwrap_or_default(),
            model: env_opt("OPENAI_MODEL").unwrap_or_else(|| "gpt-4.1".to_string()),
            timeout: Duration::from_secs(env_parse("OPENAI_TIMEOUT_SECS", 120u64)),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// One completion request. The stages own their prompts and sampling knobs.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier stamped onto persisted results.
    fn model_name(&self) -> &str;

    /// Returns the raw assistant message content.
    async fn complete(&self, req: &ChatRequest) -> Result<String, ProviderError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    cfg: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("playerpulse/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self { client, cfg })
    }
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: String,
}

#[async_trait::async_trait]
impl ChatModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.cfg.model
    }

    async fn complete(&self, req: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.cfg.base_url);
        let body = Req {
            model: &self.cfg.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let max_attempts = self.cfg.retry.attempts.max(1);
        let mut delay = self.cfg.retry.base_delay.max(Duration::from_millis(1));
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let resp = match self
                .client
                .post(&url)
                .bearer_auth(&self.cfg.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    if attempt < max_attempts {
                        warn!(attempt, error = %e, "completion request failed; retrying");
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                        continue;
                    }
                    return Err(ProviderError::Net(e));
                }
            };
            let status = resp.status();
            if status.is_success() {
                let parsed: Resp = resp.json().await?;
                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(ProviderError::Other("empty completion content".into()));
                }
                return Ok(content);
            }
            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && attempt < max_attempts {
                warn!(
                    status = status.as_u16(),
                    attempt, "retryable completion status; backing off"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                continue;
            }
            let code = status.as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: code,
                body: text,
            });
        }
    }
}
