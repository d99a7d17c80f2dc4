//! OpenAI-compatible chat-completions client.
//!
//! Implements the model-call collaborator over HTTP. Usage counts arrive
//! under either `prompt_tokens`/`completion_tokens` or
//! `input_tokens`/`output_tokens` depending on the provider; they are
//! normalized to one internal pair right at this boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BenchConfig;
use crate::pipeline::{ChatMessage, ModelCaller, ModelError, ModelReply};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageWire>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Usage block as providers actually send it: two naming conventions for
/// the same two counters.
#[derive(Deserialize, Default)]
struct UsageWire {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

impl UsageWire {
    fn normalize(&self) -> (u64, u64) {
        let tokens_in = self.prompt_tokens.or(self.input_tokens).unwrap_or(0);
        let tokens_out = self.completion_tokens.or(self.output_tokens).unwrap_or(0);
        (tokens_in, tokens_out)
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Debug)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl ChatCompletionsClient {
    /// Build a client from the benchmark configuration. Fails before any
    /// request when no API key is configured.
    pub fn from_config(config: &BenchConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key.clone().ok_or(ModelError::MissingApiKey)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ModelCaller for ChatCompletionsClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelReply, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: CompletionResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ModelError::Decode("response carried no choices".into()))?;
        let (tokens_in, tokens_out) = body.usage.unwrap_or_default().normalize();

        debug!(model = %self.model, tokens_in, tokens_out, "completion returned");
        Ok(ModelReply {
            content,
            tokens_in,
            tokens_out,
        })
    }
}
