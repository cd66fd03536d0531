//! Anthropic Messages API provider.
//!
//! Differences from the chat-completions backends:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - Reply text arrives as an array of content blocks

use super::{ProviderObservation, ProviderOptions, SynthesisProvider, build_prompt, read_json, send_error, tags};
use crate::error::ProviderError;
use crate::types::SearchResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "anthropic";

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Output budget for the key probe request.
const PROBE_MAX_TOKENS: u32 = 10;

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(options: &ProviderOptions) -> Result<Self, ProviderError> {
        Ok(Self {
            client: options.http_client(PROVIDER_NAME)?,
            base_url: options.base_url_or(DEFAULT_BASE_URL),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            request_timeout: options.request_timeout,
        })
    }

    fn build_request_body(&self, prompt: &str, model: &str, max_tokens: u32) -> Value {
        json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }

    async fn post_messages(&self, api_key: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        debug!(url = url.as_str(), "Sending Anthropic messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_NAME, self.request_timeout, e))?;

        read_json(PROVIDER_NAME, self.request_timeout, response).await
    }

    /// Concatenate the text of every `text` content block.
    fn response_text(body: &Value) -> Result<String, ProviderError> {
        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| ProviderError::ResponseParse {
                provider: PROVIDER_NAME.to_string(),
                message: "missing 'content' array in response".to_string(),
            })?;

        Ok(blocks
            .iter()
            .filter(|block| block["type"].as_str() == Some("text"))
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl SynthesisProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn synthesize(
        &self,
        query: &str,
        results: &[SearchResult],
        api_key: &str,
        model: &str,
    ) -> Result<ProviderObservation, ProviderError> {
        let prompt = build_prompt(query, results);
        let body = self.build_request_body(&prompt, model, self.max_tokens);
        let reply = self.post_messages(api_key, &body).await?;
        let text = Self::response_text(&reply)?;
        debug!(model, chars = text.len(), "Anthropic synthesis reply received");
        Ok(tags::parse_observation(&text))
    }

    async fn test_api_key(&self, api_key: &str) -> bool {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_request_body("Hi", DEFAULT_MODEL, PROBE_MAX_TOKENS);
        match self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Anthropic key probe failed");
                false
            }
        }
    }
}
