//! OpenRouter provider.
//!
//! OpenRouter fronts many model vendors behind the chat-completions format,
//! so requests reuse the OpenAI helpers. No system message is sent and the
//! key probe hits `/auth/key`.

use super::openai::{chat_content, chat_request_body};
use super::{ProviderObservation, ProviderOptions, SynthesisProvider, build_prompt, read_json, send_error, tags};
use crate::error::ProviderError;
use crate::types::SearchResult;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "openrouter";

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-haiku";

/// Application name reported to OpenRouter.
const APP_TITLE: &str = "condense";

pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
}

impl OpenRouterProvider {
    pub fn new(options: &ProviderOptions) -> Result<Self, ProviderError> {
        Ok(Self {
            client: options.http_client(PROVIDER_NAME)?,
            base_url: options.base_url_or(DEFAULT_BASE_URL),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            request_timeout: options.request_timeout,
        })
    }
}

#[async_trait]
impl SynthesisProvider for OpenRouterProvider {
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
        let body = chat_request_body(None, &prompt, model, self.max_tokens, self.temperature);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, url = url.as_str(), "Sending OpenRouter chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", APP_TITLE)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_NAME, self.request_timeout, e))?;

        let reply = read_json(PROVIDER_NAME, self.request_timeout, response).await?;
        let text = chat_content(PROVIDER_NAME, &reply)?;
        Ok(tags::parse_observation(&text))
    }

    async fn test_api_key(&self, api_key: &str) -> bool {
        let url = format!("{}/auth/key", self.base_url);
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "OpenRouter key probe failed");
                false
            }
        }
    }
}
