//! OpenAI Chat Completions provider.
//!
//! Also hosts the chat-completions request and response helpers shared with
//! the OpenRouter backend, which speaks the same wire format.

use super::{ProviderObservation, ProviderOptions, SynthesisProvider, build_prompt, read_json, send_error, tags};
use crate::error::ProviderError;
use crate::types::SearchResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "openai";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str =
    "You are a code analysis assistant that writes concise, structured observations.";

/// Build a chat-completions request body with an optional system message.
pub(crate) fn chat_request_body(
    system: Option<&str>,
    prompt: &str,
    model: &str,
    max_tokens: u32,
    temperature: f32,
) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));

    json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": temperature,
        "messages": messages,
    })
}

/// Text of `choices[0].message.content`.
pub(crate) fn chat_content(provider: &str, body: &Value) -> Result<String, ProviderError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::ResponseParse {
            provider: provider.to_string(),
            message: "No choices in response".to_string(),
        })?;

    Ok(choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
}

impl OpenAiProvider {
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
impl SynthesisProvider for OpenAiProvider {
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
        let body = chat_request_body(
            Some(SYSTEM_PROMPT),
            &prompt,
            model,
            self.max_tokens,
            self.temperature,
        );
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, url = url.as_str(), "Sending OpenAI chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_NAME, self.request_timeout, e))?;

        let reply = read_json(PROVIDER_NAME, self.request_timeout, response).await?;
        let text = chat_content(PROVIDER_NAME, &reply)?;
        Ok(tags::parse_observation(&text))
    }

    async fn test_api_key(&self, api_key: &str) -> bool {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "OpenAI key probe failed");
                false
            }
        }
    }
}
