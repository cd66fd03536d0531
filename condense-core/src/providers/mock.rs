//! Scriptable in-process provider for tests and offline runs.

use super::{ProviderObservation, SynthesisProvider, tags};
use crate::error::ProviderError;
use crate::types::SearchResult;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "mock-model";

/// How a scripted call should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Respond as if the backend returned this HTTP status.
    Status(u16),
    /// Respond as if the connection was refused.
    Connection,
}

/// A provider that returns canned replies without touching the network.
///
/// Replies go through the same tag parser as the real backends, so a mock
/// configured with untagged text yields a degraded observation.
pub struct MockProvider {
    name: String,
    reply: Mutex<String>,
    failure: Mutex<Option<MockFailure>>,
    delay: Option<Duration>,
    accepted_key: Option<String>,
    calls: AtomicUsize,
    probes: AtomicUsize,
    last_api_key: Mutex<Option<String>>,
    last_model: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            reply: Mutex::new(String::new()),
            failure: Mutex::new(None),
            delay: None,
            accepted_key: None,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            last_api_key: Mutex::new(None),
            last_model: Mutex::new(None),
        }
    }

    /// A mock that always replies with `text`.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        provider.set_response(text);
        provider
    }

    /// A mock whose every call fails.
    pub fn failing(failure: MockFailure) -> Self {
        let provider = Self::new();
        provider.set_failure(Some(failure));
        provider
    }

    /// Report a different registry name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Sleep this long before answering `synthesize`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Only this key passes `test_api_key`.
    pub fn accepting_key(mut self, key: &str) -> Self {
        self.accepted_key = Some(key.to_string());
        self
    }

    pub fn set_response(&self, text: &str) {
        *self.reply.lock().unwrap() = text.to_string();
    }

    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Number of `synthesize` calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `test_api_key` calls received.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.last_api_key.lock().unwrap().clone()
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_model.lock().unwrap().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn synthesize(
        &self,
        _query: &str,
        _results: &[SearchResult],
        api_key: &str,
        model: &str,
    ) -> Result<ProviderObservation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_api_key.lock().unwrap() = Some(api_key.to_string());
        *self.last_model.lock().unwrap() = Some(model.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(MockFailure::Status(status)) => Err(ProviderError::Http {
                provider: self.name.clone(),
                status,
                body: "mock failure".to_string(),
            }),
            Some(MockFailure::Connection) => Err(ProviderError::Connection {
                provider: self.name.clone(),
                message: "connection refused".to_string(),
            }),
            None => {
                let reply = self.reply.lock().unwrap().clone();
                Ok(tags::parse_observation(&reply))
            }
        }
    }

    async fn test_api_key(&self, api_key: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match &self.accepted_key {
            Some(accepted) => accepted == api_key,
            None => !api_key.is_empty(),
        }
    }
}
