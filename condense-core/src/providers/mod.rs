//! LLM provider implementations.
//!
//! Provides concrete implementations of the `SynthesisProvider` trait for:
//! - Anthropic Messages API (`anthropic`)
//! - OpenAI Chat Completions API (`openai`)
//! - OpenRouter Chat Completions API (`openrouter`)
//!
//! Every provider shares the prompt builder and the tag parser in [`tags`];
//! only the wire format differs. Providers are created through an explicit
//! [`ProviderRegistry`] handed to the orchestrator.

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod openrouter;
pub mod tags;

use crate::config::LlmConfig;
use crate::error::ProviderError;
use crate::types::{SearchResult, SynthesizedObservation};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;

/// Number of results included in a prompt.
pub const PROMPT_RESULT_LIMIT: usize = 5;
/// Characters of content previewed per result.
pub const PREVIEW_CHARS: usize = 200;
/// Longest error body kept in `ProviderError::Http`.
const ERROR_BODY_LIMIT: usize = 500;

/// An observation parsed from an LLM reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderObservation {
    pub observation: SynthesizedObservation,
    /// True when required tags were missing and defaults were substituted.
    pub degraded: bool,
}

/// A backend capable of turning search results into an observation.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Registry name, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Ask the backend for an observation of `results`.
    ///
    /// Non-2xx responses and transport failures are errors; a reply that
    /// lacks the expected tags is not.
    async fn synthesize(
        &self,
        query: &str,
        results: &[SearchResult],
        api_key: &str,
        model: &str,
    ) -> Result<ProviderObservation, ProviderError>;

    /// Cheap credential probe. Never errors: any failure reports `false`.
    async fn test_api_key(&self, api_key: &str) -> bool;
}

/// Per-provider construction options.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Override for the backend's default base URL.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Transport-level timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default(), None)
    }
}

impl ProviderOptions {
    pub fn from_config(config: &LlmConfig, base_url: Option<String>) -> Self {
        Self {
            base_url,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    pub(crate) fn http_client(&self, provider: &str) -> Result<reqwest::Client, ProviderError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ProviderError::Connection {
                provider: provider.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })
    }
}

/// Build the single user prompt shared by every backend.
pub fn build_prompt(query: &str, results: &[SearchResult]) -> String {
    let shown = results.len().min(PROMPT_RESULT_LIMIT);
    let mut prompt = format!(
        "Analyze these code search results and write one compact observation \
         for a developer who has not read the code.\n\n\
         Query: {query}\n\n\
         Results ({shown} of {}):\n",
        results.len()
    );

    for (i, result) in results.iter().take(PROMPT_RESULT_LIMIT).enumerate() {
        prompt.push_str(&format!(
            "\n[{}] {} (lines {}-{})\n{}\n",
            i + 1,
            result.path,
            result.start_line,
            result.end_line,
            preview(&result.content, PREVIEW_CHARS)
        ));
    }

    prompt.push_str(
        "\nRespond with exactly this structure and nothing else:\n\
         <observation>\n\
         \x20 <type>discovery|refactor|feature|bugfix</type>\n\
         \x20 <title>short title, under 80 characters</title>\n\
         \x20 <subtitle>one line of context</subtitle>\n\
         \x20 <narrative>2-4 sentences on what the code does and how it fits together</narrative>\n\
         \x20 <concepts>\n\
         \x20   <concept>key concept</concept>\n\
         \x20   (up to 5 concepts)\n\
         \x20 </concepts>\n\
         </observation>",
    );
    prompt
}

/// First `limit` characters of `content`, with an ellipsis when cut.
fn preview(content: &str, limit: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Map a `reqwest` send failure onto a provider error.
pub(crate) fn send_error(provider: &str, timeout: Duration, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        ProviderError::Connection {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Read a response body, failing on non-2xx, and decode it as JSON.
///
/// A transport failure while reading the body maps like a send failure.
pub(crate) async fn read_json(
    provider: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(provider, timeout, e))?;

    if !status.is_success() {
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: preview(&body, ERROR_BODY_LIMIT),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::ResponseParse {
        provider: provider.to_string(),
        message: format!("invalid JSON in response: {e}"),
    })
}

/// Builds a provider from construction options.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderOptions) -> Result<Arc<dyn SynthesisProvider>, ProviderError> + Send + Sync>;

/// Named provider factories, injected into the orchestrator.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
    config: LlmConfig,
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty(config: LlmConfig) -> Self {
        Self {
            factories: HashMap::new(),
            config,
        }
    }

    /// A registry with `anthropic`, `openai`, and `openrouter`.
    pub fn with_builtin(config: LlmConfig) -> Self {
        let mut registry = Self::empty(config);
        registry.register(anthropic::PROVIDER_NAME, |options| {
            Ok(Arc::new(AnthropicProvider::new(options)?) as Arc<dyn SynthesisProvider>)
        });
        registry.register(openai::PROVIDER_NAME, |options| {
            Ok(Arc::new(OpenAiProvider::new(options)?) as Arc<dyn SynthesisProvider>)
        });
        registry.register(openrouter::PROVIDER_NAME, |options| {
            Ok(Arc::new(OpenRouterProvider::new(options)?) as Arc<dyn SynthesisProvider>)
        });
        registry
    }

    /// Add or replace the factory for `name` (case-insensitive).
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ProviderOptions) -> Result<Arc<dyn SynthesisProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
    }

    /// Register an already-built provider instance under `name`.
    pub fn register_instance(&mut self, name: &str, provider: Arc<dyn SynthesisProvider>) {
        self.register(name, move |_| Ok(provider.clone()));
    }

    /// Instantiate the provider registered as `name`.
    pub fn create(&self, name: &str) -> Result<Arc<dyn SynthesisProvider>, ProviderError> {
        let key = name.to_ascii_lowercase();
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| ProviderError::UnknownProvider {
                name: name.to_string(),
            })?;
        let options =
            ProviderOptions::from_config(&self.config, self.config.base_urls.get(&key).cloned());
        factory(&options)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompt_lists_first_five_results() {
        let results: Vec<SearchResult> = (1..=7)
            .map(|i| SearchResult::new(format!("src/f{i}.rs"), i, i + 3, format!("fn f{i}() {{}}")))
            .collect();
        let prompt = build_prompt("find helpers", &results);
        assert!(prompt.contains("Query: find helpers"));
        assert!(prompt.contains("Results (5 of 7):"));
        assert!(prompt.contains("[1] src/f1.rs (lines 1-4)"));
        assert!(prompt.contains("[5] src/f5.rs (lines 5-8)"));
        assert!(!prompt.contains("src/f6.rs"));
        assert!(prompt.contains("<concepts>"));
        assert!(prompt.contains("<narrative>"));
    }

    #[test]
    fn test_prompt_truncates_preview() {
        let long = "x".repeat(450);
        let results = vec![SearchResult::new("big.ts", 1, 90, long)];
        let prompt = build_prompt("q", &results);
        assert!(prompt.contains(&format!("{}...", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn test_registry_builtin_names() {
        let registry = ProviderRegistry::with_builtin(LlmConfig::default());
        assert_eq!(registry.names(), vec!["anthropic", "openai", "openrouter"]);
    }

    #[test]
    fn test_registry_create_is_case_insensitive() {
        let registry = ProviderRegistry::with_builtin(LlmConfig::default());
        let provider = registry.create("OpenAI").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), openai::DEFAULT_MODEL);
    }

    #[test]
    fn test_registry_unknown_provider() {
        let registry = ProviderRegistry::with_builtin(LlmConfig::default());
        match registry.create("cohere") {
            Err(ProviderError::UnknownProvider { name }) => assert_eq!(name, "cohere"),
            Err(other) => panic!("Expected UnknownProvider, got {:?}", other),
            Ok(_) => panic!("Expected UnknownProvider, got a provider"),
        }
    }

    #[test]
    fn test_registry_register_instance() {
        let mut registry = ProviderRegistry::empty(LlmConfig::default());
        registry.register_instance("mock", Arc::new(MockProvider::with_response("<type>feature</type>")));
        let provider = registry.create("mock").unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_options_from_config() {
        let config = LlmConfig {
            max_tokens: 512,
            temperature: 0.1,
            request_timeout_secs: 9,
            ..Default::default()
        };
        let options = ProviderOptions::from_config(&config, Some("http://localhost:1234/".into()));
        assert_eq!(options.max_tokens, 512);
        assert_eq!(options.request_timeout, Duration::from_secs(9));
        assert_eq!(options.base_url_or("https://unused"), "http://localhost:1234");
    }

    #[tokio::test]
    async fn test_read_json_truncated_body_is_connection_error() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{\"partial")
                .unwrap();
        });

        let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
        let err = read_json("test", Duration::from_secs(5), response)
            .await
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ProviderError::Connection { .. }), "got {err:?}");
        assert!(err.is_network());
    }
}
