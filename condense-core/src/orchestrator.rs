//! The synthesis orchestrator.
//!
//! `Synthesizer` picks between the heuristic analyzer and an LLM provider
//! according to the configured mode, resolves credentials, enforces the
//! per-call deadline, and falls back to the heuristic result when an `auto`
//! escalation fails.
//!
//! Settings and the active provider live behind a single lock so that each
//! call works from one consistent snapshot, and no lock is held across an
//! `.await`.

use crate::analyzer::{HeuristicAnalyzer, HeuristicOutcome};
use crate::config::{CondenseConfig, SettingsUpdate, SynthesisSettings};
use crate::credentials::{CredentialSource, EnvCredentialSource, env_var_for};
use crate::error::{ProviderError, Result, SynthesisError};
use crate::providers::{ProviderObservation, ProviderRegistry, SynthesisProvider};
use crate::types::{
    SearchResult, SynthesisMode, SynthesisPath, SynthesisResult, compression_ratio, unique_paths,
};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Confidence reported for LLM-produced observations.
pub const LLM_CONFIDENCE: f64 = 0.95;

/// Default deadline for one LLM call.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

type ProviderHandle = Arc<dyn SynthesisProvider>;

struct ActiveState {
    settings: SynthesisSettings,
    provider: Option<ProviderHandle>,
}

/// Turns search results into observations. Shareable through `Arc`.
pub struct Synthesizer {
    state: RwLock<ActiveState>,
    registry: ProviderRegistry,
    credentials: Arc<dyn CredentialSource>,
    analyzer: HeuristicAnalyzer,
    llm_timeout: Duration,
}

/// Builder for [`Synthesizer`].
pub struct SynthesizerBuilder {
    settings: SynthesisSettings,
    registry: Option<ProviderRegistry>,
    credentials: Option<Arc<dyn CredentialSource>>,
    llm_timeout: Duration,
}

impl SynthesizerBuilder {
    pub fn settings(mut self, settings: SynthesisSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Deadline applied to every LLM call.
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn build(self) -> Synthesizer {
        let registry = self
            .registry
            .unwrap_or_else(|| ProviderRegistry::with_builtin(Default::default()));
        let provider = build_provider(&registry, self.settings.provider_name());

        Synthesizer {
            state: RwLock::new(ActiveState {
                settings: self.settings,
                provider,
            }),
            registry,
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(EnvCredentialSource)),
            analyzer: HeuristicAnalyzer::new(),
            llm_timeout: self.llm_timeout,
        }
    }
}

/// Instantiate `name` from `registry`, logging instead of failing.
fn build_provider(registry: &ProviderRegistry, name: Option<&str>) -> Option<ProviderHandle> {
    let name = name?;
    match registry.create(name) {
        Ok(provider) => {
            debug!(provider = name, "LLM provider activated");
            Some(provider)
        }
        Err(e) => {
            warn!(provider = name, error = %e, "Could not create LLM provider; LLM synthesis disabled");
            None
        }
    }
}

impl Synthesizer {
    /// Create an orchestrator with the built-in providers and environment credentials.
    pub fn new(settings: SynthesisSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    /// Create an orchestrator from a loaded configuration.
    pub fn from_config(config: &CondenseConfig) -> Self {
        Self::builder()
            .settings(config.synthesis.clone())
            .registry(ProviderRegistry::with_builtin(config.llm.clone()))
            .llm_timeout(Duration::from_secs(config.llm.deadline_secs))
            .build()
    }

    pub fn builder() -> SynthesizerBuilder {
        SynthesizerBuilder {
            settings: SynthesisSettings::default(),
            registry: None,
            credentials: None,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    /// Synthesize one observation for `results`.
    pub async fn synthesize(&self, query: &str, results: &[SearchResult]) -> Result<SynthesisResult> {
        self.synthesize_with_cancel(query, results, &CancellationToken::new())
            .await
    }

    /// Like [`synthesize`](Self::synthesize), but an in-flight LLM call stops
    /// when `cancel` fires. In `auto` mode a cancelled call falls back to the
    /// heuristic result.
    pub async fn synthesize_with_cancel(
        &self,
        query: &str,
        results: &[SearchResult],
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult> {
        let started = Instant::now();
        let (settings, provider) = self.snapshot();

        debug!(
            mode = %settings.mode,
            results = results.len(),
            provider = provider.as_ref().map(|p| p.name()),
            "Synthesizing observation"
        );

        let mut result = match settings.mode {
            SynthesisMode::Algorithmic => heuristic_result(self.analyzer.analyze(query, results)),
            SynthesisMode::Llm => {
                let provider = provider.ok_or_else(|| missing_provider(&settings))?;
                let api_key = self.resolve_api_key(&settings).ok_or_else(|| {
                    SynthesisError::MissingConfiguration {
                        reason: missing_key_reason(provider.name()),
                    }
                })?;
                let parsed = self
                    .call_llm(&provider, &settings, &api_key, query, results, cancel)
                    .await?;
                llm_result(provider.name(), parsed, results)
            }
            SynthesisMode::Auto => {
                let outcome = self.analyzer.analyze(query, results);
                if outcome.confidence >= settings.confidence_threshold {
                    heuristic_result(outcome)
                } else {
                    self.escalate(outcome, provider, &settings, query, results, cancel)
                        .await
                }
            }
        };

        result.observation.files_read = unique_paths(results);
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            path = ?result.mode,
            provider = result.provider.as_deref(),
            confidence = result.confidence,
            elapsed_ms = result.processing_time_ms,
            "Synthesis complete"
        );
        Ok(result)
    }

    /// Low-confidence `auto` path: try the LLM once, else keep the heuristic.
    async fn escalate(
        &self,
        outcome: HeuristicOutcome,
        provider: Option<ProviderHandle>,
        settings: &SynthesisSettings,
        query: &str,
        results: &[SearchResult],
        cancel: &CancellationToken,
    ) -> SynthesisResult {
        let (Some(provider), Some(api_key)) = (provider, self.resolve_api_key(settings)) else {
            debug!(
                confidence = outcome.confidence,
                "Heuristic confidence below threshold but no LLM is configured"
            );
            return heuristic_result(outcome);
        };

        match self
            .call_llm(&provider, settings, &api_key, query, results, cancel)
            .await
        {
            Ok(parsed) => llm_result(provider.name(), parsed, results),
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    network = e.is_network(),
                    error = %e,
                    "LLM synthesis failed, using heuristic result"
                );
                heuristic_result(outcome)
            }
        }
    }

    async fn call_llm(
        &self,
        provider: &ProviderHandle,
        settings: &SynthesisSettings,
        api_key: &str,
        query: &str,
        results: &[SearchResult],
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderObservation, ProviderError> {
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        debug!(provider = provider.name(), model = model.as_str(), "Calling LLM provider");

        let call = tokio::time::timeout(
            self.llm_timeout,
            provider.synthesize(query, results, api_key, &model),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            outcome = call => match outcome {
                Ok(reply) => reply,
                Err(_) => Err(ProviderError::Timeout {
                    timeout_secs: self.llm_timeout.as_secs(),
                }),
            },
        }
    }

    /// Key for the configured provider: explicit setting first, then
    /// `{PROVIDER}_API_KEY` from the credential source.
    pub fn resolve_api_key(&self, settings: &SynthesisSettings) -> Option<String> {
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Some(key.to_string());
        }
        let provider = settings.provider_name()?;
        self.credentials.get(&env_var_for(provider))
    }

    /// Merge `update` into the current settings. A provider change rebuilds
    /// the active provider immediately; failures disable LLM synthesis
    /// rather than erroring.
    pub fn update_settings(&self, update: SettingsUpdate) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = state.settings.clone();
        if update.apply_to(&mut next) {
            state.provider = build_provider(&self.registry, next.provider_name());
            info!(
                provider = next.provider_name().unwrap_or("none"),
                "Synthesis provider changed"
            );
        }
        state.settings = next;
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> SynthesisSettings {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .clone()
    }

    /// Name of the active provider, if one was built.
    pub fn active_provider(&self) -> Option<String> {
        self.snapshot().1.map(|p| p.name().to_string())
    }

    /// Probe `api_key` against the active provider. `false` when none is active.
    pub async fn test_api_key(&self, api_key: &str) -> bool {
        match self.snapshot().1 {
            Some(provider) => provider.test_api_key(api_key).await,
            None => false,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn snapshot(&self) -> (SynthesisSettings, Option<ProviderHandle>) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.settings.clone(), state.provider.clone())
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(SynthesisSettings::default())
    }
}

fn heuristic_result(outcome: HeuristicOutcome) -> SynthesisResult {
    SynthesisResult {
        observation: outcome.observation,
        mode: SynthesisPath::Algorithmic,
        provider: None,
        confidence: outcome.confidence,
        processing_time_ms: outcome.processing_time_ms,
        compression_ratio: outcome.compression_ratio,
        degraded: false,
    }
}

fn llm_result(provider: &str, parsed: ProviderObservation, results: &[SearchResult]) -> SynthesisResult {
    SynthesisResult {
        compression_ratio: compression_ratio(results, parsed.observation.token_count),
        observation: parsed.observation,
        mode: SynthesisPath::Llm,
        provider: Some(provider.to_string()),
        confidence: LLM_CONFIDENCE,
        processing_time_ms: 0,
        degraded: parsed.degraded,
    }
}

fn missing_provider(settings: &SynthesisSettings) -> SynthesisError {
    let reason = match settings.provider_name() {
        Some(name) => format!("LLM provider '{name}' is not available"),
        None => "LLM mode requires a provider".to_string(),
    };
    SynthesisError::MissingConfiguration { reason }
}

fn missing_key_reason(provider: &str) -> String {
    format!(
        "no API key for provider '{provider}' (set synthesis.api_key or {})",
        env_var_for(provider)
    )
}
