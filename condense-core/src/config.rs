//! Configuration for condense.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment -> explicit overrides. Files live at
//! `<config_dir>/condense/config.toml` and `<workspace>/.condense/config.toml`.

use crate::error::ConfigError;
use crate::types::SynthesisMode;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default confidence below which `auto` mode escalates to an LLM.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondenseConfig {
    pub synthesis: SynthesisSettings,
    pub llm: LlmConfig,
}

/// Runtime synthesis settings, replaceable through `Synthesizer::update_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub mode: SynthesisMode,
    /// Registry name of the LLM backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Explicit key. Takes precedence over `{PROVIDER}_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model override; the provider's default is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub confidence_threshold: f64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::Auto,
            provider: None,
            api_key: None,
            model: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl SynthesisSettings {
    /// The configured provider name, treating an empty string as unset.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Settings safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_deref().map(mask_key),
            ..self.clone()
        }
    }
}

/// A partial settings update. Only the fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SynthesisMode>,
    /// `Some("")` clears the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// `Some("")` clears the explicit key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// `Some("")` clears the model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge into `settings`, returning whether the provider name changed.
    pub fn apply_to(&self, settings: &mut SynthesisSettings) -> bool {
        let before = settings.provider.clone();

        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(provider) = &self.provider {
            settings.provider = non_empty(provider);
        }
        if let Some(key) = &self.api_key {
            settings.api_key = non_empty(key);
        }
        if let Some(model) = &self.model {
            settings.model = non_empty(model);
        }
        if let Some(threshold) = self.confidence_threshold {
            settings.confidence_threshold = threshold;
        }

        settings.provider != before
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// HTTP and deadline settings shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Transport timeout on each HTTP request.
    pub request_timeout_secs: u64,
    /// Overall deadline for one LLM synthesis call.
    pub deadline_secs: u64,
    /// Base URL overrides keyed by provider name.
    pub base_urls: HashMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.3,
            request_timeout_secs: 30,
            deadline_secs: 30,
            base_urls: HashMap::new(),
        }
    }
}

impl CondenseConfig {
    /// Validate the configuration and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Problems are reported as
    /// human-readable warnings rather than errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let threshold = self.synthesis.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            warnings.push(format!(
                "synthesis.confidence_threshold is {threshold}; expected a value between 0 and 1"
            ));
        }

        if self.synthesis.mode == SynthesisMode::Llm && self.synthesis.provider_name().is_none() {
            warnings.push(
                "synthesis.mode is 'llm' but no provider is configured; every call will fail"
                    .to_string(),
            );
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            warnings.push(format!(
                "llm.temperature is {}; expected a value between 0 and 2",
                self.llm.temperature
            ));
        }

        if self.llm.max_tokens == 0 {
            warnings.push("llm.max_tokens is 0; providers will return empty replies".to_string());
        }

        if self.llm.request_timeout_secs == 0 {
            warnings.push("llm.request_timeout_secs is 0; every request will time out".to_string());
        }

        if self.llm.deadline_secs == 0 {
            warnings.push("llm.deadline_secs is 0; every LLM call will time out".to_string());
        }

        warnings
    }

    /// Render as TOML with the API key masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let redacted = Self {
            synthesis: self.synthesis.redacted(),
            llm: self.llm.clone(),
        };
        toml::to_string_pretty(&redacted).map_err(|e| ConfigError::Invalid {
            message: format!("could not render configuration: {e}"),
        })
    }
}

/// Mask an API key for display, keeping only a short prefix and suffix.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "condense", "condense")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".condense").join("config.toml")
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SettingsUpdate>,
) -> Result<CondenseConfig, Box<figment::Error>> {
    build_figment(user_config_path().as_deref(), workspace, overrides)
        .extract()
        .map_err(Box::new)
}

fn build_figment(
    user_config: Option<&Path>,
    workspace: Option<&Path>,
    overrides: Option<&SettingsUpdate>,
) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(CondenseConfig::default()));

    if let Some(user_config) = user_config {
        if user_config.exists() {
            figment = figment.merge(Toml::file(user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(ws_config));
        }
    }

    // CONDENSE_SYNTHESIS__MODE, CONDENSE_LLM__DEADLINE_SECS, ...
    figment = figment.merge(Env::prefixed("CONDENSE_").split("__"));

    if let Some(overrides) = overrides.filter(|o| !o.is_empty()) {
        figment = figment.merge(Serialized::default("synthesis", overrides));
    }

    figment
}
