//! Credential lookup for LLM provider API keys.
//!
//! Provides a trait-based abstraction over where keys come from, with two
//! implementations:
//! - `EnvCredentialSource`: reads `{PROVIDER}_API_KEY` from the process environment.
//! - `InMemoryCredentialSource`: a fixed map, for tests and embedding hosts.

use std::collections::HashMap;
use std::sync::Mutex;

/// Source of API keys, keyed by environment-variable style names.
pub trait CredentialSource: Send + Sync {
    /// Value for `name`, or `None` when unset or empty.
    fn get(&self, name: &str) -> Option<String>;
}

/// Variable name holding the key for `provider`, e.g. `OPENAI_API_KEY`.
pub fn env_var_for(provider: &str) -> String {
    let upper: String = provider
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{upper}_API_KEY")
}

/// Reads credentials from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory credential source.
///
/// Thread-safe via `Mutex<HashMap>`. Does not persist across process restarts.
#[derive(Default)]
pub struct InMemoryCredentialSource {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.values.lock().unwrap().remove(name);
    }
}

impl CredentialSource for InMemoryCredentialSource {
    fn get(&self, name: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}
