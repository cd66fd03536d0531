//! # Condense Core
//!
//! Synthesis engine for condense.
//! Compresses batches of code search results into compact observations,
//! either with a deterministic heuristic analyzer or through an LLM provider,
//! and decides between the two per call.

pub mod analyzer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod types;

// Re-export commonly used types at the crate root.
pub use analyzer::{HeuristicAnalyzer, HeuristicOutcome};
pub use config::{CondenseConfig, LlmConfig, SettingsUpdate, SynthesisSettings, load_config};
pub use credentials::{CredentialSource, EnvCredentialSource, InMemoryCredentialSource};
pub use error::{ConfigError, ProviderError, Result, SynthesisError};
pub use orchestrator::{Synthesizer, SynthesizerBuilder};
pub use providers::{MockProvider, ProviderObservation, ProviderRegistry, SynthesisProvider};
pub use types::{
    Metrics, ObservationType, SearchResult, SynthesisMode, SynthesisPath, SynthesisResult,
    SynthesizedObservation,
};
