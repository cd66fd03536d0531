//! Core data types shared by the analyzer, providers, and orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single code-search hit handed to the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn new(
        path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
            content: content.into(),
            symbol: None,
            score: None,
        }
    }

    /// The file name component of `path`.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Classification of what the caller was looking for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    #[default]
    Discovery,
    Refactor,
    Feature,
    Bugfix,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::Discovery => "discovery",
            ObservationType::Refactor => "refactor",
            ObservationType::Feature => "feature",
            ObservationType::Bugfix => "bugfix",
        }
    }

    /// Parse a type tag as emitted by an LLM. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "discovery" => Some(ObservationType::Discovery),
            "refactor" => Some(ObservationType::Refactor),
            "feature" => Some(ObservationType::Feature),
            "bugfix" => Some(ObservationType::Bugfix),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The compact summary produced for one batch of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedObservation {
    #[serde(rename = "type")]
    pub kind: ObservationType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub narrative: String,
    pub concepts: Vec<String>,
    pub files_read: Vec<String>,
    pub token_count: usize,
}

/// Which engine is configured to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Heuristic first, escalating to an LLM only when confidence is low.
    #[default]
    Auto,
    /// Heuristic analysis only; never touches the network.
    Algorithmic,
    /// Always use the configured LLM provider.
    Llm,
}

impl std::fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisMode::Auto => write!(f, "auto"),
            SynthesisMode::Algorithmic => write!(f, "algorithmic"),
            SynthesisMode::Llm => write!(f, "llm"),
        }
    }
}

impl std::str::FromStr for SynthesisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SynthesisMode::Auto),
            "algorithmic" => Ok(SynthesisMode::Algorithmic),
            "llm" => Ok(SynthesisMode::Llm),
            other => Err(format!(
                "unknown synthesis mode '{other}' (expected auto, algorithmic, or llm)"
            )),
        }
    }
}

/// Which engine actually produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisPath {
    Algorithmic,
    Llm,
}

/// Aggregate counts feeding the heuristic confidence score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub result_count: usize,
    pub unique_symbol_count: usize,
    pub pattern_match_count: usize,
    pub file_diversity: usize,
}

/// The orchestrator's return envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub observation: SynthesizedObservation,
    pub mode: SynthesisPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub compression_ratio: f64,
    /// Set when an LLM response was missing required tags and defaults were used.
    #[serde(default)]
    pub degraded: bool,
}

/// Rough token estimate (~4 chars per token), rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Estimated token cost of reading every result's raw content.
pub fn raw_token_estimate(results: &[SearchResult]) -> f64 {
    results
        .iter()
        .map(|r| r.content.chars().count() as f64 / 4.0)
        .sum()
}

/// Ratio of raw-content tokens to synthesized tokens.
pub fn compression_ratio(results: &[SearchResult], synthesized_tokens: usize) -> f64 {
    raw_token_estimate(results) / synthesized_tokens.max(1) as f64
}

/// Sorted, deduplicated set of input paths.
pub fn unique_paths(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| r.path.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Last component of a `/` or `\` separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_result_camel_case() {
        let json = r#"{"path":"src/a.ts","startLine":3,"endLine":9,"content":"x","score":0.8}"#;
        let result: SearchResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.start_line, 3);
        assert_eq!(result.end_line, 9);
        assert_eq!(result.symbol, None);
        assert_eq!(result.score, Some(0.8));

        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["startLine"], 3);
        assert!(back.get("symbol").is_none());
    }

    #[test]
    fn test_observation_type_serializes_as_type() {
        let obs = SynthesizedObservation {
            kind: ObservationType::Bugfix,
            title: "t".into(),
            subtitle: None,
            narrative: "n".into(),
            concepts: vec![],
            files_read: vec!["a.rs".into()],
            token_count: 1,
        };
        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(value["type"], "bugfix");
        assert_eq!(value["filesRead"][0], "a.rs");
        assert_eq!(value["tokenCount"], 1);
    }

    #[test]
    fn test_observation_type_parse() {
        assert_eq!(ObservationType::parse(" Refactor "), Some(ObservationType::Refactor));
        assert_eq!(ObservationType::parse("BUGFIX"), Some(ObservationType::Bugfix));
        assert_eq!(ObservationType::parse("chore"), None);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("LLM".parse::<SynthesisMode>().unwrap(), SynthesisMode::Llm);
        assert_eq!("auto".parse::<SynthesisMode>().unwrap(), SynthesisMode::Auto);
        assert!("fast".parse::<SynthesisMode>().is_err());
        assert_eq!(SynthesisMode::Algorithmic.to_string(), "algorithmic");
    }

    #[test]
    fn test_unique_paths_sorted_dedup() {
        let results = vec![
            SearchResult::new("src/b.rs", 1, 2, ""),
            SearchResult::new("src/a.rs", 1, 2, ""),
            SearchResult::new("src/b.rs", 5, 8, ""),
        ];
        assert_eq!(unique_paths(&results), vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_token_estimates() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);

        let results = vec![
            SearchResult::new("a", 1, 1, "a".repeat(40)),
            SearchResult::new("b", 1, 1, "b".repeat(40)),
        ];
        assert_eq!(raw_token_estimate(&results), 20.0);
        assert_eq!(compression_ratio(&results, 5), 4.0);
        assert_eq!(compression_ratio(&results, 0), 20.0);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("src/server/app.ts"), "app.ts");
        assert_eq!(file_name("C:\\code\\main.rs"), "main.rs");
        assert_eq!(file_name("lib.rs"), "lib.rs");
    }
}
