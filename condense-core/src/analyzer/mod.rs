//! Heuristic (non-LLM) synthesis.
//!
//! Compresses a batch of search results into one observation using regex
//! signal extraction and fixed templates, and scores how well the batch
//! supports a heuristic-only summary. Pure and deterministic: no I/O, and the
//! same input always produces the same observation and confidence.

pub mod context;
pub mod narrative;
pub mod patterns;

pub use context::{CodeContext, Language, OrderedSet};

use crate::types::{Metrics, SearchResult, SynthesizedObservation, compression_ratio, unique_paths};
use std::time::Instant;
use tracing::debug;

const BASE_CONFIDENCE: f64 = 0.5;
const MAX_TERM: f64 = 0.15;

/// Output of one heuristic pass.
#[derive(Debug, Clone)]
pub struct HeuristicOutcome {
    pub observation: SynthesizedObservation,
    pub confidence: f64,
    pub compression_ratio: f64,
    pub processing_time_ms: u64,
    pub metrics: Metrics,
}

/// Confidence that a heuristic summary is good enough, in `[0.5, 1.0]`.
///
/// Each metric contributes at most `0.15`; pattern matches only count when
/// at least one pattern was found.
pub fn confidence(metrics: &Metrics) -> f64 {
    let mut score = BASE_CONFIDENCE;
    score += (metrics.result_count as f64 / 20.0).min(MAX_TERM);
    score += (metrics.unique_symbol_count as f64 / 10.0).min(MAX_TERM);
    if metrics.pattern_match_count > 0 {
        score += (metrics.pattern_match_count as f64 * 0.1).min(MAX_TERM);
    }
    score += (metrics.file_diversity as f64 / 5.0).min(MAX_TERM);
    score.min(1.0)
}

/// Stateless heuristic analyzer. Cheap to construct and safe to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze `results` for `query`. Never fails.
    pub fn analyze(&self, query: &str, results: &[SearchResult]) -> HeuristicOutcome {
        let started = Instant::now();

        let mut context = CodeContext::extract(results);
        context.patterns = patterns::detect(results);
        let metrics = context.metrics(results);
        let confidence = confidence(&metrics);

        let mut files: Vec<String> = Vec::new();
        for result in results {
            if !files.contains(&result.path) {
                files.push(result.path.clone());
            }
        }

        let kind = narrative::classify(query);
        let text = narrative::narrative(&narrative::Summary {
            kind,
            query,
            result_count: results.len(),
            files: &files,
            context: &context,
        });

        let token_count = (text.chars().count() as f64 / 4.0
            + (metrics.unique_symbol_count * 2) as f64)
            .ceil() as usize;

        let observation = SynthesizedObservation {
            kind,
            title: narrative::title(kind, query, results.len()),
            subtitle: narrative::subtitle(&files, &context),
            narrative: text,
            concepts: narrative::concepts(query, &context),
            files_read: unique_paths(results),
            token_count,
        };

        let ratio = compression_ratio(results, token_count);
        debug!(
            kind = %kind,
            confidence,
            symbols = metrics.unique_symbol_count,
            patterns = metrics.pattern_match_count,
            files = metrics.file_diversity,
            "Heuristic analysis complete"
        );

        HeuristicOutcome {
            observation,
            confidence,
            compression_ratio: ratio,
            processing_time_ms: started.elapsed().as_millis() as u64,
            metrics,
        }
    }
}
