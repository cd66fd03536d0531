//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use condense_core::analyzer::confidence;
use condense_core::providers::tags::{parse_observation, render_observation};
use condense_core::types::unique_paths;
use condense_core::{HeuristicAnalyzer, Metrics, ObservationType, SearchResult, SynthesizedObservation};

fn metrics_strategy() -> impl Strategy<Value = Metrics> {
    (0usize..60, 0usize..60, 0usize..8, 0usize..30).prop_map(|(r, s, p, f)| Metrics {
        result_count: r,
        unique_symbol_count: s,
        pattern_match_count: p,
        file_diversity: f,
    })
}

fn result_strategy() -> impl Strategy<Value = SearchResult> {
    let path = prop::sample::select(vec![
        "src/a.ts",
        "src/b.py",
        "lib/c.rs",
        "web/App.jsx",
        "pkg/server.go",
        "README.md",
    ]);
    let content = prop::sample::select(vec![
        "class Foo {}",
        "def handler(request):\n    return None",
        "pub fn run() {}\nstruct Config;",
        "app.use(cors());",
        "func main() {}",
        "import React from 'react';\nfunction App() {}",
        "just some prose",
        "",
    ]);
    (path, content, 1u32..500).prop_map(|(path, content, start)| {
        SearchResult::new(path, start, start + 10, content)
    })
}

// --- Confidence properties ---

proptest! {
    #[test]
    fn confidence_stays_in_bounds(metrics in metrics_strategy()) {
        let c = confidence(&metrics);
        prop_assert!((0.5..=1.0).contains(&c));
    }

    #[test]
    fn confidence_is_monotonic_in_each_metric(metrics in metrics_strategy(), bump in 1usize..10) {
        let base = confidence(&metrics);
        let bumped = [
            Metrics { result_count: metrics.result_count + bump, ..metrics },
            Metrics { unique_symbol_count: metrics.unique_symbol_count + bump, ..metrics },
            Metrics { pattern_match_count: metrics.pattern_match_count + bump, ..metrics },
            Metrics { file_diversity: metrics.file_diversity + bump, ..metrics },
        ];
        for m in &bumped {
            prop_assert!(confidence(m) >= base - 1e-12);
        }
    }
}

// --- Analyzer properties ---

proptest! {
    #[test]
    fn analyzer_is_deterministic(
        query in "[a-z ]{0,24}",
        results in prop::collection::vec(result_strategy(), 0..8),
    ) {
        let analyzer = HeuristicAnalyzer::new();
        let first = analyzer.analyze(&query, &results);
        let second = analyzer.analyze(&query, &results);
        prop_assert_eq!(first.observation, second.observation);
        prop_assert_eq!(first.confidence, second.confidence);
        prop_assert_eq!(first.metrics, second.metrics);
    }

    #[test]
    fn files_read_is_sorted_unique_input_paths(
        results in prop::collection::vec(result_strategy(), 0..12),
    ) {
        let outcome = HeuristicAnalyzer::new().analyze("find things", &results);
        let files = &outcome.observation.files_read;
        prop_assert!(files.windows(2).all(|w| w[0] < w[1]));
        for r in &results {
            prop_assert!(files.contains(&r.path));
        }
        prop_assert_eq!(files, &unique_paths(&results));
        prop_assert_eq!(outcome.metrics.file_diversity, files.len());
    }

    #[test]
    fn token_count_is_positive_for_nonempty_narrative(
        results in prop::collection::vec(result_strategy(), 1..6),
    ) {
        let outcome = HeuristicAnalyzer::new().analyze("q", &results);
        prop_assert!(outcome.observation.token_count > 0);
        prop_assert!(outcome.compression_ratio >= 0.0);
    }
}

// --- Tag parser properties ---

fn text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 .,]{0,40}[A-Za-z0-9.]"
}

proptest! {
    #[test]
    fn tag_round_trip_preserves_fields(
        kind in prop::sample::select(vec![
            ObservationType::Discovery,
            ObservationType::Refactor,
            ObservationType::Feature,
            ObservationType::Bugfix,
        ]),
        title in text_strategy(),
        subtitle in prop::option::of(text_strategy()),
        narrative in text_strategy(),
        concepts in prop::collection::vec(text_strategy(), 0..5),
    ) {
        let original = SynthesizedObservation {
            kind,
            title,
            subtitle,
            narrative,
            concepts,
            files_read: Vec::new(),
            token_count: 0,
        };
        let parsed = parse_observation(&render_observation(&original));
        prop_assert!(!parsed.degraded);
        prop_assert_eq!(parsed.observation.kind, original.kind);
        prop_assert_eq!(&parsed.observation.title, &original.title);
        prop_assert_eq!(&parsed.observation.subtitle, &original.subtitle);
        prop_assert_eq!(&parsed.observation.narrative, &original.narrative);
        prop_assert_eq!(&parsed.observation.concepts, &original.concepts);
    }

    #[test]
    fn parser_never_panics(text in ".{0,400}") {
        let parsed = parse_observation(&text);
        prop_assert!(!parsed.observation.title.is_empty());
        prop_assert!(!parsed.observation.narrative.is_empty());
    }
}
