//! Query classification and templated text for heuristic observations.

use crate::analyzer::context::CodeContext;
use crate::types::{ObservationType, file_name};
use regex::Regex;
use std::sync::LazyLock;

/// Ordered keyword checks; the first match wins.
static TYPE_RULES: LazyLock<Vec<(ObservationType, Regex)>> = LazyLock::new(|| {
    [
        (
            ObservationType::Refactor,
            r"(?i)\b(?:refactor\w*|restructur\w*|reorganiz\w*|clean\s*up|cleanup|optimi[sz]\w*|improv\w*|simplif\w*|renam\w*|extract\w*)",
        ),
        (
            ObservationType::Feature,
            r"(?i)\b(?:add(?:s|ed|ing)?|implement\w*|creat(?:e|es|ed|ing)|build\w*|feature\w*|new|support\w*)\b",
        ),
        (
            ObservationType::Bugfix,
            r"(?i)\b(?:bug\w*|fix\w*|error\w*|issue\w*|crash\w*|broken|fail\w*|exception\w*)",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("type regex must compile")))
    .collect()
});

/// Classify a query string into an observation type.
pub fn classify(query: &str) -> ObservationType {
    TYPE_RULES
        .iter()
        .find(|(_, rule)| rule.is_match(query))
        .map(|(kind, _)| *kind)
        .unwrap_or(ObservationType::Discovery)
}

/// Inputs shared by the text templates.
pub struct Summary<'a> {
    pub kind: ObservationType,
    pub query: &'a str,
    pub result_count: usize,
    /// Distinct file paths in first-seen order.
    pub files: &'a [String],
    pub context: &'a CodeContext,
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

fn segments(count: usize) -> String {
    plural(count, "code segment", "code segments")
}

pub fn narrative(summary: &Summary<'_>) -> String {
    let ctx = summary.context;
    let symbols = ctx.symbols();
    let n = summary.result_count;

    if summary.files.is_empty() {
        return generic(summary, &symbols.take(5));
    }

    match (summary.kind, summary.files.len() == 1) {
        (ObservationType::Discovery, true) => {
            let file = file_name(&summary.files[0]);
            let key = symbols.take(3);
            if key.is_empty() {
                format!(
                    "Found {} in {file} related to \"{}\".",
                    segments(n),
                    summary.query
                )
            } else {
                format!("Found {} in {file} defining {}.", segments(n), key.join(", "))
            }
        }
        (ObservationType::Discovery, false) => {
            let mut text = format!(
                "Found {} across {} files.",
                segments(n),
                summary.files.len()
            );
            let key = symbols.take(4);
            if !key.is_empty() {
                text.push_str(&format!(" Key symbols: {}.", key.join(", ")));
            }
            let patterns = ctx.patterns.take(2);
            if !patterns.is_empty() {
                text.push_str(&format!(" Detected patterns: {}.", patterns.join(", ")));
            }
            text
        }
        (ObservationType::Refactor, _) => match symbols.first() {
            Some(first) => format!(
                "Refactoring candidate centered on {first}: {} spanning {}.",
                segments(n),
                plural(symbols.len(), "symbol", "symbols")
            ),
            None => format!(
                "Identified {} that may benefit from refactoring.",
                segments(n)
            ),
        },
        (ObservationType::Feature, _) => {
            let files: Vec<&str> = summary.files.iter().take(3).map(String::as_str).collect();
            let mut text = format!("Feature work touches {}", files.join(", "));
            if summary.files.len() > files.len() {
                text.push_str(&format!(" and {} more", summary.files.len() - files.len()));
            }
            if !ctx.frameworks.is_empty() {
                let all: Vec<&str> = ctx.frameworks.iter().collect();
                text.push_str(&format!(" using {}", all.join(", ")));
            }
            text.push('.');
            text
        }
        _ => generic(summary, &symbols.take(5)),
    }
}

fn generic(summary: &Summary<'_>, symbols: &[&str]) -> String {
    let mut text = format!(
        "Found {} matching \"{}\".",
        segments(summary.result_count),
        summary.query
    );
    if !symbols.is_empty() {
        text.push_str(&format!(" Symbols: {}.", symbols.join(", ")));
    }
    text
}

pub fn title(kind: ObservationType, query: &str, result_count: usize) -> String {
    let results = plural(result_count, "result", "results");
    match kind {
        ObservationType::Discovery => format!("Code discovery: {query} ({results})"),
        ObservationType::Refactor => format!("Refactoring analysis: {query} ({results})"),
        ObservationType::Feature => format!("Feature implementation: {query} ({results})"),
        ObservationType::Bugfix => format!("Bug investigation: {query} ({results})"),
    }
}

/// File scope, first framework, and up to two symbols joined by `" | "`.
pub fn subtitle(files: &[String], context: &CodeContext) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    match files.len() {
        0 => {}
        1 => parts.push(file_name(&files[0]).to_string()),
        count => parts.push(format!("{count} files")),
    }
    if let Some(framework) = context.frameworks.first() {
        parts.push(framework.to_string());
    }
    let symbols = context.symbols();
    let key = symbols.take(2);
    if !key.is_empty() {
        parts.push(key.join(", "));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// Raw query first (even when blank), then classes, functions, frameworks, patterns, languages.
///
/// Categories are not deduplicated against each other.
pub fn concepts(query: &str, context: &CodeContext) -> Vec<String> {
    let mut concepts = vec![query.to_string()];
    concepts.extend(
        context
            .classes
            .take(3)
            .into_iter()
            .chain(context.functions.take(3))
            .chain(context.frameworks.take(2))
            .chain(context.patterns.take(2))
            .chain(context.languages.take(2))
            .map(str::to_string),
    );
    concepts
}
