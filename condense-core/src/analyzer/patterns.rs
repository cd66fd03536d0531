//! Design-pattern signature detection.

use crate::analyzer::context::OrderedSet;
use crate::types::SearchResult;
use regex::Regex;
use std::sync::LazyLock;

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("factory", r"[Ff]actory\b|\bcreate[A-Z]\w*\s*\("),
        (
            "singleton",
            r"\bgetInstance\s*\(|[Ss]ingleton\b|\bstatic\s+(?:\w+\s+)?instance\b|\bOnceLock<|\blazy_static!",
        ),
        (
            "observer",
            r#"[Oo]bserver\b|\b(?:subscribe|unsubscribe|addEventListener|removeEventListener|emit|notifyObservers)\s*\(|\.on\(\s*['"]"#,
        ),
        ("repository", r"[Rr]epository\b|\bfind(?:By\w+|All|One)\s*\("),
        ("strategy", r"[Ss]trategy\b"),
        ("decorator", r"(?m)^\s*@[A-Za-z_][\w.]*|[Dd]ecorator\b"),
        ("middleware", r"[Mm]iddleware\b|\bapp\.use\s*\(|\bnext\s*\(\s*\)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("pattern regex must compile")))
    .collect()
});

/// Names of the design patterns whose signature appears in any result.
///
/// Each pattern stops scanning at its first matching result. Output follows
/// the fixed table order.
pub fn detect(results: &[SearchResult]) -> OrderedSet {
    let mut found = OrderedSet::default();
    for (name, signature) in PATTERNS.iter() {
        if results.iter().any(|r| signature.is_match(&r.content)) {
            found.insert(*name);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn one(content: &str) -> Vec<SearchResult> {
        vec![SearchResult::new("src/x.ts", 1, 10, content)]
    }

    #[test]
    fn test_detects_each_pattern() {
        assert_eq!(detect(&one("class WidgetFactory {}")).take(7), vec!["factory"]);
        assert_eq!(
            detect(&one("return Config.getInstance();")).take(7),
            vec!["singleton"]
        );
        assert_eq!(
            detect(&one("bus.subscribe(handler);")).take(7),
            vec!["observer"]
        );
        assert_eq!(
            detect(&one("const u = users.findById(id);")).take(7),
            vec!["repository"]
        );
        assert_eq!(
            detect(&one("interface PricingStrategy {}")).take(7),
            vec!["strategy"]
        );
        assert_eq!(detect(&one("@Injectable\nclass A {}")).take(7), vec!["decorator"]);
        assert_eq!(
            detect(&one("function authMiddleware(req, res) {}")).take(7),
            vec!["middleware"]
        );
    }

    #[test]
    fn test_pattern_counted_once_across_results() {
        let results = vec![
            SearchResult::new("a.js", 1, 2, "app.use(cors());"),
            SearchResult::new("b.js", 1, 2, "app.use(helmet());"),
        ];
        let found = detect(&results);
        assert_eq!(found.len(), 1);
        assert_eq!(found.first(), Some("middleware"));
    }

    #[test]
    fn test_multiple_patterns_follow_table_order() {
        let results = vec![
            SearchResult::new("a.ts", 1, 2, "class UserRepository {}"),
            SearchResult::new("b.ts", 1, 2, "const s = createStore();"),
        ];
        assert_eq!(detect(&results).take(7), vec!["factory", "repository"]);
    }

    #[test]
    fn test_plain_code_has_no_patterns() {
        assert!(detect(&one("let total = a + b;")).is_empty());
        assert!(detect(&[]).is_empty());
    }
}
