//! Code context extraction: languages, frameworks, and symbols.
//!
//! Every result is scanned with the symbol table of *its own* language, so a
//! batch mixing Rust and TypeScript extracts symbols from both.

use crate::types::{Metrics, SearchResult};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Languages recognized from file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Kotlin,
    CSharp,
    Ruby,
    Php,
    Swift,
    C,
    Cpp,
}

impl Language {
    /// Detect a language from the extension of `path`.
    pub fn from_path(path: &str) -> Option<Self> {
        let file = crate::types::file_name(path);
        let (_, ext) = file.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "cs" => Some(Language::CSharp),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            "swift" => Some(Language::Swift),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::CSharp => "C#",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Swift => "Swift",
            Language::C => "C",
            Language::Cpp => "C++",
        }
    }
}

/// An insertion-ordered set of strings. Keeps analyzer output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    items: Vec<String>,
}

impl OrderedSet {
    /// Insert `value` if not already present. Returns whether it was added.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.items.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.items.first().map(String::as_str)
    }

    /// The first `n` entries, in insertion order.
    pub fn take(&self, n: usize) -> Vec<&str> {
        self.iter().take(n).collect()
    }
}

/// Signals extracted from one batch of search results.
#[derive(Debug, Clone, Default)]
pub struct CodeContext {
    pub languages: OrderedSet,
    pub frameworks: OrderedSet,
    pub classes: OrderedSet,
    pub functions: OrderedSet,
    pub interfaces: OrderedSet,
    pub variables: OrderedSet,
    pub patterns: OrderedSet,
}

impl CodeContext {
    /// Scan every result for languages, frameworks, and symbols.
    ///
    /// Patterns are filled in separately by [`super::patterns::detect`].
    pub fn extract(results: &[SearchResult]) -> Self {
        let mut context = CodeContext::default();

        for result in results {
            let language = Language::from_path(&result.path);
            if let Some(lang) = language {
                context.languages.insert(lang.name());
            }

            for (name, signature) in FRAMEWORKS.iter() {
                if signature.is_match(&result.content) {
                    context.frameworks.insert(*name);
                }
            }

            let rules = symbol_rules(language);
            collect(&rules.classes, &result.content, &mut context.classes);
            collect(&rules.functions, &result.content, &mut context.functions);
            collect(&rules.interfaces, &result.content, &mut context.interfaces);
            collect(&rules.variables, &result.content, &mut context.variables);
        }

        context
    }

    /// Classes, then functions, then interfaces, without duplicates.
    pub fn symbols(&self) -> OrderedSet {
        let mut all = OrderedSet::default();
        for name in self
            .classes
            .iter()
            .chain(self.functions.iter())
            .chain(self.interfaces.iter())
        {
            all.insert(name);
        }
        all
    }

    /// Size of the union of class, function, and interface names.
    pub fn unique_symbol_count(&self) -> usize {
        self.classes
            .iter()
            .chain(self.functions.iter())
            .chain(self.interfaces.iter())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn metrics(&self, results: &[SearchResult]) -> Metrics {
        Metrics {
            result_count: results.len(),
            unique_symbol_count: self.unique_symbol_count(),
            pattern_match_count: self.patterns.len(),
            file_diversity: results
                .iter()
                .map(|r| r.path.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

/// Control-flow keywords that loose function regexes (C family, JVM) can capture.
const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "return", "catch", "sizeof", "new", "do",
];

/// Push the first non-empty capture group of every match into `into`.
fn collect(patterns: &[Regex], content: &str, into: &mut OrderedSet) {
    for pattern in patterns {
        for caps in pattern.captures_iter(content) {
            if let Some(name) = caps.iter().skip(1).flatten().next() {
                if !KEYWORDS.contains(&name.as_str()) {
                    into.insert(name.as_str());
                }
            }
        }
    }
}

/// Symbol-extraction regexes for one language family.
struct SymbolRules {
    classes: Vec<Regex>,
    functions: Vec<Regex>,
    interfaces: Vec<Regex>,
    variables: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("symbol regex must compile"))
        .collect()
}

fn rules(classes: &[&str], functions: &[&str], interfaces: &[&str], variables: &[&str]) -> SymbolRules {
    SymbolRules {
        classes: compile(classes),
        functions: compile(functions),
        interfaces: compile(interfaces),
        variables: compile(variables),
    }
}

static ECMASCRIPT_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\bclass\s+([A-Za-z_$][\w$]*)"],
        &[
            r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(",
            r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
        ],
        &[
            r"\binterface\s+([A-Za-z_$][\w$]*)",
            r"\btype\s+([A-Z][\w$]*)\s*(?:<[^>]*>)?\s*=",
        ],
        &[r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*="],
    )
});

static PYTHON_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"(?m)^\s*class\s+([A-Za-z_]\w*)"],
        &[r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)"],
        &[r"(?m)^\s*class\s+([A-Za-z_]\w*)\s*\((?:[\w.]*\.)?(?:Protocol|ABC)\b"],
        &[r"(?m)^([A-Z_][A-Z0-9_]*)\s*="],
    )
});

static RUST_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\b(?:struct|enum|union)\s+([A-Za-z_]\w*)"],
        &[r"\bfn\s+([A-Za-z_]\w*)"],
        &[r"\btrait\s+([A-Za-z_]\w*)"],
        &[r"\b(?:let(?:\s+mut)?|const|static)\s+([A-Za-z_]\w*)"],
    )
});

static GO_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\btype\s+([A-Za-z_]\w*)\s+struct\b"],
        &[r"\bfunc\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)"],
        &[r"\btype\s+([A-Za-z_]\w*)\s+interface\b"],
        &[r"\b([A-Za-z_]\w*)\s*:="],
    )
});

static JVM_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\b(?:class|enum|record|object)\s+([A-Z]\w*)"],
        &[
            r"\b(?:public|private|protected|internal|static)\s+[\w<>\[\],.?\s]*?\s([a-zA-Z_]\w*)\s*\(",
            r"\bfun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([a-zA-Z_]\w*)\s*\(",
        ],
        &[r"\binterface\s+([A-Z]\w*)"],
        &[r"\b(?:val|var)\s+([a-zA-Z_]\w*)"],
    )
});

static RUBY_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\b(?:class|module)\s+([A-Z]\w*)"],
        &[r"\bdef\s+(?:self\.)?([a-z_]\w*[?!]?)"],
        &[],
        &[r"(?m)^\s*([A-Z_][A-Z0-9_]*)\s*="],
    )
});

static PHP_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\bclass\s+([A-Za-z_]\w*)"],
        &[r"\bfunction\s+([A-Za-z_]\w*)"],
        &[r"\binterface\s+([A-Za-z_]\w*)", r"\btrait\s+([A-Za-z_]\w*)"],
        &[r"\$([A-Za-z_]\w*)\s*="],
    )
});

static SWIFT_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\b(?:class|struct|enum|actor)\s+([A-Z]\w*)"],
        &[r"\bfunc\s+([A-Za-z_]\w*)"],
        &[r"\bprotocol\s+([A-Za-z_]\w*)"],
        &[r"\b(?:let|var)\s+([A-Za-z_]\w*)"],
    )
});

static C_FAMILY_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\b(?:class|struct)\s+([A-Za-z_]\w*)\s*(?:final\s*)?[:{]"],
        &[r"(?m)^[\w:<>,\*&\s]*?\b([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:const\s*)?\{"],
        &[],
        &[],
    )
});

static GENERIC_RULES: LazyLock<SymbolRules> = LazyLock::new(|| {
    rules(
        &[r"\bclass\s+([A-Za-z_]\w*)"],
        &[r"\bfunction\s+([A-Za-z_]\w*)", r"\bdef\s+([A-Za-z_]\w*)", r"\bfn\s+([A-Za-z_]\w*)"],
        &[r"\binterface\s+([A-Za-z_]\w*)"],
        &[],
    )
});

fn symbol_rules(language: Option<Language>) -> &'static SymbolRules {
    match language {
        Some(Language::TypeScript | Language::JavaScript) => &ECMASCRIPT_RULES,
        Some(Language::Python) => &PYTHON_RULES,
        Some(Language::Rust) => &RUST_RULES,
        Some(Language::Go) => &GO_RULES,
        Some(Language::Java | Language::Kotlin | Language::CSharp) => &JVM_RULES,
        Some(Language::Ruby) => &RUBY_RULES,
        Some(Language::Php) => &PHP_RULES,
        Some(Language::Swift) => &SWIFT_RULES,
        Some(Language::C | Language::Cpp) => &C_FAMILY_RULES,
        None => &GENERIC_RULES,
    }
}

/// Framework signatures tested against raw content.
static FRAMEWORKS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "React",
            r#"from\s+['"]react['"]|require\(\s*['"]react['"]\s*\)|\buse(?:State|Effect|Memo|Callback|Ref)\s*\("#,
        ),
        (
            "Vue",
            r#"from\s+['"]vue['"]|\bdefineComponent\s*\(|\bcreateApp\s*\("#,
        ),
        (
            "Angular",
            r#"from\s+['"]@angular/|@(?:Component|NgModule|Injectable)\s*\("#,
        ),
        ("Next.js", r#"from\s+['"]next(?:/[\w-]+)*['"]|\bgetServerSideProps\b"#),
        (
            "Express",
            r#"require\(\s*['"]express['"]\s*\)|from\s+['"]express['"]|\bexpress\(\s*\)"#,
        ),
        ("NestJS", r#"from\s+['"]@nestjs/"#),
        ("Django", r"\bfrom\s+django\b|\bimport\s+django\b"),
        ("Flask", r"\bfrom\s+flask\s+import\b|\bFlask\(\s*__name__"),
        ("FastAPI", r"\bfrom\s+fastapi\s+import\b|\bFastAPI\(\s*\)"),
        (
            "Spring",
            r"@(?:SpringBootApplication|RestController|Autowired)\b|\bimport\s+org\.springframework\.",
        ),
        ("Tokio", r"#\[tokio::(?:main|test)\]|\btokio::"),
        ("Axum", r"\baxum::|\buse\s+axum\b"),
        ("Actix Web", r"\bactix_web::|\buse\s+actix_web\b"),
        (
            "Rails",
            r"<\s*(?:ApplicationController|ApplicationRecord|ActiveRecord::Base)\b",
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("framework regex must compile")))
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path("src/app.tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_path("lib/Main.KT"), Some(Language::Kotlin));
        assert_eq!(Language::from_path("a/b/c.rs"), Some(Language::Rust));
        assert_eq!(Language::from_path("Makefile"), None);
        assert_eq!(Language::from_path("archive.tar.gz"), None);
        assert_eq!(Language::CSharp.name(), "C#");
    }

    #[test]
    fn test_ordered_set_keeps_first_seen_order() {
        let mut set = OrderedSet::default();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        assert_eq!(set.take(5), vec!["b", "a"]);
        assert_eq!(set.first(), Some("b"));
        assert!(set.contains("a"));
    }

    #[test]
    fn test_extract_typescript_symbols() {
        let results = vec![SearchResult::new(
            "src/user.ts",
            1,
            20,
            "export interface User { id: string }\n\
             export type UserId = string;\n\
             export class UserService {}\n\
             export function loadUser(id: UserId) {}\n\
             const saveUser = async (u: User) => {};\n\
             const MAX = 3;",
        )];
        let ctx = CodeContext::extract(&results);
        assert_eq!(ctx.languages.take(5), vec!["TypeScript"]);
        assert_eq!(ctx.classes.take(5), vec!["UserService"]);
        assert_eq!(ctx.functions.take(5), vec!["loadUser", "saveUser"]);
        assert_eq!(ctx.interfaces.take(5), vec!["User", "UserId"]);
        assert!(ctx.variables.contains("MAX"));
        assert_eq!(ctx.unique_symbol_count(), 5);
    }

    #[test]
    fn test_extract_uses_each_results_own_language() {
        let results = vec![
            SearchResult::new("src/lib.rs", 1, 5, "pub struct Cache;\npub trait Store {}\nfn evict() {}"),
            SearchResult::new("app/models.py", 1, 5, "class Order:\n    def total(self):\n        pass"),
        ];
        let ctx = CodeContext::extract(&results);
        assert_eq!(ctx.languages.take(5), vec!["Rust", "Python"]);
        assert_eq!(ctx.classes.take(5), vec!["Cache", "Order"]);
        assert_eq!(ctx.functions.take(5), vec!["evict", "total"]);
        assert_eq!(ctx.interfaces.take(5), vec!["Store"]);
    }

    #[test]
    fn test_extract_go_symbols() {
        let results = vec![SearchResult::new(
            "pkg/server.go",
            1,
            9,
            "type Server struct {}\ntype Handler interface {}\nfunc (s *Server) Start() {}\nfunc main() { port := 80 }",
        )];
        let ctx = CodeContext::extract(&results);
        assert_eq!(ctx.classes.take(5), vec!["Server"]);
        assert_eq!(ctx.interfaces.take(5), vec!["Handler"]);
        assert_eq!(ctx.functions.take(5), vec!["Start", "main"]);
        assert!(ctx.variables.contains("port"));
    }

    #[test]
    fn test_extract_unknown_extension_uses_generic_rules() {
        let results = vec![SearchResult::new(
            "notes/snippet",
            1,
            3,
            "class Foo {}\nfunction bar() {}\ninterface Baz {}",
        )];
        let ctx = CodeContext::extract(&results);
        assert!(ctx.languages.is_empty());
        assert_eq!(ctx.symbols().take(5), vec!["Foo", "bar", "Baz"]);
    }

    #[test]
    fn test_framework_detection() {
        let results = vec![
            SearchResult::new(
                "web/App.jsx",
                1,
                4,
                "import React, { useState } from 'react';\nconst [n, setN] = useState(0);",
            ),
            SearchResult::new("api/main.py", 1, 2, "from fastapi import FastAPI\napp = FastAPI()"),
            SearchResult::new("src/main.rs", 1, 2, "#[tokio::main]\nasync fn main() {}"),
        ];
        let ctx = CodeContext::extract(&results);
        assert_eq!(ctx.frameworks.take(5), vec!["React", "FastAPI", "Tokio"]);
    }

    #[test]
    fn test_metrics_counts() {
        let results = vec![
            SearchResult::new("a.rs", 1, 2, "fn one() {}"),
            SearchResult::new("a.rs", 3, 4, "fn one() {}\nfn two() {}"),
            SearchResult::new("b.rs", 1, 2, "struct One;"),
        ];
        let ctx = CodeContext::extract(&results);
        let metrics = ctx.metrics(&results);
        assert_eq!(metrics.result_count, 3);
        assert_eq!(metrics.file_diversity, 2);
        // "one", "two", "One" - case matters
        assert_eq!(metrics.unique_symbol_count, 3);
        assert_eq!(metrics.pattern_match_count, 0);
    }
}
