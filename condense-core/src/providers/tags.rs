//! Tagged-response parsing shared by every provider.
//!
//! LLM replies follow a small XML-like contract:
//!
//! ```text
//! <observation>
//!   <type>refactor</type>
//!   <title>...</title>
//!   <subtitle>...</subtitle>
//!   <narrative>...</narrative>
//!   <concepts><concept>...</concept>...</concepts>
//! </observation>
//! ```
//!
//! Extraction is driven by [`OBSERVATION_FIELDS`] rather than per-provider
//! code. Tags match case-insensitively and may span lines. Missing fields get
//! fixed defaults; a missing required field marks the result as degraded.

use super::ProviderObservation;
use crate::types::{ObservationType, SynthesizedObservation, estimate_tokens};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

pub const DEFAULT_TITLE: &str = "Code Discovery";
pub const DEFAULT_NARRATIVE: &str = "Synthesized observation of the matched code segments.";

/// Shape of one field in the tagged contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single `<tag>value</tag>`.
    Scalar,
    /// `<tag><item>a</item><item>b</item></tag>`.
    List { item: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub tag: &'static str,
    pub kind: FieldKind,
    /// Whether a missing value counts as a degraded response.
    pub required: bool,
}

pub const OBSERVATION_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        tag: "type",
        kind: FieldKind::Scalar,
        required: true,
    },
    FieldSpec {
        tag: "title",
        kind: FieldKind::Scalar,
        required: true,
    },
    FieldSpec {
        tag: "subtitle",
        kind: FieldKind::Scalar,
        required: false,
    },
    FieldSpec {
        tag: "narrative",
        kind: FieldKind::Scalar,
        required: true,
    },
    FieldSpec {
        tag: "concepts",
        kind: FieldKind::List { item: "concept" },
        required: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Scalar(String),
    List(Vec<String>),
}

/// Values found for a field specification. Absent fields are simply missing.
#[derive(Debug, Clone, Default)]
pub struct TaggedFields {
    values: HashMap<&'static str, TagValue>,
}

impl TaggedFields {
    pub fn scalar(&self, tag: &str) -> Option<&str> {
        match self.values.get(tag) {
            Some(TagValue::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, tag: &str) -> Option<&[String]> {
        match self.values.get(tag) {
            Some(TagValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.values.contains_key(tag)
    }
}

/// Compiled tag patterns, keyed by tag name.
static TAG_REGEXES: LazyLock<Mutex<HashMap<String, Regex>>> = LazyLock::new(|| {
    let mut cache = HashMap::new();
    for field in OBSERVATION_FIELDS {
        if let Some(re) = compile_tag(field.tag) {
            cache.insert(field.tag.to_string(), re);
        }
        if let FieldKind::List { item } = field.kind
            && let Some(re) = compile_tag(item)
        {
            cache.insert(item.to_string(), re);
        }
    }
    Mutex::new(cache)
});

fn compile_tag(tag: &str) -> Option<Regex> {
    let escaped = regex::escape(tag);
    Regex::new(&format!(r"(?is)<{escaped}\b[^>]*>(.*?)</{escaped}\s*>")).ok()
}

fn tag_regex(tag: &str) -> Option<Regex> {
    let mut cache = TAG_REGEXES.lock().unwrap();
    if let Some(re) = cache.get(tag) {
        return Some(re.clone());
    }
    let re = compile_tag(tag)?;
    cache.insert(tag.to_string(), re.clone());
    Some(re)
}

/// Trimmed body of the first `<tag>…</tag>`. Empty bodies count as absent.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let re = tag_regex(tag)?;
    let body = re.captures(text)?.get(1)?.as_str().trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// Every non-empty `<item>` inside the first `<list_tag>`, in order.
pub fn extract_list(text: &str, list_tag: &str, item_tag: &str) -> Option<Vec<String>> {
    let outer = tag_regex(list_tag)?;
    let body = outer.captures(text)?.get(1)?.as_str();
    let inner = tag_regex(item_tag)?;
    Some(
        inner
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Extract every field named in `spec` from `text`.
pub fn parse_tagged(text: &str, spec: &[FieldSpec]) -> TaggedFields {
    let mut fields = TaggedFields::default();
    for field in spec {
        let value = match field.kind {
            FieldKind::Scalar => extract_tag(text, field.tag).map(TagValue::Scalar),
            FieldKind::List { item } => extract_list(text, field.tag, item).map(TagValue::List),
        };
        if let Some(value) = value {
            fields.values.insert(field.tag, value);
        }
    }
    fields
}

/// Turn a raw LLM reply into an observation, substituting defaults for
/// anything missing. `files_read` is left empty for the orchestrator.
pub fn parse_observation(text: &str) -> ProviderObservation {
    let fields = parse_tagged(text, OBSERVATION_FIELDS);

    let kind = fields.scalar("type").and_then(ObservationType::parse);
    let degraded = kind.is_none()
        || OBSERVATION_FIELDS
            .iter()
            .filter(|f| f.required && f.tag != "type")
            .any(|f| !fields.contains(f.tag));

    let observation = SynthesizedObservation {
        kind: kind.unwrap_or_default(),
        title: fields.scalar("title").unwrap_or(DEFAULT_TITLE).to_string(),
        subtitle: fields.scalar("subtitle").map(str::to_string),
        narrative: fields
            .scalar("narrative")
            .unwrap_or(DEFAULT_NARRATIVE)
            .to_string(),
        concepts: fields.list("concepts").map(<[String]>::to_vec).unwrap_or_default(),
        files_read: Vec::new(),
        token_count: estimate_tokens(text),
    };

    ProviderObservation {
        observation,
        degraded,
    }
}

/// Render an observation in the tagged format. Used for prompt examples and tests.
pub fn render_observation(observation: &SynthesizedObservation) -> String {
    let mut out = String::from("<observation>\n");
    out.push_str(&format!("  <type>{}</type>\n", observation.kind));
    out.push_str(&format!("  <title>{}</title>\n", observation.title));
    if let Some(subtitle) = &observation.subtitle {
        out.push_str(&format!("  <subtitle>{subtitle}</subtitle>\n"));
    }
    out.push_str(&format!("  <narrative>{}</narrative>\n", observation.narrative));
    out.push_str("  <concepts>\n");
    for concept in &observation.concepts {
        out.push_str(&format!("    <concept>{concept}</concept>\n"));
    }
    out.push_str("  </concepts>\n</observation>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = "Sure! Here it is:\n<observation>\n<TYPE>bugfix</TYPE>\n\
        <title>Null check missing in session loader</title>\n\
        <subtitle>session.ts | Express</subtitle>\n\
        <narrative>\nThe loader dereferences `user`\nbefore validating it.\n</narrative>\n\
        <concepts>\n  <concept>session</concept>\n  <Concept>null safety</Concept>\n  <concept> </concept>\n</concepts>\n\
        </observation>";

    #[test]
    fn test_parse_full_response() {
        let parsed = parse_observation(FULL);
        assert!(!parsed.degraded);
        let obs = parsed.observation;
        assert_eq!(obs.kind, ObservationType::Bugfix);
        assert_eq!(obs.title, "Null check missing in session loader");
        assert_eq!(obs.subtitle.as_deref(), Some("session.ts | Express"));
        assert_eq!(
            obs.narrative,
            "The loader dereferences `user`\nbefore validating it."
        );
        assert_eq!(obs.concepts, vec!["session", "null safety"]);
        assert!(obs.files_read.is_empty());
        assert_eq!(obs.token_count, FULL.chars().count().div_ceil(4));
    }

    #[test]
    fn test_garbage_degrades_to_defaults() {
        let parsed = parse_observation("I could not analyze this.");
        assert!(parsed.degraded);
        let obs = parsed.observation;
        assert_eq!(obs.kind, ObservationType::Discovery);
        assert_eq!(obs.title, DEFAULT_TITLE);
        assert_eq!(obs.narrative, DEFAULT_NARRATIVE);
        assert_eq!(obs.subtitle, None);
        assert!(obs.concepts.is_empty());
    }

    #[test]
    fn test_unknown_type_is_degraded_discovery() {
        let parsed = parse_observation(
            "<type>chore</type><title>T</title><narrative>N</narrative>",
        );
        assert!(parsed.degraded);
        assert_eq!(parsed.observation.kind, ObservationType::Discovery);
        assert_eq!(parsed.observation.title, "T");
    }

    #[test]
    fn test_missing_optional_fields_not_degraded() {
        let parsed = parse_observation(
            "<type>feature</type><title>T</title><narrative>N</narrative>",
        );
        assert!(!parsed.degraded);
        assert!(parsed.observation.concepts.is_empty());
        assert_eq!(parsed.observation.subtitle, None);
    }

    #[test]
    fn test_concept_outside_list_is_ignored() {
        let text = "<concept>stray</concept><concepts><concept>kept</concept></concepts>";
        assert_eq!(extract_list(text, "concepts", "concept"), Some(vec!["kept".to_string()]));
        assert_eq!(extract_list("<concept>stray</concept>", "concepts", "concept"), None);
    }

    #[test]
    fn test_extract_tag_does_not_confuse_prefixes() {
        let text = "<concepts><concept>a</concept></concepts>";
        assert_eq!(extract_tag(text, "concept"), Some("a".to_string()));
        assert_eq!(extract_tag("<title>   </title>", "title"), None);
        assert_eq!(extract_tag("<title lang=\"en\">Hi</title>", "title"), Some("Hi".to_string()));
    }

    #[test]
    fn test_render_then_parse_preserves_fields() {
        let original = SynthesizedObservation {
            kind: ObservationType::Refactor,
            title: "Split the god object".into(),
            subtitle: Some("3 files | Django".into()),
            narrative: "OrderManager handles pricing, persistence, and email.".into(),
            concepts: vec!["OrderManager".into(), "cohesion".into(), "Django".into()],
            files_read: Vec::new(),
            token_count: 0,
        };
        let text = render_observation(&original);
        let parsed = parse_observation(&text);
        assert!(!parsed.degraded);
        assert_eq!(
            SynthesizedObservation {
                token_count: 0,
                ..parsed.observation
            },
            original
        );
    }

    #[test]
    fn test_tag_regexes_are_compiled_once() {
        for tag in ["type", "title", "subtitle", "narrative", "concepts", "concept"] {
            assert!(TAG_REGEXES.lock().unwrap().contains_key(tag), "{tag} not cached");
        }

        assert_eq!(extract_tag("<summary>kept</summary>", "summary").as_deref(), Some("kept"));
        let cached = TAG_REGEXES.lock().unwrap().get("summary").cloned().unwrap();
        assert_eq!(cached.as_str(), tag_regex("summary").unwrap().as_str());
    }
}

