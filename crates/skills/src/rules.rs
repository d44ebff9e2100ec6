use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::prompts::strip_code_fence;

/// Keys in a skill's `content_json` that accumulate learned rules.
pub const KEY_STYLE_PRINCIPLES: &str = "style_principles";
pub const KEY_BLOCKLIST_WORDS: &str = "blocklist_words";
pub const KEY_BLOCKLIST_PATTERNS: &str = "blocklist_patterns";
pub const KEY_OBSERVATIONS: &str = "observations";

/// Style rules the model proposes after reading a user's edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedRules {
    #[serde(default, deserialize_with = "string_or_list")]
    pub add_to_style_principles: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub add_to_blocklist_words: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub add_to_blocklist_patterns: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub other_observations: Vec<String>,
}

const RULE_KEYS: [&str; 4] = [
    "add_to_style_principles",
    "add_to_blocklist_words",
    "add_to_blocklist_patterns",
    "other_observations",
];

/// Models sometimes answer a single rule as a bare string instead of a list.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(other) => vec![other.to_string()],
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub intent: String,
}

/// Full JSON document returned by the diff-analysis prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisDocument {
    #[serde(default)]
    pub modification_analysis: Vec<Modification>,
    #[serde(default)]
    pub new_rules: ExtractedRules,
    #[serde(default)]
    pub summary: String,
}

impl AnalysisDocument {
    /// Parse a model response, tolerating surrounding code fences. Returns
    /// `None` for anything that is not the expected JSON object.
    pub fn parse(response: &str) -> Option<Self> {
        let body = strip_code_fence(response);
        let value: Value = serde_json::from_str(body).ok()?;
        if !value.is_object() || value.get("new_rules").is_none() {
            return None;
        }
        let mut doc: Self = serde_json::from_value(value).ok()?;
        doc.new_rules = doc.new_rules.cleaned();
        doc.summary = doc.summary.trim().to_string();
        Some(doc)
    }
}

impl ExtractedRules {
    /// Parse a rules object, or a whole analysis document holding one under
    /// `new_rules`. Objects with none of the rule keys are not rules.
    pub fn parse(text: &str) -> Option<Self> {
        let body = strip_code_fence(text);
        let mut value: Value = serde_json::from_str(body).ok()?;
        if let Some(inner) = value.get_mut("new_rules").map(Value::take) {
            value = inner;
        }
        let object = value.as_object()?;
        if !RULE_KEYS.iter().any(|key| object.contains_key(*key)) {
            return None;
        }
        serde_json::from_value(value).ok().map(Self::cleaned)
    }

    /// Rules that are not JSON are kept verbatim as a single observation.
    pub fn from_free_text(text: &str) -> Self {
        let text = text.trim();
        Self {
            other_observations: if text.is_empty() { Vec::new() } else { vec![text.to_string()] },
            ..Default::default()
        }
    }

    fn cleaned(self) -> Self {
        Self {
            add_to_style_principles: clean_list(self.add_to_style_principles),
            add_to_blocklist_words: clean_list(self.add_to_blocklist_words),
            add_to_blocklist_patterns: clean_list(self.add_to_blocklist_patterns),
            other_observations: clean_list(self.other_observations),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add_to_style_principles.is_empty()
            && self.add_to_blocklist_words.is_empty()
            && self.add_to_blocklist_patterns.is_empty()
            && self.other_observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.add_to_style_principles.len()
            + self.add_to_blocklist_words.len()
            + self.add_to_blocklist_patterns.len()
            + self.other_observations.len()
    }

    /// Markdown section appended to a skill when version `version` is learned.
    pub fn to_markdown(&self, version: i64) -> String {
        let mut md = format!("## Learned from edits (v{})\n", version);
        push_list(&mut md, "Style principles", &self.add_to_style_principles);
        push_list(&mut md, "Words to avoid", &self.add_to_blocklist_words);
        push_list(&mut md, "Patterns to avoid", &self.add_to_blocklist_patterns);
        push_list(&mut md, "Other observations", &self.other_observations);
        md
    }

    /// Merge into a skill's JSON content. Lists keep their order and gain
    /// only entries they do not already contain.
    pub fn merge_into_json(&self, content_json: &str) -> String {
        let mut root = match serde_json::from_str::<Value>(content_json) {
            Ok(Value::Object(map)) => map,
            _ => {
                if !content_json.trim().is_empty() && content_json.trim() != "{}" {
                    warn!("Skill JSON content is not an object, starting a fresh document");
                }
                Map::new()
            }
        };

        merge_list(&mut root, KEY_STYLE_PRINCIPLES, &self.add_to_style_principles);
        merge_list(&mut root, KEY_BLOCKLIST_WORDS, &self.add_to_blocklist_words);
        merge_list(&mut root, KEY_BLOCKLIST_PATTERNS, &self.add_to_blocklist_patterns);
        merge_list(&mut root, KEY_OBSERVATIONS, &self.other_observations);

        Value::Object(root).to_string()
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

fn push_list(md: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("\n### {}\n\n", heading));
    for item in items {
        md.push_str(&format!("- {}\n", item));
    }
}

fn merge_list(root: &mut Map<String, Value>, key: &str, additions: &[String]) {
    if additions.is_empty() {
        return;
    }
    let entry = root
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        // Scalar values are preserved as the first list entry
        let previous = entry.take();
        *entry = Value::Array(if previous.is_null() { Vec::new() } else { vec![previous] });
    }
    if let Value::Array(list) = entry {
        for item in additions {
            let candidate = Value::String(item.clone());
            if !list.contains(&candidate) {
                list.push(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"```json
{
  "modification_analysis": [
    {"type": "vocabulary", "description": "Hello -> Hi", "intent": "more casual"}
  ],
  "new_rules": {
    "add_to_style_principles": ["Prefer short greetings", "  "],
    "add_to_blocklist_words": ["Hello"],
    "add_to_blocklist_patterns": [],
    "other_observations": []
  },
  "summary": "Keep greetings casual"
}
```"#;

    #[test]
    fn test_parse_analysis_document() {
        let doc = AnalysisDocument::parse(RESPONSE).unwrap();
        assert_eq!(doc.summary, "Keep greetings casual");
        assert_eq!(doc.modification_analysis[0].kind, "vocabulary");
        assert_eq!(doc.new_rules.add_to_blocklist_words, vec!["Hello"]);
        assert_eq!(doc.new_rules.add_to_style_principles, vec!["Prefer short greetings"]);
        assert!(AnalysisDocument::parse("The user made the tone friendlier.").is_none());
        assert!(AnalysisDocument::parse(r#"{"summary": "no rules key"}"#).is_none());
    }

    #[test]
    fn test_rules_parse_cleans_blanks_and_duplicates() {
        let raw = r#"{"add_to_style_principles": ["a", " a ", ""], "other_observations": ["x"]}"#;
        let rules = ExtractedRules::parse(raw).unwrap();
        assert_eq!(rules.add_to_style_principles, vec!["a"]);
        assert_eq!(rules.len(), 2);
        assert!(ExtractedRules::parse("plain words").is_none());
        assert!(ExtractedRules::parse("{}").is_none());
        assert!(ExtractedRules::parse(r#"{"summary": "tone"}"#).is_none());
        assert!(ExtractedRules::parse(r#"{"other_observations": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_rule_lists_are_accepted() {
        let reply = r#"{"new_rules": {"add_to_style_principles": "Prefer short greetings", "add_to_blocklist_words": ["Hello", 42, null]},
"summary": "Keep greetings casual"}"#;
        let doc = AnalysisDocument::parse(reply).unwrap();
        assert_eq!(doc.new_rules.add_to_style_principles, vec!["Prefer short greetings"]);
        assert_eq!(doc.new_rules.add_to_blocklist_words, vec!["Hello", "42"]);

        // A stored full document still yields its nested rules
        let rules = ExtractedRules::parse(reply).unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.other_observations.is_empty());
    }

    #[test]
    fn test_markdown_section_skips_empty_lists() {
        let rules = ExtractedRules {
            add_to_style_principles: vec!["Prefer short greetings".into()],
            add_to_blocklist_words: vec!["Hello".into()],
            ..Default::default()
        };
        let md = rules.to_markdown(2);
        assert!(md.starts_with("## Learned from edits (v2)\n"));
        assert!(md.contains("### Style principles\n\n- Prefer short greetings\n"));
        assert!(md.contains("### Words to avoid\n\n- Hello\n"));
        assert!(!md.contains("Patterns to avoid"));
    }

    #[test]
    fn test_merge_into_json_dedups_in_order() {
        let existing = r#"{"tone": "dry", "blocklist_words": ["Hello", "Indeed"]}"#;
        let rules = ExtractedRules {
            add_to_blocklist_words: vec!["Indeed".into(), "Moreover".into()],
            add_to_style_principles: vec!["Be brief".into()],
            ..Default::default()
        };
        let merged: Value = serde_json::from_str(&rules.merge_into_json(existing)).unwrap();
        assert_eq!(merged["tone"], "dry");
        assert_eq!(merged["blocklist_words"], serde_json::json!(["Hello", "Indeed", "Moreover"]));
        assert_eq!(merged["style_principles"], serde_json::json!(["Be brief"]));
    }

    #[test]
    fn test_merge_into_non_object_json_starts_fresh() {
        let rules = ExtractedRules::from_free_text("Prefers plain verbs");
        let merged: Value = serde_json::from_str(&rules.merge_into_json("not json")).unwrap();
        assert_eq!(merged["observations"], serde_json::json!(["Prefers plain verbs"]));
    }
}
