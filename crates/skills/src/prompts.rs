use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::rules::{KEY_BLOCKLIST_PATTERNS, KEY_BLOCKLIST_WORDS, KEY_OBSERVATIONS, KEY_STYLE_PRINCIPLES};

/// A line holding only `---` separates pasted samples.
static SAMPLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*---[ \t]*\r?$").expect("sample separator regex is valid"));

const EMPTY_SKILL: &str = "(This skill has no rules yet. Write naturally and plainly.)";

/// Split pasted sample text into trimmed, non-empty samples.
pub fn split_samples(samples_text: &str) -> Vec<String> {
    SAMPLE_SEPARATOR
        .split(samples_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Body of the first fenced block, or the whole text trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after_marker = start + 3;
        // Skip optional language tag on the fence line
        let content_start = trimmed[after_marker..]
            .find('\n')
            .map(|i| after_marker + i + 1)
            .unwrap_or(after_marker);
        if let Some(end) = trimmed[content_start..].find("```") {
            return trimmed[content_start..content_start + end].trim();
        }
    }
    trimmed
}

/// Draft an article in the voice a skill describes.
pub fn build_generate_prompt(skill_content: &str, topic: &str) -> String {
    let skill = if skill_content.trim().is_empty() { EMPTY_SKILL } else { skill_content };
    format!(
        r#"You are a professional ghostwriter. Follow the Writing Style Skill below strictly.

## Writing Style Skill

{}

---

## Task

Write an article on the following topic in the style defined above.

**Topic:** {}

Requirements:
1. Follow the voice, identity and style principles of the skill
2. Never use the words, sentence patterns or structures on its blocklist
3. Use the author's own terms and turns of phrase
4. Keep the author's real voice; the text must not read as machine-written
5. Make a point and go beyond surface-level observations

Output only the article body, with no explanations or metadata."#,
        skill, topic
    )
}

/// Ask the model why the user changed the draft and which rules follow.
pub fn build_diff_analyze_prompt(
    original: &str,
    modified: &str,
    diff_summary: &str,
    current_skill: &str,
) -> String {
    let skill = if current_skill.trim().is_empty() { EMPTY_SKILL } else { current_skill };
    format!(
        r#"You are an expert in writing style analysis. The user manually edited an AI-generated article. Analyze the writing preferences and style rules behind these edits.

## Original AI draft

{}

## User's revised version

{}

## Diff summary

{}

## Current Writing Style Skill

{}

---

Analyze the intent of the edits and answer with this JSON document only (no markdown code fences):

{{
  "modification_analysis": [
    {{
      "type": "vocabulary | sentence structure | reorganization | addition/removal | tone",
      "description": "what was changed",
      "intent": "likely reason for the change"
    }}
  ],
  "new_rules": {{
    "add_to_style_principles": ["style principles to add"],
    "add_to_blocklist_words": ["words to avoid"],
    "add_to_blocklist_patterns": ["sentence patterns to avoid"],
    "other_observations": ["other style preferences observed"]
  }},
  "summary": "one sentence on how this improves the skill"
}}

Guidelines:
1. Look for systematic preferences, not one-off content fixes
2. Separate content edits (which do not affect the skill) from style edits (which should)
3. New rules must be concrete and actionable
4. If the edits carry no style signal, leave the new_rules lists empty"#,
        original, modified, diff_summary, skill
    )
}

/// Extract an initial style profile from the author's own samples.
pub fn build_analyze_prompt(samples: &[String]) -> String {
    let mut rendered = String::new();
    for (i, sample) in samples.iter().enumerate() {
        rendered.push_str(&format!("### Sample {}\n\n{}\n\n", i + 1, sample));
    }
    format!(
        r#"You are an expert in writing style analysis. Study the following original articles by one author and extract a reusable Writing Style Skill.

{}---

Answer with this JSON document only (no markdown code fences):

{{
  "identity": "who the author writes as",
  "tone": "overall tone and register",
  "{}": ["concrete, actionable style principles"],
  "preferred_terms": ["terms and phrases the author favours"],
  "structure": ["how the author organizes a piece"],
  "{}": ["words the author never uses"],
  "{}": ["sentence patterns the author avoids"],
  "{}": ["anything else characteristic"]
}}

Rules must be specific enough that another writer could imitate the author from them alone."#,
        rendered, KEY_STYLE_PRINCIPLES, KEY_BLOCKLIST_WORDS, KEY_BLOCKLIST_PATTERNS, KEY_OBSERVATIONS
    )
}

/// Render the extracted style profile as Markdown. Text that is not a JSON
/// object is kept as the body.
pub fn json_to_markdown(name: &str, json_text: &str) -> String {
    let body = strip_code_fence(json_text);
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => return format!("# {}\n\n{}\n", name, body),
    };

    let mut md = format!("# {}\n", name);
    for (key, heading) in [("identity", "Identity"), ("tone", "Tone")] {
        if let Some(text) = parsed.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                md.push_str(&format!("\n## {}\n\n{}\n", heading, text.trim()));
            }
        }
    }

    let sections = [
        (KEY_STYLE_PRINCIPLES, "Style principles"),
        ("preferred_terms", "Preferred terms"),
        ("structure", "Structure"),
        (KEY_BLOCKLIST_WORDS, "Words to avoid"),
        (KEY_BLOCKLIST_PATTERNS, "Patterns to avoid"),
        (KEY_OBSERVATIONS, "Other observations"),
    ];
    for (key, heading) in sections {
        let items: Vec<&str> = parsed
            .get(key)
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).filter(|s| !s.trim().is_empty()).collect())
            .unwrap_or_default();
        if items.is_empty() {
            continue;
        }
        md.push_str(&format!("\n## {}\n\n", heading));
        for item in items {
            md.push_str(&format!("- {}\n", item.trim()));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_samples_on_separator_lines() {
        let text = "First sample.\n---\nSecond sample\nwith two lines.\n  ---  \n\n---\nThird.";
        let samples = split_samples(text);
        assert_eq!(samples, vec!["First sample.", "Second sample\nwith two lines.", "Third."]);
        assert!(split_samples("\n---\n   \n---\n").is_empty());
        // Dashes inside a line are not separators
        assert_eq!(split_samples("a --- b").len(), 1);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("Here:\n```\nbody\n```\nthanks"), "body");
        assert_eq!(strip_code_fence("  plain  "), "plain");
        assert_eq!(strip_code_fence("```unterminated"), "```unterminated");
    }

    #[test]
    fn test_generate_prompt_embeds_skill_and_topic() {
        let prompt = build_generate_prompt("- Be brief", "AI phones");
        assert!(prompt.contains("- Be brief"));
        assert!(prompt.contains("**Topic:** AI phones"));
        assert!(build_generate_prompt("  ", "x").contains("no rules yet"));
    }

    #[test]
    fn test_analyze_prompt_numbers_samples() {
        let prompt = build_analyze_prompt(&["one".to_string(), "two".to_string()]);
        assert!(prompt.contains("### Sample 1\n\none"));
        assert!(prompt.contains("### Sample 2\n\ntwo"));
        assert!(prompt.contains("\"blocklist_words\""));
    }

    #[test]
    fn test_json_to_markdown() {
        let json = r#"{"identity": "A hardware reviewer", "style_principles": ["Short sentences", ""], "blocklist_words": ["game-changer"]}"#;
        let md = json_to_markdown("Tech Reviews", json);
        assert!(md.starts_with("# Tech Reviews\n"));
        assert!(md.contains("## Identity\n\nA hardware reviewer\n"));
        assert!(md.contains("## Style principles\n\n- Short sentences\n"));
        assert!(md.contains("## Words to avoid\n\n- game-changer\n"));
        assert!(!md.contains("## Tone"));

        let raw = json_to_markdown("Blog", "Write casually.");
        assert_eq!(raw, "# Blog\n\nWrite casually.\n");
    }
}
