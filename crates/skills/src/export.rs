use savor_core::Result;
use savor_storage::{Skill, SkillVersion};
use serde_json::{json, Value};

pub const EXPORTED_BY: &str = "Savor";

/// Markdown usable directly as a system prompt.
pub fn skill_to_markdown(skill: &Skill, version: &SkillVersion) -> String {
    format!(
        "# {} — Writing Style Skill\n\n**Category**: {} | **Version**: v{}\n\n{}\n\n---\n\n{}\n\n---\n\n> Exported by {} | usable directly as a system prompt\n",
        skill.name,
        skill.category,
        version.version_number,
        skill.description,
        version.content_markdown.trim_end(),
        EXPORTED_BY
    )
}

/// Pretty JSON; `skill` is null when the stored content is not valid JSON.
pub fn skill_to_json(skill: &Skill, version: &SkillVersion) -> Result<String> {
    let content = serde_json::from_str::<Value>(&version.content_json).unwrap_or(Value::Null);
    let export = json!({
        "name": skill.name,
        "category": skill.category,
        "description": skill.description,
        "version": version.version_number,
        "skill": content,
        "exported_by": EXPORTED_BY,
    });
    Ok(serde_json::to_string_pretty(&export)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(content_json: &str) -> (Skill, SkillVersion) {
        let skill = Skill {
            id: 1,
            name: "Tech Reviews".into(),
            category: "Tech".into(),
            description: "Hands-on reviews".into(),
            current_version: 2,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        let version = SkillVersion {
            id: 2,
            skill_id: 1,
            version_number: 2,
            content_markdown: "- Be brief\n".into(),
            content_json: content_json.into(),
            change_summary: "s".into(),
            created_at: "t".into(),
        };
        (skill, version)
    }

    #[test]
    fn test_markdown_layout() {
        let (skill, version) = fixture("{}");
        let md = skill_to_markdown(&skill, &version);
        assert_eq!(
            md,
            "# Tech Reviews — Writing Style Skill\n\n**Category**: Tech | **Version**: v2\n\nHands-on reviews\n\n---\n\n- Be brief\n\n---\n\n> Exported by Savor | usable directly as a system prompt\n"
        );
        assert_eq!(md, skill_to_markdown(&skill, &version));
    }

    #[test]
    fn test_json_export() {
        let (skill, version) = fixture(r#"{"tone": "dry"}"#);
        let value: Value = serde_json::from_str(&skill_to_json(&skill, &version).unwrap()).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["skill"]["tone"], "dry");
        assert_eq!(value["exported_by"], "Savor");

        let (skill, version) = fixture("not json");
        let value: Value = serde_json::from_str(&skill_to_json(&skill, &version).unwrap()).unwrap();
        assert!(value["skill"].is_null());
    }
}
