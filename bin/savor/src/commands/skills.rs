use savor_core::Paths;
use savor_skills::SampleSeed;
use savor_storage::{NewSkill, Skill, SkillUpdate};
use std::path::{Path, PathBuf};

use super::runtime::{open_service, preview, read_text};

fn print_skill_line(skill: &Skill) {
    println!(
        "  #{:<4} {:<28} {:<14} v{:<4} {}",
        skill.id, skill.name, skill.category, skill.current_version, skill.updated_at
    );
}

/// Create a skill, optionally with hand-written content for version 1.
pub async fn create(
    name: String,
    category: Option<String>,
    description: Option<String>,
    content_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let service = open_service()?;
    let content_markdown = match content_file {
        Some(path) => Some(read_text(None, Some(path.as_path()))?),
        None => None,
    };
    let skill = service.create_skill(NewSkill {
        name,
        category,
        description,
        content_markdown,
        content_json: None,
    })?;
    println!("✓ Created skill #{} '{}' (v{})", skill.id, skill.name, skill.current_version);
    Ok(())
}

/// Create a skill whose first version is extracted from writing samples.
pub async fn create_from_samples(
    name: String,
    category: Option<String>,
    description: Option<String>,
    samples: Option<String>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let service = open_service()?;
    let samples_text = read_text(samples, file.as_deref())?;
    println!("Extracting writing style from samples...");
    let skill = service
        .create_skill_with_samples(SampleSeed {
            name,
            category,
            description,
            samples_text,
        })
        .await?;
    let stored = service.list_samples(skill.id)?;
    println!(
        "✓ Created skill #{} '{}' from {} sample(s) (v{})",
        skill.id,
        skill.name,
        stored.len(),
        skill.current_version
    );
    Ok(())
}

pub async fn list() -> anyhow::Result<()> {
    let service = open_service()?;
    let skills = service.list_skills()?;

    println!();
    if skills.is_empty() {
        println!("No skills yet. Create one with `savor skill create <name>`.");
        return Ok(());
    }
    println!("Skills ({})", skills.len());
    println!("  {:<5} {:<28} {:<14} {:<5} updated", "id", "name", "category", "ver");
    for skill in &skills {
        print_skill_line(skill);
    }
    println!();
    Ok(())
}

/// Show a skill and its current content.
pub async fn show(skill_id: i64, json: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let skill = service.get_skill(skill_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&skill)?);
        return Ok(());
    }
    let version = service.get_skill_version(skill_id, skill.current_version)?;

    println!();
    println!("Skill #{}: {}", skill.id, skill.name);
    println!("  Category:    {}", skill.category);
    if !skill.description.is_empty() {
        println!("  Description: {}", skill.description);
    }
    println!("  Version:     v{} ({})", skill.current_version, version.change_summary);
    println!("  Created:     {}", skill.created_at);
    println!("  Updated:     {}", skill.updated_at);
    println!();
    println!("{}", version.content_markdown);
    Ok(())
}

pub async fn update(
    skill_id: i64,
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
) -> anyhow::Result<()> {
    if name.is_none() && category.is_none() && description.is_none() {
        anyhow::bail!("Nothing to update; pass --name, --category or --description");
    }
    let service = open_service()?;
    let skill = service.update_skill(skill_id, SkillUpdate { name, category, description })?;
    println!("✓ Updated skill #{} '{}'", skill.id, skill.name);
    Ok(())
}

/// Delete a skill with all of its versions. Articles are kept, unbound.
pub async fn delete(skill_id: i64, force: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let skill = service.get_skill(skill_id)?;

    if !force {
        print!(
            "Delete skill #{} '{}' and its {} version(s)? [y/N] ",
            skill.id, skill.name, skill.current_version
        );
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    service.delete_skill(skill_id)?;
    println!("✓ Deleted skill #{} '{}'", skill.id, skill.name);
    Ok(())
}

/// Version history, newest first.
pub async fn versions(skill_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let skill = service.get_skill(skill_id)?;
    let versions = service.get_skill_versions(skill_id)?;

    println!();
    println!("Versions of #{} '{}'", skill.id, skill.name);
    for v in versions.iter().rev() {
        let marker = if v.version_number == skill.current_version { "*" } else { " " };
        println!("  {} v{:<4} {}  {}", marker, v.version_number, v.created_at, v.change_summary);
    }
    println!();
    Ok(())
}

pub async fn version(skill_id: i64, version_number: i64, json: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let v = service.get_skill_version(skill_id, version_number)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&v)?);
    } else {
        println!("v{} | {} | {}", v.version_number, v.created_at, v.change_summary);
        println!();
        println!("{}", v.content_markdown);
    }
    Ok(())
}

/// Export the current version to stdout, a file, or the exports directory.
pub async fn export(skill_id: i64, format: &str, output: Option<PathBuf>, save: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let (body, extension) = match format {
        "md" | "markdown" => (service.export_skill_markdown(skill_id)?, "md"),
        "json" => (service.export_skill_json(skill_id)?, "json"),
        other => anyhow::bail!("Unknown export format '{}'; use md or json", other),
    };

    let target = match (output, save) {
        (Some(path), _) => Some(path),
        (None, true) => {
            let skill = service.get_skill(skill_id)?;
            Some(Paths::new().export_file(&skill.name, skill.current_version, extension))
        }
        (None, false) => None,
    };

    match target {
        Some(path) => {
            write_export(&path, &body)?;
            println!("✓ Exported skill #{} to {}", skill_id, path.display());
        }
        None => println!("{}", body),
    }
    Ok(())
}

fn write_export(path: &Path, body: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, body)?;
    Ok(())
}

/// Original samples a skill was extracted from.
pub async fn samples(skill_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let samples = service.list_samples(skill_id)?;
    if samples.is_empty() {
        println!("Skill #{} has no stored samples.", skill_id);
        return Ok(());
    }
    for s in &samples {
        println!("  #{:<4} {:<30} {}", s.id, s.title, preview(&s.content, 60));
    }
    Ok(())
}
