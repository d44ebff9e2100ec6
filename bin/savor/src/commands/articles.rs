use savor_storage::Article;
use std::path::PathBuf;

use super::runtime::{open_service, preview, read_text};

fn print_article_line(a: &Article) {
    let skill = match (a.skill_id, a.skill_version_used) {
        (Some(id), Some(v)) => format!("#{} v{}", id, v),
        (Some(id), None) => format!("#{}", id),
        _ => "-".to_string(),
    };
    println!(
        "  #{:<4} {:<10} {:<10} {:<32} {}",
        a.id,
        a.status.as_str(),
        skill,
        preview(&a.title, 32),
        a.created_at
    );
}

/// Draft an article on `topic` with the skill's current version.
pub async fn generate(skill_id: i64, topic: &str, title: Option<String>) -> anyhow::Result<()> {
    let service = open_service()?;
    println!("Drafting with skill #{}...", skill_id);
    let article = service.generate_article(skill_id, topic, title.as_deref()).await?;

    println!(
        "✓ Article #{} '{}' drafted with v{}",
        article.id,
        article.title,
        article.skill_version_used.unwrap_or_default()
    );
    println!();
    println!("{}", article.ai_generated_content);
    Ok(())
}

/// Store the user's refined text.
pub async fn save(article_id: i64, text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let service = open_service()?;
    let content = read_text(text, file.as_deref())?;
    let article = service.save_article(article_id, &content)?;
    println!("✓ Saved article #{} (status: {})", article.id, article.status.as_str());
    Ok(())
}

/// Which text `article show` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowField {
    Refined,
    Draft,
    Original,
}

impl ShowField {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "refined" => Ok(ShowField::Refined),
            "draft" => Ok(ShowField::Draft),
            "original" => Ok(ShowField::Original),
            other => anyhow::bail!("Unknown field '{}'; use refined, draft or original", other),
        }
    }
}

pub async fn show(article_id: i64, field: ShowField, json: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let article = service.get_article(article_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&article)?);
        return Ok(());
    }

    println!("Article #{}: {}", article.id, article.title);
    println!("  Status:  {}{}", article.status.as_str(), if article.is_edited() { " (edited)" } else { "" });
    match (article.skill_id, article.skill_version_used) {
        (Some(id), Some(v)) => println!("  Skill:   #{} v{}", id, v),
        (None, Some(v)) => println!("  Skill:   (deleted) v{}", v),
        _ => println!("  Skill:   -"),
    }
    println!("  Created: {}", article.created_at);
    println!("  Updated: {}", article.updated_at);
    println!();
    let body = match field {
        ShowField::Refined => &article.user_refined_content,
        ShowField::Draft => &article.ai_generated_content,
        ShowField::Original => &article.original_content,
    };
    println!("{}", body);
    Ok(())
}

pub async fn list(skill_id: Option<i64>) -> anyhow::Result<()> {
    let service = open_service()?;
    let articles = service.list_articles(skill_id)?;

    println!();
    if articles.is_empty() {
        println!("No articles yet.");
        return Ok(());
    }
    println!("Articles ({})", articles.len());
    for a in &articles {
        print_article_line(a);
    }
    println!();
    Ok(())
}

pub async fn publish(article_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let article = service.publish_article(article_id)?;
    println!("✓ Published article #{}", article.id);
    Ok(())
}

/// Where the article stands in the draft -> edit -> diff -> evolve loop.
pub async fn state(article_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let state = service.evolution_state(article_id)?;
    println!("{}", state.as_str());
    Ok(())
}
