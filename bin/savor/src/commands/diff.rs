use savor_core::Error;
use savor_skills::{render_summary, DiffStats};
use savor_storage::DiffRecord;
use std::path::PathBuf;

use super::runtime::{open_service, read_text};

fn print_record(record: &DiffRecord) {
    let stats = DiffStats::from_chunks(&record.chunks);
    println!("Diff record #{} (article #{})", record.id, record.article_id);
    println!(
        "  Chunks:  {} (chars: {} unchanged, {} deleted, {} inserted)",
        record.chunks.len(),
        stats.unchanged,
        stats.deleted,
        stats.inserted
    );
    match (record.applied_to_skill, record.applied_version) {
        (true, Some(v)) => println!("  Applied: yes, produced v{}", v),
        (true, None) => println!("  Applied: yes"),
        (false, _) => println!("  Applied: no"),
    }
    println!("  Created: {}", record.created_at);
    if record.has_analysis() {
        println!();
        println!("Analysis:");
        println!("{}", record.llm_analysis);
        println!();
        println!("Extracted rules:");
        println!("{}", record.extracted_rules);
    } else {
        println!("  Analysis: pending (run `savor diff retry {}`)", record.id);
    }
}

/// Diff two texts without touching the database.
pub async fn compute(
    original: PathBuf,
    modified: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let service = open_service()?;
    let original = read_text(None, Some(original.as_path()))?;
    let modified = read_text(None, Some(modified.as_path()))?;
    let chunks = service.compute_diff(&original, &modified);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        print!("{}", render_summary(&chunks));
        let stats = DiffStats::from_chunks(&chunks);
        if stats.is_unchanged() {
            println!("(no changes)");
        }
    }
    Ok(())
}

/// Analyze the edits on an article. With no texts given, the stored draft
/// is compared to the stored refinement.
pub async fn analyze(
    article_id: i64,
    original: Option<PathBuf>,
    modified: Option<PathBuf>,
) -> anyhow::Result<()> {
    let service = open_service()?;
    println!("Analyzing edits on article #{}...", article_id);
    let result = match (original, modified) {
        (None, None) => service.analyze_article(article_id).await,
        (Some(o), Some(m)) => {
            let original = read_text(None, Some(o.as_path()))?;
            let modified = read_text(None, Some(m.as_path()))?;
            service.analyze_diff(article_id, &original, &modified).await
        }
        _ => anyhow::bail!("Pass both --original and --modified, or neither"),
    };

    match result {
        Ok(record) => {
            print_record(&record);
            println!();
            println!("Apply with `savor diff evolve {}`", record.id);
            Ok(())
        }
        Err(e) => {
            if let Error::AnalysisFailed { diff_record_id: Some(id), .. } = &e {
                eprintln!("Diff record #{} was saved without analysis; retry with `savor diff retry {}`", id, id);
            }
            Err(e.into())
        }
    }
}

/// Re-run the analysis on a stored record.
pub async fn retry(diff_record_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let record = service.retry_analysis(diff_record_id).await?;
    print_record(&record);
    Ok(())
}

/// Fold a record's extracted rules into its skill as a new version.
pub async fn evolve(diff_record_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let version = service.evolve_skill(diff_record_id).await?;
    println!(
        "✓ Skill #{} evolved to v{}: {}",
        version.skill_id, version.version_number, version.change_summary
    );
    Ok(())
}

pub async fn list(article_id: i64) -> anyhow::Result<()> {
    let service = open_service()?;
    let records = service.list_diff_records(article_id)?;
    if records.is_empty() {
        println!("No diff records for article #{}.", article_id);
        return Ok(());
    }
    for r in &records {
        let status = if r.applied_to_skill {
            "applied"
        } else if r.has_analysis() {
            "analyzed"
        } else {
            "pending"
        };
        println!("  #{:<4} {:<9} {:>4} chunks  {}", r.id, status, r.chunks.len(), r.created_at);
    }
    Ok(())
}

pub async fn show(diff_record_id: i64, json: bool) -> anyhow::Result<()> {
    let service = open_service()?;
    let record = service.get_diff_record(diff_record_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}
