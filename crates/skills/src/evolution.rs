use savor_core::{Error, Result};
use savor_storage::{
    Article, ArticleStore, Database, DiffRecord, DiffStore, NewDiffRecord, NewDraft, NewSample, NewSkill,
    NewVersion, Skill, SkillStore, SkillVersion,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{LLMProvider, StyleAnalyzer, StyleDiffInput};
use crate::diff::{reconstruct_modified, reconstruct_original, DiffEngine, DiffStats};
use crate::prompts::{build_analyze_prompt, build_generate_prompt, json_to_markdown, split_samples, strip_code_fence};
use crate::rules::{AnalysisDocument, ExtractedRules};

/// Merges are recomputed from the fresh current version after a lost race;
/// no model call is repeated.
const MAX_EVOLVE_ATTEMPTS: usize = 3;

/// Where an article stands in the draft → edit → diff → evolve cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionState {
    Drafted,
    Edited,
    Diffed,
    Evolved,
}

impl EvolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionState::Drafted => "drafted",
            EvolutionState::Edited => "edited",
            EvolutionState::Diffed => "diffed",
            EvolutionState::Evolved => "evolved",
        }
    }
}

/// Bootstrap request for a skill extracted from the author's own samples.
#[derive(Debug, Clone, Default)]
pub struct SampleSeed {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub samples_text: String,
}

/// Drives drafting, diff analysis and skill evolution.
///
/// Every model call runs with no store lock held; results are written in
/// one store call after the call returns, so a dropped future leaves no
/// partial state behind.
#[derive(Clone)]
pub struct EvolutionCoordinator {
    skills: SkillStore,
    articles: ArticleStore,
    diffs: DiffStore,
    engine: DiffEngine,
    llm: Arc<dyn LLMProvider>,
    analyzer: Arc<dyn StyleAnalyzer>,
    draft_temperature: f32,
    extraction_temperature: f32,
}

impl EvolutionCoordinator {
    pub fn new(
        db: Database,
        engine: DiffEngine,
        llm: Arc<dyn LLMProvider>,
        analyzer: Arc<dyn StyleAnalyzer>,
    ) -> Self {
        Self {
            skills: SkillStore::new(db.clone()),
            articles: ArticleStore::new(db.clone()),
            diffs: DiffStore::new(db),
            engine,
            llm,
            analyzer,
            draft_temperature: 0.7,
            extraction_temperature: 0.3,
        }
    }

    pub fn with_temperatures(mut self, draft: f32, extraction: f32) -> Self {
        self.draft_temperature = draft;
        self.extraction_temperature = extraction;
        self
    }

    pub fn skills(&self) -> &SkillStore {
        &self.skills
    }

    pub fn articles(&self) -> &ArticleStore {
        &self.articles
    }

    pub fn diffs(&self) -> &DiffStore {
        &self.diffs
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Draft an article with the skill's current version, pinning that version.
    pub async fn generate_draft(&self, skill_id: i64, topic: &str, title: Option<&str>) -> Result<Article> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::Validation("topic must not be blank".to_string()));
        }
        let version = self.skills.current_version(skill_id)?;
        let prompt = build_generate_prompt(&version.content_markdown, topic);

        info!(skill_id, version = version.version_number, "Generating draft");
        let draft = self
            .llm
            .generate(&prompt, self.draft_temperature)
            .await
            .map_err(generation_error)?;
        if draft.trim().is_empty() {
            return Err(Error::Generation("model returned an empty draft".to_string()));
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| topic.chars().take(80).collect());

        self.articles.insert_draft(NewDraft {
            title,
            original_content: topic.to_string(),
            ai_generated_content: draft,
            skill_id: Some(skill_id),
            skill_version_used: Some(version.version_number),
        })
    }

    /// Diff two texts of an article and ask the analyzer what the edits mean.
    ///
    /// When analysis fails the record is still stored, with empty analysis,
    /// and the error carries its id for `retry_analysis`.
    pub async fn analyze_diff(&self, article_id: i64, original: &str, modified: &str) -> Result<DiffRecord> {
        if original == modified {
            return Err(Error::NoChanges);
        }
        let article = self.articles.get_article(article_id)?;
        let current_skill = self.skill_context(&article)?;

        let chunks = self.engine.diff(original, modified);
        let stats = DiffStats::from_chunks(&chunks);
        debug!(article_id, chunks = chunks.len(), inserted = stats.inserted, deleted = stats.deleted, "Diff computed");

        let outcome = self
            .analyzer
            .analyze_style_diff(StyleDiffInput {
                original,
                modified,
                chunks: &chunks,
                current_skill: &current_skill,
            })
            .await;

        match outcome {
            Ok(analysis) => {
                let record = self.diffs.insert(NewDiffRecord {
                    article_id,
                    chunks,
                    llm_analysis: analysis.analysis_text,
                    extracted_rules: analysis.extracted_rules,
                })?;
                info!(article_id, diff_record_id = record.id, "Edits analyzed");
                Ok(record)
            }
            Err(e) => {
                let record = self.diffs.insert(NewDiffRecord {
                    article_id,
                    chunks,
                    llm_analysis: String::new(),
                    extracted_rules: String::new(),
                })?;
                warn!(article_id, diff_record_id = record.id, error = %e, "Style analysis failed, diff kept for retry");
                Err(Error::AnalysisFailed {
                    message: failure_message(e),
                    diff_record_id: Some(record.id),
                })
            }
        }
    }

    /// `analyze_diff` against the frozen draft and the current refinement.
    pub async fn analyze_article(&self, article_id: i64) -> Result<DiffRecord> {
        let article = self.articles.get_article(article_id)?;
        self.analyze_diff(article_id, &article.ai_generated_content, &article.user_refined_content)
            .await
    }

    /// Re-run analysis on a stored diff without recomputing it.
    pub async fn retry_analysis(&self, diff_record_id: i64) -> Result<DiffRecord> {
        let record = self.diffs.get(diff_record_id)?;
        if record.applied_to_skill {
            return Err(Error::AlreadyApplied(diff_record_id));
        }
        let article = self.articles.get_article(record.article_id)?;
        let current_skill = self.skill_context(&article)?;
        let original = reconstruct_original(&record.chunks);
        let modified = reconstruct_modified(&record.chunks);

        let analysis = self
            .analyzer
            .analyze_style_diff(StyleDiffInput {
                original: &original,
                modified: &modified,
                chunks: &record.chunks,
                current_skill: &current_skill,
            })
            .await
            .map_err(|e| Error::AnalysisFailed {
                message: failure_message(e),
                diff_record_id: Some(diff_record_id),
            })?;

        info!(diff_record_id, "Analysis retried");
        self.diffs
            .record_analysis(diff_record_id, &analysis.analysis_text, &analysis.extracted_rules)
    }

    /// Fold a record's rules into a new version of the article's skill.
    ///
    /// The version and the applied flag are committed together, so a
    /// record produces at most one version no matter how often this runs.
    pub async fn evolve_skill(&self, diff_record_id: i64) -> Result<SkillVersion> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let record = self.diffs.get(diff_record_id)?;
            if record.applied_to_skill {
                return Err(Error::AlreadyApplied(diff_record_id));
            }
            if record.extracted_rules.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "diff record {} has no extracted rules; analyze it first",
                    diff_record_id
                )));
            }
            let rules = ExtractedRules::parse(&record.extracted_rules)
                .unwrap_or_else(|| ExtractedRules::from_free_text(&record.extracted_rules));
            if rules.is_empty() {
                return Err(Error::Validation(format!(
                    "diff record {} produced no style rules to learn",
                    diff_record_id
                )));
            }

            let article = self.articles.get_article(record.article_id)?;
            let skill_id = article.skill_id.ok_or_else(|| {
                Error::Validation(format!("article {} is not bound to a skill", article.id))
            })?;
            let current = self.skills.current_version(skill_id)?;
            let next = current.version_number + 1;

            let new = NewVersion {
                content_markdown: merge_markdown(&current.content_markdown, &rules.to_markdown(next)),
                content_json: rules.merge_into_json(&current.content_json),
                change_summary: change_summary(article.id, &record.llm_analysis),
            };

            match self
                .diffs
                .apply_to_skill(diff_record_id, skill_id, current.version_number, new)
            {
                Ok((_, version)) => {
                    info!(
                        diff_record_id,
                        skill_id,
                        version = version.version_number,
                        rules = rules.len(),
                        "Skill evolved"
                    );
                    return Ok(version);
                }
                Err(Error::ConcurrencyConflict(msg)) if attempt < MAX_EVOLVE_ATTEMPTS => {
                    warn!(diff_record_id, skill_id, attempt, "Skill moved during evolve, re-merging: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Create a skill whose first version is extracted from pasted samples.
    /// Blank sample text creates a plain skill with an empty first version.
    pub async fn create_skill_with_samples(&self, seed: SampleSeed) -> Result<Skill> {
        if seed.name.trim().is_empty() {
            return Err(Error::Validation("skill name must not be blank".to_string()));
        }
        if seed.samples_text.trim().is_empty() {
            debug!(name = %seed.name.trim(), "No samples given, creating an empty skill");
            return self.skills.create_skill(NewSkill {
                name: seed.name,
                category: seed.category,
                description: seed.description,
                content_markdown: None,
                content_json: None,
            });
        }
        let samples = split_samples(&seed.samples_text);
        if samples.is_empty() {
            return Err(Error::Validation("provide at least one sample article".to_string()));
        }

        let prompt = build_analyze_prompt(&samples);
        info!(name = %seed.name.trim(), samples = samples.len(), "Extracting style from samples");
        let response = self
            .llm
            .generate(&prompt, self.extraction_temperature)
            .await
            .map_err(generation_error)?;
        let body = strip_code_fence(&response);
        if body.is_empty() {
            return Err(Error::Generation("model returned an empty style profile".to_string()));
        }

        let content_json = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) if value.is_object() => value.to_string(),
            _ => {
                warn!("Style profile is not a JSON object, storing Markdown only");
                "{}".to_string()
            }
        };
        let content_markdown = json_to_markdown(seed.name.trim(), body);

        let sample_rows: Vec<NewSample> = samples
            .into_iter()
            .enumerate()
            .map(|(i, content)| NewSample {
                title: format!("Sample {}", i + 1),
                content,
            })
            .collect();

        self.skills.create_skill_seeded(
            NewSkill {
                name: seed.name,
                category: seed.category,
                description: seed.description,
                content_markdown: Some(content_markdown),
                content_json: Some(content_json),
            },
            &sample_rows,
        )
    }

    pub fn evolution_state(&self, article_id: i64) -> Result<EvolutionState> {
        let article = self.articles.get_article(article_id)?;
        let state = match self.diffs.latest_for_article(article_id)? {
            Some(record) if record.applied_to_skill => EvolutionState::Evolved,
            Some(_) => EvolutionState::Diffed,
            None if article.is_edited() => EvolutionState::Edited,
            None => EvolutionState::Drafted,
        };
        Ok(state)
    }

    /// Current content of the article's skill, or empty when it has none.
    fn skill_context(&self, article: &Article) -> Result<String> {
        let Some(skill_id) = article.skill_id else {
            return Ok(String::new());
        };
        match self.skills.current_version(skill_id) {
            Ok(version) => Ok(version.content_markdown),
            Err(Error::NotFound(_)) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn generation_error(e: Error) -> Error {
    match e {
        Error::Generation(_) => e,
        other => Error::Generation(other.to_string()),
    }
}

fn failure_message(e: Error) -> String {
    match e {
        Error::AnalysisFailed { message, .. } => message,
        other => other.to_string(),
    }
}

fn merge_markdown(current: &str, section: &str) -> String {
    let current = current.trim_end();
    if current.is_empty() {
        section.to_string()
    } else {
        format!("{}\n\n{}", current, section)
    }
}

fn change_summary(article_id: i64, llm_analysis: &str) -> String {
    let base = format!("Learned from manual edits on article {}", article_id);
    match AnalysisDocument::parse(llm_analysis) {
        Some(doc) if !doc.summary.is_empty() => format!("{}: {}", base, doc.summary),
        _ => base,
    }
}
