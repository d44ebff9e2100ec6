use savor_core::{Config, DiffChunk, Result};
use savor_storage::{
    Article, Database, DiffRecord, NewSkill, OriginalSample, Skill, SkillUpdate, SkillVersion,
};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::{LLMProvider, LlmStyleAnalyzer, StyleAnalyzer};
use crate::diff::DiffEngine;
use crate::evolution::{EvolutionCoordinator, EvolutionState, SampleSeed};
use crate::export::{skill_to_json, skill_to_markdown};

/// Public surface of the engine. Every operation takes explicit ids.
#[derive(Clone)]
pub struct SkillService {
    coordinator: EvolutionCoordinator,
}

impl SkillService {
    pub fn new(coordinator: EvolutionCoordinator) -> Self {
        Self { coordinator }
    }

    /// Wire the engine from configuration: diff granularity, temperatures
    /// and an analyzer over the same model.
    pub fn from_config(db: Database, config: &Config, llm: Arc<dyn LLMProvider>) -> Self {
        let analyzer: Arc<dyn StyleAnalyzer> =
            Arc::new(LlmStyleAnalyzer::new(llm.clone(), config.llm.analysis_temperature));
        let coordinator = EvolutionCoordinator::new(db, DiffEngine::new(config.diff.granularity), llm, analyzer)
            .with_temperatures(config.llm.draft_temperature, config.llm.analysis_temperature);
        debug!(granularity = config.diff.granularity.as_str(), "Skill service ready");
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &EvolutionCoordinator {
        &self.coordinator
    }

    // --- skills ---

    pub fn create_skill(&self, new: NewSkill) -> Result<Skill> {
        self.coordinator.skills().create_skill(new)
    }

    pub async fn create_skill_with_samples(&self, seed: SampleSeed) -> Result<Skill> {
        self.coordinator.create_skill_with_samples(seed).await
    }

    pub fn get_skill(&self, skill_id: i64) -> Result<Skill> {
        self.coordinator.skills().get_skill(skill_id)
    }

    pub fn list_skills(&self) -> Result<Vec<Skill>> {
        self.coordinator.skills().list_skills()
    }

    pub fn update_skill(&self, skill_id: i64, update: SkillUpdate) -> Result<Skill> {
        self.coordinator.skills().update_skill_meta(skill_id, update)
    }

    pub fn delete_skill(&self, skill_id: i64) -> Result<()> {
        self.coordinator.skills().delete_skill(skill_id)
    }

    pub fn get_skill_versions(&self, skill_id: i64) -> Result<Vec<SkillVersion>> {
        self.coordinator.skills().list_versions(skill_id)
    }

    pub fn get_skill_version(&self, skill_id: i64, version_number: i64) -> Result<SkillVersion> {
        self.coordinator.skills().get_version(skill_id, version_number)
    }

    pub fn list_samples(&self, skill_id: i64) -> Result<Vec<OriginalSample>> {
        self.coordinator.skills().list_samples(skill_id)
    }

    pub fn export_skill_markdown(&self, skill_id: i64) -> Result<String> {
        let (skill, version) = self.current(skill_id)?;
        Ok(skill_to_markdown(&skill, &version))
    }

    pub fn export_skill_json(&self, skill_id: i64) -> Result<String> {
        let (skill, version) = self.current(skill_id)?;
        skill_to_json(&skill, &version)
    }

    fn current(&self, skill_id: i64) -> Result<(Skill, SkillVersion)> {
        self.coordinator.skills().current_with_skill(skill_id)
    }

    // --- articles ---

    pub async fn generate_article(&self, skill_id: i64, topic: &str, title: Option<&str>) -> Result<Article> {
        self.coordinator.generate_draft(skill_id, topic, title).await
    }

    pub fn save_article(&self, article_id: i64, content: &str) -> Result<Article> {
        self.coordinator.articles().save_edit(article_id, content)
    }

    pub fn get_article(&self, article_id: i64) -> Result<Article> {
        self.coordinator.articles().get_article(article_id)
    }

    pub fn list_articles(&self, skill_id: Option<i64>) -> Result<Vec<Article>> {
        self.coordinator.articles().list_articles(skill_id)
    }

    pub fn publish_article(&self, article_id: i64) -> Result<Article> {
        self.coordinator.articles().publish(article_id)
    }

    pub fn evolution_state(&self, article_id: i64) -> Result<EvolutionState> {
        self.coordinator.evolution_state(article_id)
    }

    // --- diffs & evolution ---

    /// Pure diff; nothing is persisted.
    pub fn compute_diff(&self, original: &str, modified: &str) -> Vec<DiffChunk> {
        self.coordinator.engine().diff(original, modified)
    }

    pub async fn analyze_diff(&self, article_id: i64, original: &str, modified: &str) -> Result<DiffRecord> {
        self.coordinator.analyze_diff(article_id, original, modified).await
    }

    pub async fn analyze_article(&self, article_id: i64) -> Result<DiffRecord> {
        self.coordinator.analyze_article(article_id).await
    }

    pub async fn retry_analysis(&self, diff_record_id: i64) -> Result<DiffRecord> {
        self.coordinator.retry_analysis(diff_record_id).await
    }

    pub fn list_diff_records(&self, article_id: i64) -> Result<Vec<DiffRecord>> {
        self.coordinator.diffs().list_for_article(article_id)
    }

    pub fn get_diff_record(&self, diff_record_id: i64) -> Result<DiffRecord> {
        self.coordinator.diffs().get(diff_record_id)
    }

    pub async fn evolve_skill(&self, diff_record_id: i64) -> Result<SkillVersion> {
        self.coordinator.evolve_skill(diff_record_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{reconstruct_modified, reconstruct_original};
    use savor_core::Error;
    use std::sync::Mutex;

    /// Drafts echo the topic; analysis requests get a fixed rules document.
    struct StubLlm {
        calls: Mutex<Vec<f32>>,
    }

    #[async_trait::async_trait]
    impl LLMProvider for StubLlm {
        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
            self.calls.lock().unwrap().push(temperature);
            if prompt.contains("## Diff summary") {
                Ok(r#"{"new_rules": {"add_to_style_principles": ["Open with a concrete claim"]}, "summary": "Sharper openings"}"#.to_string())
            } else {
                Ok("AI phones are everywhere.\nThey are very nice.\n".to_string())
            }
        }
    }

    fn service() -> (SkillService, Arc<StubLlm>) {
        let llm = Arc::new(StubLlm { calls: Mutex::new(Vec::new()) });
        let svc = SkillService::from_config(Database::open_in_memory().unwrap(), &Config::default(), llm.clone());
        (svc, llm)
    }

    #[tokio::test]
    async fn test_create_draft_edit_analyze_evolve() {
        let (svc, llm) = service();

        // Skill without samples starts at an empty v1
        let skill = svc.create_skill(NewSkill::named("Tech Reviews")).unwrap();
        assert_eq!(skill.current_version, 1);
        let v1 = svc.get_skill_version(skill.id, 1).unwrap();
        assert!(v1.content_markdown.is_empty());

        let article = svc.generate_article(skill.id, "AI phones", None).await.unwrap();
        assert_eq!(article.skill_version_used, Some(1));
        assert_eq!(article.ai_generated_content, article.user_refined_content);

        let refined = "AI phones are everywhere.\nMost of them are forgettable.\n";
        svc.save_article(article.id, refined).unwrap();
        let record = svc.analyze_article(article.id).await.unwrap();
        assert!(!record.chunks.is_empty());
        assert!(!record.applied_to_skill);
        assert_eq!(reconstruct_original(&record.chunks), article.ai_generated_content);
        assert_eq!(reconstruct_modified(&record.chunks), refined);

        let v2 = svc.evolve_skill(record.id).await.unwrap();
        assert_eq!(v2.version_number, 2);
        assert_eq!(svc.get_skill(skill.id).unwrap().current_version, 2);
        assert!(svc.get_diff_record(record.id).unwrap().applied_to_skill);
        assert!(matches!(svc.evolve_skill(record.id).await, Err(Error::AlreadyApplied(_))));

        let numbers: Vec<i64> = svc
            .get_skill_versions(skill.id)
            .unwrap()
            .iter()
            .map(|v| v.version_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(svc.get_skill_version(skill.id, 1).unwrap(), v1);

        // Default temperatures: draft 0.7, analysis 0.3
        let temps = llm.calls.lock().unwrap().clone();
        assert_eq!(temps.len(), 2);
        assert!((temps[0] - 0.7).abs() < f32::EPSILON);
        assert!((temps[1] - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_samples_give_empty_first_version() {
        let (svc, llm) = service();
        let skill = svc
            .create_skill_with_samples(SampleSeed {
                name: "Tech Reviews".into(),
                samples_text: String::new(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(skill.current_version, 1);
        assert!(svc.get_skill_version(skill.id, 1).unwrap().content_markdown.is_empty());
        assert!(llm.calls.lock().unwrap().is_empty());

        let article = svc.generate_article(skill.id, "AI phones", None).await.unwrap();
        assert_eq!(article.skill_version_used, Some(1));
    }

    #[tokio::test]
    async fn test_identical_diff_is_no_changes() {
        let (svc, _) = service();
        let skill = svc.create_skill(NewSkill::named("s")).unwrap();
        let article = svc.generate_article(skill.id, "t", Some("Title")).await.unwrap();
        assert_eq!(article.title, "Title");

        let err = svc.analyze_diff(article.id, "same", "same").await.unwrap_err();
        assert!(matches!(err, Error::NoChanges));
        assert!(svc.list_diff_records(article.id).unwrap().is_empty());

        // An unedited article has nothing to analyze either
        assert!(matches!(svc.analyze_article(article.id).await, Err(Error::NoChanges)));
    }

    #[tokio::test]
    async fn test_new_drafts_use_evolved_version() {
        let (svc, _) = service();
        let skill = svc.create_skill(NewSkill::named("s")).unwrap();
        let first = svc.generate_article(skill.id, "one", None).await.unwrap();
        svc.save_article(first.id, "Rewritten entirely.\n").unwrap();
        let record = svc.analyze_article(first.id).await.unwrap();
        svc.evolve_skill(record.id).await.unwrap();

        let second = svc.generate_article(skill.id, "two", None).await.unwrap();
        assert_eq!(second.skill_version_used, Some(2));
        assert_eq!(svc.get_article(first.id).unwrap().skill_version_used, Some(1));
        assert_eq!(svc.list_articles(Some(skill.id)).unwrap().len(), 2);
    }

    #[test]
    fn test_compute_diff_is_pure() {
        let (svc, _) = service();
        let chunks = svc.compute_diff("a\nb\n", "a\nc\n");
        assert_eq!(
            chunks,
            vec![DiffChunk::equal("a\n"), DiffChunk::delete("b\n"), DiffChunk::insert("c\n")]
        );
        assert!(svc.compute_diff("", "").is_empty());
    }

    #[test]
    fn test_exports_follow_current_version() {
        let (svc, _) = service();
        let skill = svc
            .create_skill(NewSkill {
                category: Some("Tech".into()),
                description: Some("Reviews".into()),
                content_markdown: Some("- Be brief".into()),
                content_json: Some(r#"{"style_principles": ["Be brief"]}"#.into()),
                ..NewSkill::named("Tech Reviews")
            })
            .unwrap();

        let md = svc.export_skill_markdown(skill.id).unwrap();
        assert!(md.starts_with("# Tech Reviews — Writing Style Skill\n"));
        assert!(md.contains("**Category**: Tech | **Version**: v1"));
        assert!(md.contains("- Be brief"));
        assert_eq!(md, svc.export_skill_markdown(skill.id).unwrap());

        let json: serde_json::Value = serde_json::from_str(&svc.export_skill_json(skill.id).unwrap()).unwrap();
        assert_eq!(json["skill"]["style_principles"][0], "Be brief");
        assert!(matches!(svc.export_skill_markdown(77), Err(Error::NotFound(_))));
    }
}
