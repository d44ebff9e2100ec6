pub mod analysis;
pub mod diff;
pub mod evolution;
pub mod export;
pub mod prompts;
pub mod rules;
pub mod service;

pub use analysis::{LLMProvider, LlmStyleAnalyzer, StyleAnalysis, StyleAnalyzer, StyleDiffInput};
pub use diff::{render_summary, DiffEngine, DiffStats};
pub use evolution::{EvolutionCoordinator, EvolutionState, SampleSeed};
pub use rules::{AnalysisDocument, ExtractedRules};
pub use service::SkillService;
