use async_trait::async_trait;
use savor_core::{DiffChunk, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::diff::render_summary;
use crate::prompts::{build_diff_analyze_prompt, strip_code_fence};
use crate::rules::AnalysisDocument;

/// Single-shot text generation. Implementations do not retry.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct StyleDiffInput<'a> {
    pub original: &'a str,
    pub modified: &'a str,
    pub chunks: &'a [DiffChunk],
    /// Current skill content, empty when the article is unbound.
    pub current_skill: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StyleAnalysis {
    pub analysis_text: String,
    pub extracted_rules: String,
}

/// Turns a user's edits into a narrative analysis plus rule text.
#[async_trait]
pub trait StyleAnalyzer: Send + Sync {
    async fn analyze_style_diff(&self, input: StyleDiffInput<'_>) -> Result<StyleAnalysis>;
}

/// `StyleAnalyzer` backed by a text-generation model.
pub struct LlmStyleAnalyzer {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
}

impl LlmStyleAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32) -> Self {
        Self { provider, temperature }
    }
}

#[async_trait]
impl StyleAnalyzer for LlmStyleAnalyzer {
    async fn analyze_style_diff(&self, input: StyleDiffInput<'_>) -> Result<StyleAnalysis> {
        let summary = render_summary(input.chunks);
        let prompt = build_diff_analyze_prompt(input.original, input.modified, &summary, input.current_skill);

        info!(prompt_len = prompt.len(), chunks = input.chunks.len(), "Requesting style analysis");
        let response = self
            .provider
            .generate(&prompt, self.temperature)
            .await
            .map_err(|e| match e {
                Error::AnalysisFailed { .. } => e,
                other => Error::analysis_failed(other.to_string()),
            })?;

        let cleaned = strip_code_fence(&response);
        if cleaned.is_empty() {
            return Err(Error::analysis_failed("model returned an empty analysis"));
        }
        debug!(response_len = response.len(), "Style analysis received");

        match AnalysisDocument::parse(cleaned) {
            Some(doc) => Ok(StyleAnalysis {
                analysis_text: cleaned.to_string(),
                extracted_rules: serde_json::to_string_pretty(&doc.new_rules)?,
            }),
            None => {
                warn!("Style analysis is not structured JSON, keeping raw text");
                Ok(StyleAnalysis {
                    analysis_text: cleaned.to_string(),
                    extracted_rules: cleaned.to_string(),
                })
            }
        }
    }
}
