use async_trait::async_trait;
use savor_core::types::ChatMessage;
use savor_core::{Config, Error, Paths, Result};
use savor_providers::{create_provider, Provider};
use savor_skills::{LLMProvider, SkillService};
use savor_storage::Database;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Adapts a chat provider to the single-prompt interface the engine uses.
pub struct ProviderBridge {
    provider: Box<dyn Provider>,
}

impl ProviderBridge {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LLMProvider for ProviderBridge {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let messages = [ChatMessage::user(prompt)];
        let response = self.provider.chat(&messages, temperature).await?;
        if response.finish_reason == "length" {
            warn!("Model output was truncated at the token limit");
        }
        response
            .content
            .ok_or_else(|| Error::Generation("model returned no content".to_string()))
    }
}

/// Stand-in when no provider is configured. Commands that never call the
/// model still work; the others fail with the configuration problem.
struct UnconfiguredLlm {
    reason: String,
}

#[async_trait]
impl LLMProvider for UnconfiguredLlm {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(Error::Config(self.reason.clone()))
    }
}

/// Open the database and wire the engine from `~/.savor/config.json`.
pub fn open_service() -> anyhow::Result<SkillService> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let db_path = config.db_path(&paths);
    let db = Database::open(&db_path)?;

    let llm: Arc<dyn LLMProvider> = match create_provider(&config) {
        Ok(provider) => Arc::new(ProviderBridge::new(provider)),
        Err(e) => {
            debug!(error = %e, "No LLM provider available");
            Arc::new(UnconfiguredLlm { reason: e.to_string() })
        }
    };
    Ok(SkillService::from_config(db, &config, llm))
}

/// Text from `--text`, a file, or stdin when the file is `-`.
pub fn read_text(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(t), None) => Ok(t),
        (None, Some(p)) if p.as_os_str() == "-" => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        (None, Some(p)) => std::fs::read_to_string(p)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", p.display(), e)),
        (Some(_), Some(_)) => anyhow::bail!("Pass either text or a file, not both"),
        (None, None) => anyhow::bail!("No input given; pass text or a file (use - for stdin)"),
    }
}

/// First line of `text`, cut to `max` chars, for list views.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}
