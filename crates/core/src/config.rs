use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Provider-level proxy. `Some("")` forces a direct connection even when
    /// a global proxy is configured.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Explicit provider; inferred from the model prefix when unset.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature used when drafting articles.
    #[serde(default = "default_draft_temperature")]
    pub draft_temperature: f32,
    /// Temperature used for style extraction and diff analysis.
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_draft_temperature() -> f32 {
    0.7
}

fn default_analysis_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: None,
            max_tokens: default_max_tokens(),
            draft_temperature: default_draft_temperature(),
            analysis_temperature: default_analysis_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Token unit used by the diff engine. Chosen once per installation: it
/// moves chunk boundaries but never breaks reconstruction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffGranularity {
    #[default]
    Line,
    Word,
    Char,
}

impl DiffGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffGranularity::Line => "line",
            DiffGranularity::Word => "word",
            DiffGranularity::Char => "char",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiffConfig {
    #[serde(default)]
    pub granularity: DiffGranularity,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Overrides `~/.savor/data/savor.db`.
    #[serde(default)]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), ProviderConfig::default());
        providers.insert("anthropic".to_string(), ProviderConfig::default());
        providers.insert("deepseek".to_string(), ProviderConfig {
            api_base: Some("https://api.deepseek.com/v1".to_string()),
            ..Default::default()
        });
        providers.insert("ollama".to_string(), ProviderConfig {
            api_key: "ollama".to_string(),
            api_base: Some("http://localhost:11434/v1".to_string()),
            proxy: None,
        });

        Self {
            providers,
            llm: LlmConfig::default(),
            diff: DiffConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Database location: explicit `storage.dbPath` or the default under `paths`.
    pub fn db_path(&self, paths: &Paths) -> PathBuf {
        match self.storage.db_path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => paths.db_file(),
        }
    }

    /// A copy safe to print: API keys are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for provider in copy.providers.values_mut() {
            if provider.api_key.len() > 8 {
                let tail: String = provider.api_key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
                provider.api_key = format!("****{}", tail);
            } else if !provider.api_key.is_empty() {
                provider.api_key = "****".to_string();
            }
        }
        copy
    }
}
