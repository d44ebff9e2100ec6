use savor_core::config::ProviderConfig;
use savor_core::Config;
use tracing::info;

use crate::client::HttpSettings;
use crate::{AnthropicProvider, OpenAIProvider, Provider};

/// api_base for OpenAI-compatible providers without one configured.
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "deepseek" => "https://api.deepseek.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        _ => crate::openai::DEFAULT_API_BASE,
    }
}

/// Infer the provider from the model id. `None` means fall back to config.
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("anthropic/") || model.starts_with("claude-") {
        Some("anthropic")
    } else if model.starts_with("ollama/") {
        Some("ollama")
    } else if model.starts_with("deepseek") {
        Some("deepseek")
    } else if model.starts_with("openai/")
        || model.starts_with("gpt-")
        || model.starts_with("o1")
        || model.starts_with("o3")
    {
        Some("openai")
    } else {
        None
    }
}

/// First provider with a usable key; ollama needs none.
fn fallback_provider_name(config: &Config) -> Option<&'static str> {
    let priority = ["anthropic", "openai", "deepseek", "openrouter"];
    for name in priority {
        if let Some(p) = config.providers.get(name) {
            if !p.api_key.is_empty() {
                return Some(name);
            }
        }
    }
    if config.providers.contains_key("ollama") {
        return Some("ollama");
    }
    None
}

/// Build the provider for `config.llm`.
///
/// Resolution order: explicit `llm.provider`, then the model prefix, then
/// the first configured provider with an API key.
pub fn create_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    create_provider_for(config, &config.llm.model, config.llm.provider.as_deref())
}

pub fn create_provider_for(
    config: &Config,
    model: &str,
    explicit_provider: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let max_tokens = config.llm.max_tokens;

    let effective_provider: &str = if let Some(ep) = explicit_provider {
        ep
    } else if let Some(inferred) = infer_provider_from_model(model) {
        inferred
    } else if let Some(fallback) = fallback_provider_name(config) {
        fallback
    } else {
        return Err(anyhow::anyhow!(
            "No LLM provider configured. Set 'llm.provider', use a recognized model prefix \
             (e.g. 'claude-...', 'gpt-4o', 'deepseek-chat'), or add an API key to the providers section."
        ));
    };

    let provider_cfg = config.providers.get(effective_provider);

    if effective_provider != "ollama" {
        match provider_cfg {
            None if explicit_provider.is_some() => {
                return Err(anyhow::anyhow!(
                    "Provider '{}' is explicitly configured but not found in providers section",
                    effective_provider
                ));
            }
            Some(cfg) if cfg.api_key.is_empty() => {
                return Err(anyhow::anyhow!(
                    "Provider '{}' has no API key. Add one to providers.{}.apiKey",
                    effective_provider,
                    effective_provider
                ));
            }
            _ => {}
        }
    }

    let empty_cfg = ProviderConfig::default();
    let resolved_cfg = provider_cfg.unwrap_or(&empty_cfg);
    let http = HttpSettings::from_config(config, resolved_cfg.proxy.as_deref());

    info!(provider = %effective_provider, model = %model, "LLM provider selected");

    let provider: Box<dyn Provider> = match effective_provider {
        "anthropic" => Box::new(AnthropicProvider::with_settings(
            &resolved_cfg.api_key,
            resolved_cfg.api_base.as_deref(),
            model,
            max_tokens,
            &http,
        )),
        _ => {
            // OpenAI-compatible: openai, deepseek, ollama, openrouter, custom
            let api_base = resolved_cfg
                .api_base
                .as_deref()
                .unwrap_or_else(|| default_api_base(effective_provider));
            Box::new(OpenAIProvider::with_settings(
                &resolved_cfg.api_key,
                Some(api_base),
                model,
                max_tokens,
                &http,
            ))
        }
    };
    Ok(provider)
}
