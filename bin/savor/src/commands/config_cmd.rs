use savor_core::{Config, Error, Paths};
use savor_providers::create_provider;
use savor_skills::LLMProvider;
use serde_json::Value;
use std::time::Instant;

use super::runtime::ProviderBridge;

const CONNECTION_TEST_PROMPT: &str = "Reply with the single word: OK";

/// Show the current configuration with API keys masked.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(config.redacted())?;

    println!();
    println!("Current configuration");
    println!("  File:     {}", paths.config_file().display());
    println!("  Database: {}", config.db_path(&paths).display());
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Print the config file and database locations.
pub async fn path() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    println!("config:   {}", paths.config_file().display());
    println!("database: {}", config.db_path(&paths).display());
    println!("exports:  {}", paths.exports_dir().display());
    Ok(())
}

/// Get a config value by dot-separated key path.
pub async fn get(key: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(config.redacted())?;

    match resolve_json_path(&json, key) {
        Some(Value::String(s)) => println!("{}", s),
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => anyhow::bail!("Key '{}' not found in config", key),
    }
    Ok(())
}

/// Set a config value by dot-separated key path.
pub async fn set(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(&config)?;

    let parsed = parse_value(resolve_json_path(&json, key).as_ref(), value);
    let (new_config, parsed) = match apply_value(&json, key, parsed.clone()) {
        Ok(cfg) => (cfg, parsed),
        // `apiKey 123456` and friends: a literal the field rejects is kept as text
        Err(_) if !parsed.is_string() => {
            let text = Value::String(value.to_string());
            (apply_value(&json, key, text.clone())?, text)
        }
        Err(e) => return Err(e.into()),
    };
    new_config.save(&paths.config_file())?;

    match &parsed {
        Value::String(s) => println!("✓ Set {} = {}", key, s),
        other => println!("✓ Set {} = {}", key, serde_json::to_string(other)?),
    }
    Ok(())
}

/// Send one short prompt to the configured provider and print the reply.
pub async fn test() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let provider = create_provider(&config).map_err(|e| Error::Config(e.to_string()))?;
    let bridge = ProviderBridge::new(provider);

    println!("Testing connection to model '{}'...", config.llm.model);
    let started = Instant::now();
    let reply = bridge.generate(CONNECTION_TEST_PROMPT, 0.0).await?;
    println!(
        "✓ Connected in {} ms. Reply: {}",
        started.elapsed().as_millis(),
        reply.trim()
    );
    Ok(())
}

/// Keep the raw text for string fields; otherwise accept a JSON literal.
fn parse_value(current: Option<&Value>, raw: &str) -> Value {
    match current {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn apply_value(json: &Value, key: &str, value: Value) -> serde_json::Result<Config> {
    let mut json = json.clone();
    set_json_path(&mut json, key, value);
    serde_json::from_value(json)
}

/// Navigate a JSON value by dot-separated path.
fn resolve_json_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;
    for part in path.split('.') {
        let camel = to_camel_case(part);
        current = current.get(&camel).or_else(|| current.get(part))?;
    }
    Some(current.clone())
}

/// Set a value in a JSON object by dot-separated path, creating objects on the way.
fn set_json_path(json: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        // Config keys are camelCase on disk
        let key = if current.get(*part).is_some() { part.to_string() } else { to_camel_case(part) };

        if i == parts.len() - 1 {
            current[&key] = value;
            return;
        }

        if !current.get(&key).is_some_and(Value::is_object) {
            current[&key] = serde_json::json!({});
        }
        current = &mut current[&key];
    }
}

/// snake_case -> camelCase, so `llm.max_tokens` finds `llm.maxTokens`.
fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}
