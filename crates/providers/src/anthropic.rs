use async_trait::async_trait;
use reqwest::Client;
use savor_core::types::{ChatMessage, LLMResponse};
use savor_core::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::client::{build_http_client, HttpSettings};
use crate::openai::truncate_at_char_boundary;
use crate::Provider;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, api_base: Option<&str>, model: &str, max_tokens: u32) -> Self {
        Self::with_settings(api_key, api_base, model, max_tokens, &HttpSettings::default())
    }

    pub fn with_settings(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        http: &HttpSettings,
    ) -> Self {
        let api_base = api_base
            .unwrap_or(ANTHROPIC_API_BASE)
            .trim_end_matches('/')
            .to_string();
        Self {
            client: build_http_client(http, &api_base),
            api_key: api_key.to_string(),
            api_base,
            model: Self::normalize_model(model).to_string(),
            max_tokens,
        }
    }

    /// Config may say "anthropic/claude-..." but the API expects the bare id.
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("anthropic/").unwrap_or(model)
    }

    /// The Messages API takes the system prompt separately and requires
    /// user/assistant turns to alternate.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut converted: Vec<Value> = Vec::new();

        for msg in messages {
            if msg.role == "system" {
                system_parts.push(&msg.content);
                continue;
            }
            let role = if msg.role == "assistant" { "assistant" } else { "user" };
            let same_role = converted.last().map(|prev| prev["role"] == role).unwrap_or(false);
            if !same_role {
                converted.push(json!({ "role": role, "content": msg.content }));
            } else if let Some(prev) = converted.last_mut() {
                let merged = format!("{}\n\n{}", prev["content"].as_str().unwrap_or(""), msg.content);
                prev["content"] = Value::String(merged);
            }
        }

        let system = if system_parts.is_empty() { None } else { Some(system_parts.join("\n\n")) };
        (system, converted)
    }

    fn parse_response(raw_body: &str) -> Result<LLMResponse> {
        let resp: AnthropicResponse = serde_json::from_str(raw_body).map_err(|e| {
            let end = truncate_at_char_boundary(raw_body, 500);
            Error::Provider(format!("Failed to parse Anthropic response: {}. Body: {}", e, &raw_body[..end]))
        })?;

        let text_parts: Vec<&str> = resp
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect();
        let content = if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) };

        let finish_reason = match resp.stop_reason.as_deref() {
            Some("end_turn") | None => "stop".to_string(),
            Some("max_tokens") => "length".to_string(),
            Some(other) => other.to_string(),
        };

        let usage = json!({
            "prompt_tokens": resp.usage.as_ref().and_then(|u| u.input_tokens),
            "completion_tokens": resp.usage.as_ref().and_then(|u| u.output_tokens),
        });

        Ok(LLMResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<LLMResponse> {
        let url = format!("{}/messages", self.api_base);
        let (system, anthropic_messages) = Self::convert_messages(messages);

        let mut request = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": temperature,
            "messages": anthropic_messages,
        });
        if let Some(sys) = system {
            request["system"] = Value::String(sys);
        }

        info!(url = %url, model = %self.model, messages_count = messages.len(), temperature, "Calling Anthropic API");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Anthropic API error");
            return Err(Error::Provider(format!("Anthropic API error {}: {}", status, raw_body)));
        }

        debug!(body_len = raw_body.len(), "Anthropic raw response");
        let parsed = Self::parse_response(&raw_body)?;
        info!(
            content_len = parsed.content.as_ref().map(|c| c.len()).unwrap_or(0),
            finish_reason = %parsed.finish_reason,
            "Anthropic response parsed"
        );
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}
