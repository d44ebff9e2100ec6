use async_trait::async_trait;
use reqwest::Client;
use savor_core::types::{ChatMessage, LLMResponse};
use savor_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::client::{build_http_client, HttpSettings};
use crate::Provider;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
pub(crate) fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// OpenAI-compatible chat completions (OpenAI, DeepSeek, Ollama, custom relays).
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl OpenAIProvider {
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
        let resolved_base = api_base
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let client = build_http_client(http, &resolved_base);
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: resolved_base,
            model: normalize_model(model).to_string(),
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn parse_response(raw_body: &str) -> Result<LLMResponse> {
        let chat_response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
            let end = truncate_at_char_boundary(raw_body, 500);
            Error::Provider(format!("Failed to parse response: {}. Body: {}", e, &raw_body[..end]))
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("No choices in response".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        Ok(LLMResponse {
            content: if content.is_empty() { None } else { Some(content) },
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: chat_response.usage.unwrap_or(Value::Null),
        })
    }
}

/// Strip routing prefixes such as `openai/` or `ollama/` from the model id.
fn normalize_model(model: &str) -> &str {
    ["openai/", "deepseek/", "ollama/"]
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
        .unwrap_or(model)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature,
        };

        info!(url = %url, model = %self.model, messages_count = messages.len(), temperature, "Calling LLM");
        let request_body = serde_json::to_string(&request)
            .map_err(|e| Error::Provider(format!("Failed to serialize request: {}", e)))?;
        debug!(body_len = request_body.len(), "Request body prepared");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(request_body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "LLM API error");
            return Err(Error::Provider(format!("API error {}: {}", status, raw_body)));
        }

        {
            let end = truncate_at_char_boundary(&raw_body, 500);
            debug!(body_len = raw_body.len(), preview = %&raw_body[..end], "LLM raw response");
        }

        Self::parse_response(&raw_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hi there."},"finish_reason":"stop"}],
"usage":{"prompt_tokens":10,"completion_tokens":3}}"#;
        let resp = OpenAIProvider::parse_response(body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hi there."));
        assert_eq!(resp.finish_reason, "stop");
        assert_eq!(resp.usage["completion_tokens"], 3);
    }

    #[test]
    fn test_parse_response_errors() {
        let err = OpenAIProvider::parse_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.to_string().contains("No choices"));
        let err = OpenAIProvider::parse_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_empty_content_is_none() {
        let body = r#"{"choices":[{"message":{"content":""},"finish_reason":"length"}]}"#;
        let resp = OpenAIProvider::parse_response(body).unwrap();
        assert!(resp.content.is_none());
        assert_eq!(resp.finish_reason, "length");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::user("hello")];
        let req = ChatRequest { model: "gpt-4o", messages: &messages, max_tokens: 512, temperature: 0.3 };
        let json: Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 512);
    }

    #[test]
    fn test_base_and_model_normalized() {
        let p = OpenAIProvider::new("k", Some("http://localhost:11434/v1/"), "ollama/llama3", 100);
        assert_eq!(p.api_base, "http://localhost:11434/v1");
        assert_eq!(p.model(), "llama3");
    }

    #[test]
    fn test_truncate_at_char_boundary() {
        let s = "写作风格";
        assert_eq!(truncate_at_char_boundary(s, 4), 3);
        assert_eq!(truncate_at_char_boundary(s, 100), s.len());
    }
}
