pub mod anthropic;
pub mod client;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use savor_core::types::{ChatMessage, LLMResponse};
use savor_core::Result;

/// Chat-completion backend. Sampling temperature is chosen per call; model
/// and token limits are bound at construction.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<LLMResponse>;
}

pub use anthropic::AnthropicProvider;
pub use client::HttpSettings;
pub use factory::{create_provider, create_provider_for, infer_provider_from_model};
pub use openai::OpenAIProvider;
