//! OpenAI-compatible LLM client implementation.
//!
//! Sends raw JSON through `async-openai`'s bring-your-own-types API so that
//! servers returning slightly non-standard bodies (Ollama, vLLM) still parse.
//! One request per call; no caching, no retry.

use serde_json::json;
use tracing::debug;

use crate::errors::{LlmError, MaintError, Result};
use crate::utils::normalize_api_base;

use super::{LlmClient, Message, Role};

/// Sampling settings sent with every request.
const TEMPERATURE: f32 = 0.0;
const MAX_TOKENS: u32 = 256;

/// OpenAI-compatible LLM client implementing [`LlmClient`].
pub struct OpenAiClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    api_base: String,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key`  – API key; local servers accept any non-empty value.
    /// * `model`    – Model name (e.g. `"llama3.1:8b"`).
    /// * `base_url` – Server base URL; `/v1` is appended when missing.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: &str) -> Self {
        let api_base = normalize_api_base(base_url);
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.clone());

        Self {
            client: async_openai::Client::with_config(config),
            model: model.into(),
            api_base,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Serialise our [`Message`] slice into the JSON array expected by the API.
    fn messages_to_json(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": role_str(m.role),
                    "content": m.content,
                })
            })
            .collect()
    }

    /// Extract the assistant message text from a chat-completions response.
    fn extract_content(response: &serde_json::Value) -> Result<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(ToOwned::to_owned)
            .ok_or(MaintError::Llm(LlmError::EmptyResponse))
    }
}

impl LlmClient for OpenAiClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": Self::messages_to_json(messages),
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "stream": false,
        });

        let response: serde_json::Value = self
            .client
            .chat()
            .create_byot(request)
            .await
            .map_err(map_openai_error)?;
        debug!(model = %self.model, "Chat completion received");

        Self::extract_content(&response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
    }
}

/// Map an [`async_openai::error::OpenAIError`] to our [`LlmError`] domain type.
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match err {
        OpenAIError::Reqwest(e) => LlmError::Unreachable(e.to_string()),
        OpenAIError::ApiError(api_err) => LlmError::Api(api_err.message),
        other => LlmError::Api(other.to_string()),
    }
}
