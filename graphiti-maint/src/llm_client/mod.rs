//! LLM client abstraction.
//!
//! Provides a trait for plain-text chat completions, used by the LLM probe.
//!
//! # Implementations
//! - [`openai::OpenAiClient`] — any OpenAI-compatible `/v1/chat/completions` endpoint via `async-openai`.

pub mod openai;

use serde::Serialize;

use crate::errors::Result;

/// A chat message for the LLM conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Speaker role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Trait for chat-completion clients.
#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    /// Send a conversation and return the assistant's reply text.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    fn model(&self) -> &str;
}
