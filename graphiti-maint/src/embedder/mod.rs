//! Embedder client abstraction.
//!
//! Provides a trait for generating vector embeddings from text, used by the
//! endpoint probes to check that an inference server produces vectors of the
//! dimensionality the graph's indexes expect.
//!
//! # Implementations
//! - [`openai::OpenAiEmbedder`] — any OpenAI-compatible `/v1/embeddings` endpoint (OpenAI, Ollama)

pub mod openai;

use crate::errors::Result;

/// A vector embedding (f32 components).
pub type Embedding = Vec<f32>;

/// Trait for text-to-vector embedding clients.
#[allow(async_fn_in_trait)]
pub trait EmbedderClient: Send + Sync {
    /// Generate embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Dimensionality this client expects its model to produce.
    fn dim(&self) -> usize;

    fn model(&self) -> &str;
}
