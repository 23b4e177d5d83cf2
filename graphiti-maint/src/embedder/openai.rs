//! OpenAI-compatible embedding client.
//!
//! Wraps [`async_openai`] to provide [`EmbedderClient`] for any server that
//! speaks the OpenAI Embeddings API, including a local Ollama. Requests are
//! issued once; there is no retry.

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tracing::debug;

use crate::embedder::{EmbedderClient, Embedding};
use crate::errors::{MaintError, Result};
use crate::utils::normalize_api_base;

/// Maximum number of inputs per embeddings API call.
const BATCH_CHUNK_SIZE: usize = 2048;

/// Dimensionality of well-known embedding models, `None` when unknown.
pub fn known_model_dim(model: &str) -> Option<usize> {
    // Ollama tags carry an optional `:tag` suffix.
    let name = model.split(':').next().unwrap_or(model);
    match name {
        "mxbai-embed-large" => Some(1024),
        "nomic-embed-text" => Some(768),
        "all-minilm" => Some(384),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Embedding client for an OpenAI-compatible endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dim: usize,
    api_base: String,
}

impl OpenAiEmbedder {
    /// Create a new embedder.
    ///
    /// # Arguments
    /// * `api_key`  – API key; local servers accept any non-empty value.
    /// * `model`    – Embedding model name (e.g. `mxbai-embed-large`).
    /// * `base_url` – Server base URL; `/v1` is appended when missing.
    /// * `dim`      – Expected dimensionality; `None` looks the model up and
    ///   fails for unknown models.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        dim: Option<usize>,
    ) -> Result<Self> {
        let model = model.into();
        let dim = dim.or_else(|| known_model_dim(&model)).ok_or_else(|| {
            MaintError::Validation(format!(
                "unknown dimensionality for embedding model '{model}'; set it explicitly"
            ))
        })?;
        let api_base = normalize_api_base(base_url);
        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base.clone());
        Ok(Self {
            client: Client::with_config(config),
            model,
            dim,
            api_base,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Issue a single embeddings API call for up to [`BATCH_CHUNK_SIZE`] texts.
    async fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let input: Vec<String> = texts.iter().map(|s| (*s).to_owned()).collect();
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.as_str())
            .input(input)
            .build()
            .map_err(|e| MaintError::Embedder(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| MaintError::Embedder(format!("{}: {e}", self.api_base)))?;

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        debug!(model = %self.model, count = data.len(), "Embeddings received");
        Ok(data
            .into_iter()
            .map(|item| item.embedding.into_iter().map(|x| x as f32).collect())
            .collect())
    }
}

impl EmbedderClient for OpenAiEmbedder {
    /// Embed multiple texts, splitting into chunks of at most
    /// [`BATCH_CHUNK_SIZE`] items.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_CHUNK_SIZE) {
            let chunk_embeddings = self.embed_chunk(chunk).await?;
            if chunk_embeddings.len() != chunk.len() {
                return Err(MaintError::Embedder(format!(
                    "asked for {} embeddings, got {}",
                    chunk.len(),
                    chunk_embeddings.len()
                )));
            }
            result.extend(chunk_embeddings);
        }
        Ok(result)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    /// Build a JSON body mimicking an OpenAI-compatible embeddings response.
    fn make_response(count: usize, dim: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "object": "embedding",
                    "index": i,
                    "embedding": vec![0.1_f32; dim],
                })
            })
            .collect();
        serde_json::json!({
            "object": "list",
            "data": data,
            "model": "mxbai-embed-large",
            "usage": { "prompt_tokens": 8, "total_tokens": 8 },
        })
    }

    async fn mount_ok(server: &MockServer, count: usize, dim: usize) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(make_response(count, dim)))
            .mount(server)
            .await;
    }

    /// Base URL deliberately without `/v1`, as Ollama is usually configured.
    fn embedder(server: &MockServer) -> OpenAiEmbedder {
        OpenAiEmbedder::new("ollama", "mxbai-embed-large", &server.uri(), None).unwrap()
    }

    #[test]
    fn dim_of_known_models() {
        assert_eq!(known_model_dim("mxbai-embed-large"), Some(1024));
        assert_eq!(known_model_dim("nomic-embed-text:latest"), Some(768));
        assert_eq!(known_model_dim("text-embedding-3-large"), Some(3072));
        assert_eq!(known_model_dim("some-future-model"), None);
    }

    #[test]
    fn unknown_model_needs_explicit_dim() {
        assert!(matches!(
            OpenAiEmbedder::new("k", "custom", "http://localhost:11434", None),
            Err(MaintError::Validation(_))
        ));
        let e = OpenAiEmbedder::new("k", "custom", "http://localhost:11434", Some(512)).unwrap();
        assert_eq!(e.dim(), 512);
        assert_eq!(e.api_base(), "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn embed_returns_vector_of_returned_length() {
        let server = MockServer::start().await;
        mount_ok(&server, 1, 4).await;

        let embeddings = embedder(&server).embed_batch(&["hello world"]).await.unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), 4);
        for &v in &embeddings[0] {
            assert!((v - 0.1_f32).abs() < 1e-5, "expected ≈0.1, got {v}");
        }
    }

    #[tokio::test]
    async fn embed_batch_returns_one_embedding_per_input() {
        let server = MockServer::start().await;
        mount_ok(&server, 3, 4).await;

        let texts = ["alpha", "beta", "gamma"];
        let embeddings = embedder(&server).embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings.iter().all(|e| e.len() == 4));
    }

    #[tokio::test]
    async fn embed_batch_count_mismatch_is_error() {
        let server = MockServer::start().await;
        mount_ok(&server, 1, 4).await;

        let result = embedder(&server).embed_batch(&["a", "b"]).await;
        assert!(matches!(result, Err(MaintError::Embedder(msg)) if msg.contains("asked for 2")));
    }

    #[tokio::test]
    async fn embed_batch_empty_slice_makes_no_request() {
        let server = MockServer::start().await;
        let embeddings = embedder(&server).embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn api_error_maps_to_embedder_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "message": "model \"mxbai-embed-large\" not found, try pulling it first",
                    "type": "api_error",
                    "param": null,
                    "code": null,
                }
            })))
            .mount(&server)
            .await;

        let result = embedder(&server).embed_batch(&["test"]).await;
        assert!(matches!(result, Err(MaintError::Embedder(_))));
    }
}
