//! Sanity checks against the inference endpoints Graphiti is configured with.
//!
//! The embedder probe catches the most common cause of mixed-dimension
//! graphs: an embedding model whose output length differs from the vector
//! indexes.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedder::EmbedderClient;
use crate::errors::Result;
use crate::llm_client::{LlmClient, Message};
use crate::utils::{cosine_similarity, is_finite_vector, l2_norm, one_line};

/// Text embedded by every embedder probe.
pub const PROBE_TEXT: &str = "Alice works at Acme Corp as a software engineer.";

pub const DEFAULT_COMPARE_TEXT: &str = "Acme Corp employs Alice, who writes software.";

pub const DEFAULT_LLM_PROMPT: &str = "Reply with the single word: pong";

/// Sent ahead of every LLM probe prompt.
pub const LLM_SYSTEM_PROMPT: &str = "You are answering a connectivity check. Keep the reply short.";

/// Replies longer than this are cut in reports.
const REPLY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedderProbe {
    pub model: String,
    pub expected_dim: usize,
    /// Length of each returned vector, probe text first.
    pub returned_dims: Vec<usize>,
    pub norms: Vec<f32>,
    /// Cosine similarity of the two vectors; `None` when not comparable.
    pub similarity: Option<f32>,
    /// Every component of every vector is finite.
    pub finite: bool,
    pub latency_ms: u64,
}

impl EmbedderProbe {
    pub fn dimension_ok(&self) -> bool {
        !self.returned_dims.is_empty() && self.returned_dims.iter().all(|d| *d == self.expected_dim)
    }

    pub fn passed(&self) -> bool {
        self.dimension_ok() && self.finite && self.similarity.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProbe {
    pub model: String,
    pub prompt: String,
    /// Single-line, truncated reply.
    pub reply: String,
    pub latency_ms: u64,
}

/// Embed [`PROBE_TEXT`] and `compare_text` in one request and check the
/// vectors against the embedder's expected dimensionality.
pub async fn probe_embedder<E: EmbedderClient>(
    embedder: &E,
    compare_text: &str,
) -> Result<EmbedderProbe> {
    let start = Instant::now();
    let vectors = embedder.embed_batch(&[PROBE_TEXT, compare_text]).await?;
    let latency_ms = start.elapsed().as_millis() as u64;

    let similarity = match vectors.as_slice() {
        [a, b] => cosine_similarity(a, b),
        _ => None,
    };
    let probe = EmbedderProbe {
        model: embedder.model().to_string(),
        expected_dim: embedder.dim(),
        returned_dims: vectors.iter().map(Vec::len).collect(),
        norms: vectors.iter().map(|v| l2_norm(v)).collect(),
        similarity,
        finite: vectors.iter().all(|v| is_finite_vector(v)),
        latency_ms,
    };

    if probe.dimension_ok() {
        info!(model = %probe.model, dims = probe.expected_dim, latency_ms, "Embedder probe passed dimension check");
    } else {
        warn!(
            model = %probe.model,
            expected = probe.expected_dim,
            returned = ?probe.returned_dims,
            "Embedder returned unexpected dimensionality"
        );
    }
    Ok(probe)
}

/// One chat round-trip: [`LLM_SYSTEM_PROMPT`] then `prompt`.
pub async fn probe_llm<L: LlmClient>(llm: &L, prompt: &str) -> Result<LlmProbe> {
    let start = Instant::now();
    let messages = [Message::system(LLM_SYSTEM_PROMPT), Message::user(prompt)];
    let reply = llm.generate(&messages).await?;
    let latency_ms = start.elapsed().as_millis() as u64;
    info!(model = %llm.model(), latency_ms, "LLM probe answered");

    Ok(LlmProbe {
        model: llm.model().to_string(),
        prompt: prompt.to_string(),
        reply: one_line(&reply, REPLY_PREVIEW_CHARS),
        latency_ms,
    })
}
