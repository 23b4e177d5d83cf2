//! Shared utilities.
//!
//! Includes:
//! - Cypher identifier quoting and console-friendly message shortening
//! - Vector similarity helpers used by the embedder probe
//! - Base URL normalisation for OpenAI-compatible endpoints

pub mod endpoint;
pub mod similarity;
pub mod text;

pub use endpoint::normalize_api_base;
pub use similarity::{cosine_similarity, is_finite_vector, l2_norm, normalize_l2};
pub use text::{normalize_whitespace, one_line, quote_ident, truncate_with_ellipsis};
