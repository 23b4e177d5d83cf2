//! # graphiti-maint
//!
//! Maintenance tooling for [Graphiti](https://github.com/getzep/graphiti)
//! knowledge graphs stored in Neo4j.
//!
//! ## Architecture
//!
//! - **Connector** ([`driver`]): the [`driver::GraphDriver`] trait, a Bolt backend
//!   and an in-memory backend
//! - **Inspector** ([`inspect`]): index listing, vector census, graph statistics
//! - **Migration** ([`migration`]): checkpointed embedding-dimension migration
//! - **Reporter** ([`report`]): plain-text rendering of every result type
//! - **Probes** ([`probe`]): sanity checks against OpenAI-compatible inference endpoints

pub mod edges;
pub mod errors;
pub mod index;
pub mod nodes;
pub mod types;

pub mod driver;
pub mod embedder;
pub mod llm_client;

pub mod inspect;
pub mod migration;
pub mod probe;
pub mod report;

pub mod utils;

pub use errors::{LlmError, MaintError, Result};
pub use types::{MaintConfig, MigrationConfig};
