//! aula-rag: core of a retrieval-augmented study assistant
//!
//! Indexes a directory of course documents into a durable vector index and
//! answers questions against it with a pluggable language-model provider.
//! Ingestion is incremental and restart-safe: every successfully processed
//! source commits an index snapshot and a ledger entry, so interrupted runs
//! resume without re-embedding completed work.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod query;
pub mod retrieval;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AssistantConfig, ProviderKind};
pub use error::{Error, Result};
pub use ingestion::{IngestReport, IngestionCoordinator};
pub use query::QueryEngine;
pub use retrieval::VectorIndex;
pub use service::AssistantService;
pub use types::{Chunk, SearchResult, VectorRecord};
