//! Core types shared across ingestion, retrieval, and generation

use serde::{Deserialize, Serialize};

/// A contiguous unit of extracted document text, the smallest thing that gets
/// embedded. Immutable once created; owned by the index after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Extracted text content
    pub text: String,
    /// Identifier of the source document (relative path within the source dir)
    pub source_id: String,
    /// Position of this chunk within its source (0-based)
    pub sequence_index: u32,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, sequence_index: u32) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            sequence_index,
        }
    }
}

/// One entry in the vector index: a chunk plus its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (higher is better)
    pub similarity: f32,
}
