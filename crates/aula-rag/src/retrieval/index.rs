//! In-memory vector index with full-snapshot persistence
//!
//! Exact cosine k-NN over an append-only record list. Snapshots are written
//! atomically (temp file + rename) so a crash mid-write never corrupts the
//! previous snapshot.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{SearchResult, VectorRecord};

/// Searchable collection of embedded chunks.
///
/// Invariant: every record's embedding length equals `dimensions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: usize,
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    /// Create an empty index with a fixed dimensionality
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: Vec::new(),
        }
    }

    /// Declared embedding dimensionality
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append records. Every embedding is validated before anything is
    /// inserted, so a mismatch leaves the index unchanged.
    pub fn insert(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            if record.embedding.len() != self.dimensions {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: record.embedding.len(),
                });
            }
        }
        self.records.extend(records);
        Ok(())
    }

    /// Return the `k` most similar records by cosine similarity, ordered by
    /// non-increasing similarity. Ties keep insertion order (earlier wins).
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query_embedding.len(),
            });
        }

        let mut results: Vec<SearchResult> = self
            .records
            .iter()
            .map(|record| SearchResult {
                chunk: record.chunk.clone(),
                similarity: cosine_similarity(query_embedding, &record.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal similarities
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        Ok(results)
    }

    /// Write a full snapshot. The write goes to a temp file in the target
    /// directory and is renamed into place, so readers of `location` only
    /// ever see a complete snapshot.
    pub fn save(&self, location: &Path) -> Result<()> {
        let dir = location.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, self)?;
        tmp.flush()?;
        tmp.persist(location)
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!(records = self.records.len(), path = %location.display(), "index snapshot written");
        Ok(())
    }

    /// Load a snapshot. A missing or corrupt file is an
    /// `IndexUnavailable` error; callers fall back to an empty index.
    pub fn load(location: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(location).map_err(|e| {
            Error::index_unavailable(format!("cannot read {}: {e}", location.display()))
        })?;
        let index: Self = serde_json::from_str(&content).map_err(|e| {
            Error::index_unavailable(format!("corrupt snapshot {}: {e}", location.display()))
        })?;
        Ok(index)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn record(text: &str, source: &str, seq: u32, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk: Chunk::new(text, source, seq),
            embedding,
        }
    }

    #[test]
    fn empty_index_returns_empty_results() {
        let index = VectorIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_is_bounded_and_ordered() {
        let mut index = VectorIndex::new(2);
        index
            .insert(vec![
                record("east", "a.txt", 0, vec![1.0, 0.0]),
                record("north", "a.txt", 1, vec![0.0, 1.0]),
                record("northeast", "b.txt", 0, vec![1.0, 1.0]),
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "east");
        assert_eq!(results[1].chunk.text, "northeast");
        assert!(results[0].similarity >= results[1].similarity);

        // k larger than the index returns everything
        let results = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .insert(vec![
                record("first", "a.txt", 0, vec![0.0, 1.0]),
                record("second", "a.txt", 1, vec![0.0, 1.0]),
                record("third", "a.txt", 2, vec![0.0, 2.0]),
            ])
            .unwrap();

        // All three have identical cosine similarity to the query
        let results = index.search(&[0.0, 1.0], 3).unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn dimension_mismatch_leaves_index_unchanged() {
        let mut index = VectorIndex::new(3);
        index
            .insert(vec![record("ok", "a.txt", 0, vec![1.0, 0.0, 0.0])])
            .unwrap();

        let err = index
            .insert(vec![
                record("ok too", "a.txt", 1, vec![0.0, 1.0, 0.0]),
                record("short", "a.txt", 2, vec![1.0, 0.0]),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn query_dimension_is_checked() {
        let index = VectorIndex::new(3);
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index = VectorIndex::new(2);
        index
            .insert(vec![record("hello", "a.txt", 0, vec![0.5, 0.5])])
            .unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.dimensions(), 2);
        assert_eq!(loaded.len(), 1);
        let results = loaded.search(&[0.5, 0.5], 1).unwrap();
        assert_eq!(results[0].chunk.text, "hello");
    }

    #[test]
    fn missing_or_corrupt_snapshot_is_index_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            VectorIndex::load(&missing).unwrap_err(),
            Error::IndexUnavailable(_)
        ));

        let corrupt = dir.path().join("bad.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(matches!(
            VectorIndex::load(&corrupt).unwrap_err(),
            Error::IndexUnavailable(_)
        ));
    }
}
