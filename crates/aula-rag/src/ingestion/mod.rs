//! Incremental ingestion pipeline
//!
//! Walks the source directory and drives read -> embed -> insert -> persist
//! for every source not yet in the ledger. Each source commits its index
//! snapshot before its ledger entry, so a crash between the two re-processes
//! at most the one source that was in flight.

pub mod ledger;
pub mod reader;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::{ChunkingConfig, IngestionConfig};
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::VectorIndex;
use crate::types::{Chunk, VectorRecord};

pub use ledger::IngestLedger;
pub use reader::DocumentReader;

/// Placeholder record seeded into an index that ends an ingestion run empty,
/// so retrieval never operates on a null index
const PLACEHOLDER_TEXT: &str = "No hay material de estudio disponible.";
const PLACEHOLDER_SOURCE: &str = "none";

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Sources embedded and persisted this run
    pub ingested: usize,
    /// Sources skipped because the ledger already had them
    pub skipped: usize,
    /// Sources that exhausted their attempts this run (retried next run)
    pub failed: usize,
}

/// Drives the read -> embed -> insert pipeline for a source directory
pub struct IngestionCoordinator {
    config: IngestionConfig,
    reader: DocumentReader,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<RwLock<VectorIndex>>,
    ledger: Arc<Mutex<IngestLedger>>,
    index_path: PathBuf,
}

impl IngestionCoordinator {
    pub fn new(
        config: IngestionConfig,
        chunking: ChunkingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<RwLock<VectorIndex>>,
        ledger: Arc<Mutex<IngestLedger>>,
        index_path: PathBuf,
    ) -> Self {
        Self {
            config,
            reader: DocumentReader::new(chunking),
            embedder,
            index,
            ledger,
            index_path,
        }
    }

    /// Run the full pipeline over the source directory.
    ///
    /// Per-source failures are contained: a source that exhausts its attempts
    /// is logged and skipped for this run, and is eligible again next run
    /// because it never enters the ledger. A dimension mismatch is a
    /// configuration bug and aborts the run instead.
    pub async fn run(&self) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let sources = self.enumerate_sources();
        tracing::info!(
            candidates = sources.len(),
            dir = %self.config.source_dir.display(),
            "starting ingestion run"
        );

        for (path, source_id) in sources {
            if self.ledger.lock().contains(&source_id) {
                tracing::debug!(source = %source_id, "already ingested, skipping");
                report.skipped += 1;
                continue;
            }

            match self.ingest_with_retry(&path, &source_id).await {
                Ok(chunks) => {
                    tracing::info!(source = %source_id, chunks, "source ingested");
                    report.ingested += 1;
                }
                Err(e @ Error::DimensionMismatch { .. }) => return Err(e),
                Err(e) => {
                    tracing::error!(source = %source_id, error = %e, "source failed, moving on");
                    report.failed += 1;
                }
            }
        }

        self.seed_placeholder_if_empty()?;

        tracing::info!(
            ingested = report.ingested,
            skipped = report.skipped,
            failed = report.failed,
            records = self.index.read().len(),
            "ingestion run finished"
        );
        Ok(report)
    }

    /// Candidate sources, sorted by identifier so runs are deterministic
    fn enumerate_sources(&self) -> Vec<(PathBuf, String)> {
        let root = &self.config.source_dir;
        if !root.exists() {
            tracing::warn!(dir = %root.display(), "source directory does not exist");
            return Vec::new();
        }

        let mut sources: Vec<(PathBuf, String)> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| DocumentReader::is_supported(entry.path()))
            .map(|entry| {
                let source_id = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or_else(|_| entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                (entry.path().to_path_buf(), source_id)
            })
            .collect();
        sources.sort_by(|a, b| a.1.cmp(&b.1));
        sources
    }

    async fn ingest_with_retry(&self, path: &Path, source_id: &str) -> Result<usize> {
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            match self.ingest_source(path, source_id).await {
                Ok(chunks) => return Ok(chunks),
                // The file will not get healthier on retry
                Err(e) if e.is_read() => return Err(e),
                Err(e @ Error::DimensionMismatch { .. }) => return Err(e),
                Err(e) => {
                    if attempt < self.config.max_attempts {
                        let delay = if e.is_rate_limit() {
                            Duration::from_secs(self.config.rate_limit_cooldown_secs)
                        } else {
                            let exponent = attempt.saturating_sub(1).min(16);
                            Duration::from_secs(self.config.retry_base_secs << exponent)
                        };
                        tracing::warn!(
                            source = %source_id,
                            attempt,
                            max_attempts = self.config.max_attempts,
                            error = %e,
                            "ingestion attempt failed, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::provider("ingestion failed")))
    }

    /// One attempt at one source: read, embed, insert, persist, record
    async fn ingest_source(&self, path: &Path, source_id: &str) -> Result<usize> {
        let chunks = self.reader.read(path, source_id)?;
        if chunks.is_empty() {
            tracing::warn!(source = %source_id, "no extractable text");
            // Recorded anyway so an empty file is not re-read every run
            self.ledger.lock().record(source_id)?;
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::provider(format!(
                "provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord { chunk, embedding })
            .collect();
        let count = records.len();

        // Snapshot commits before the ledger entry: a crash in between only
        // re-processes this source on the next run
        {
            let mut index = self.index.write();
            index.insert(records)?;
            index.save(&self.index_path)?;
        }
        self.ledger.lock().record(source_id)?;

        Ok(count)
    }

    fn seed_placeholder_if_empty(&self) -> Result<()> {
        let mut index = self.index.write();
        if !index.is_empty() {
            return Ok(());
        }
        tracing::warn!("index is empty after ingestion, seeding placeholder record");
        let dimensions = index.dimensions();
        index.insert(vec![VectorRecord {
            chunk: Chunk::new(PLACEHOLDER_TEXT, PLACEHOLDER_SOURCE, 0),
            embedding: vec![0.0; dimensions],
        }])?;
        index.save(&self.index_path)
    }
}
