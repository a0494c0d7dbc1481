//! Assistant service: the explicitly constructed object owning the index,
//! ledger, and provider handles
//!
//! Lifecycle is controlled by the process entry point: construct, run (or
//! spawn) ingestion, then serve queries. The service is cheap to clone and
//! safe to share across tasks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::BoxStream;
use parking_lot::{Mutex, RwLock};

use crate::config::AssistantConfig;
use crate::error::Result;
use crate::ingestion::{IngestLedger, IngestReport, IngestionCoordinator};
use crate::providers::{self, AnswerProvider, EmbeddingProvider};
use crate::query::QueryEngine;
use crate::retrieval::VectorIndex;

/// Shared assistant state
#[derive(Clone)]
pub struct AssistantService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AssistantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantService").finish_non_exhaustive()
    }
}

struct Inner {
    config: AssistantConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    answerer: Arc<dyn AnswerProvider>,
    index: Arc<RwLock<VectorIndex>>,
    ledger: Arc<Mutex<IngestLedger>>,
    index_path: PathBuf,
    ready: Arc<AtomicBool>,
    engine: QueryEngine,
}

impl AssistantService {
    /// Construct the service for the configured provider. Configuration
    /// problems (unknown kind, missing credential) fail here, loudly.
    pub fn new(config: AssistantConfig) -> Result<Self> {
        config.validate()?;
        let (embedder, answerer) = providers::build(&config.provider)?;
        Self::with_providers(config, embedder, answerer)
    }

    /// Construct with injected providers. Used by tests and by embedders that
    /// bring their own implementations.
    pub fn with_providers(
        config: AssistantConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn AnswerProvider>,
    ) -> Result<Self> {
        let slug = config.provider.scope_slug();
        let index_path = config.ingestion.data_dir.join(format!("index-{slug}.json"));
        let ledger_path = config.ingestion.data_dir.join(format!("ledger-{slug}.log"));
        let dimensions = embedder.dimensions();

        let index = match VectorIndex::load(&index_path) {
            Ok(index) if index.dimensions() == dimensions => {
                tracing::info!(
                    records = index.len(),
                    path = %index_path.display(),
                    "loaded index snapshot"
                );
                index
            }
            Ok(index) => {
                tracing::warn!(
                    snapshot = index.dimensions(),
                    configured = dimensions,
                    "snapshot dimensionality does not match the configured model, starting empty"
                );
                reset_scope_ledger(&ledger_path);
                VectorIndex::new(dimensions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "no usable index snapshot, starting empty");
                reset_scope_ledger(&ledger_path);
                VectorIndex::new(dimensions)
            }
        };

        let index = Arc::new(RwLock::new(index));
        let ledger = Arc::new(Mutex::new(IngestLedger::load(ledger_path)));
        let ready = Arc::new(AtomicBool::new(false));

        let engine = QueryEngine::new(
            index.clone(),
            embedder.clone(),
            answerer.clone(),
            ready.clone(),
            config.retrieval.top_k,
            config.greeting.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                embedder,
                answerer,
                index,
                ledger,
                index_path,
                ready,
                engine,
            }),
        })
    }

    /// Run ingestion to completion, then mark the pipeline ready to serve.
    /// May be re-invoked; already-ingested sources are skipped via the ledger.
    pub async fn run_ingestion(&self) -> Result<IngestReport> {
        let coordinator = IngestionCoordinator::new(
            self.inner.config.ingestion.clone(),
            self.inner.config.chunking.clone(),
            self.inner.embedder.clone(),
            self.inner.index.clone(),
            self.inner.ledger.clone(),
            self.inner.index_path.clone(),
        );
        let report = coordinator.run().await?;
        self.inner.ready.store(true, Ordering::Release);
        Ok(report)
    }

    /// Run ingestion on a background task so the query surface is available
    /// immediately; queries report "not ready" until the run completes.
    pub fn spawn_ingestion(&self) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.run_ingestion().await {
                tracing::error!(error = %e, "ingestion run failed");
            }
        })
    }

    /// One-shot grounded answer
    pub async fn answer(&self, question: &str) -> String {
        self.inner.engine.answer(question).await
    }

    /// Streamed grounded answer; always finite
    pub fn answer_stream(&self, question: &str) -> BoxStream<'static, String> {
        self.inner.engine.answer_stream(question)
    }

    /// Whether ingestion has completed at least once
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Records currently in the index
    pub fn record_count(&self) -> usize {
        self.inner.index.read().len()
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.inner.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn answer_provider(&self) -> &Arc<dyn AnswerProvider> {
        &self.inner.answerer
    }
}

/// The ledger only has meaning next to its snapshot; when the snapshot is
/// gone or unusable the scope rebuilds from scratch.
fn reset_scope_ledger(ledger_path: &Path) {
    match std::fs::remove_file(ledger_path) {
        Ok(()) => {
            tracing::warn!(path = %ledger_path.display(), "ledger reset, sources will re-ingest");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %ledger_path.display(), error = %e, "could not remove stale ledger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, GreetingConfig, IngestionConfig};
    use crate::query::NOT_READY_MESSAGE;
    use crate::testing::{AnswerScript, KeywordEmbedder, ScriptedAnswer};

    fn test_config(dir: &Path) -> AssistantConfig {
        AssistantConfig {
            ingestion: IngestionConfig {
                source_dir: dir.join("docs"),
                data_dir: dir.join("state"),
                max_attempts: 3,
                retry_base_secs: 0,
                rate_limit_cooldown_secs: 0,
            },
            chunking: ChunkingConfig {
                chunk_size: 200,
                min_chunk_size: 5,
            },
            greeting: GreetingConfig {
                token_delay_ms: 0,
                ..GreetingConfig::default()
            },
            ..AssistantConfig::default()
        }
    }

    fn service_with_mocks(dir: &Path) -> (AssistantService, Arc<KeywordEmbedder>) {
        let embedder = Arc::new(KeywordEmbedder::new(vec!["pantalla", "teclado"]));
        let answerer = Arc::new(ScriptedAnswer::new(AnswerScript::Echo));
        let service =
            AssistantService::with_providers(test_config(dir), embedder.clone(), answerer)
                .unwrap();
        (service, embedder)
    }

    #[tokio::test]
    async fn end_to_end_answers_are_grounded_in_the_right_file() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("tema1.txt"),
            "La pantalla se conecta al puerto HDMI del equipo.",
        )
        .unwrap();
        std::fs::write(
            docs.join("tema2.txt"),
            "El teclado se conecta a cualquier puerto USB libre.",
        )
        .unwrap();

        let (service, _) = service_with_mocks(dir.path());

        // Queries before ingestion completes report not-ready
        assert_eq!(service.answer("¿Qué es HDMI?").await, NOT_READY_MESSAGE);

        let report = service.run_ingestion().await.unwrap();
        assert_eq!(report.ingested, 2);
        assert!(service.is_ready());

        // The echo answerer returns the prompt, exposing the grounding
        let answer = service.answer("pantalla").await;
        assert!(answer.contains("La pantalla se conecta al puerto HDMI"));
        assert!(answer.contains("tema1.txt"));
    }

    #[tokio::test]
    async fn restart_reuses_the_snapshot_without_reembedding() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("tema1.txt"), "La pantalla va al puerto HDMI.").unwrap();

        let (first, first_embedder) = service_with_mocks(dir.path());
        first.run_ingestion().await.unwrap();
        assert_eq!(first_embedder.call_count(), 1);
        let records = first.record_count();

        // Same directories, fresh process
        let (second, second_embedder) = service_with_mocks(dir.path());
        assert_eq!(second.record_count(), records);

        let report = second.run_ingestion().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(second_embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_degrades_to_a_fresh_scope() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        std::fs::create_dir_all(&state).unwrap();

        let config = test_config(dir.path());
        let slug = config.provider.scope_slug();
        std::fs::write(state.join(format!("index-{slug}.json")), "{broken").unwrap();
        std::fs::write(state.join(format!("ledger-{slug}.log")), "tema1.txt\n").unwrap();

        let (service, _) = service_with_mocks(dir.path());
        assert_eq!(service.record_count(), 0);
        // The stale ledger went with the snapshot
        assert!(!state.join(format!("ledger-{slug}.log")).exists());
    }

    #[test]
    fn missing_credential_is_fatal_at_construction() {
        // Default config selects gemini with no API key
        let err = AssistantService::new(AssistantConfig::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
