//! Query engine: grounded answers over the vector index
//!
//! Both operations gate on the readiness flag and never propagate provider
//! failures: a failed call becomes a displayable message, because the caller
//! is an interactive chat surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::GreetingConfig;
use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::{AnswerProvider, EmbeddingProvider};
use crate::retrieval::VectorIndex;

/// Served while ingestion has not completed yet
pub const NOT_READY_MESSAGE: &str =
    "Aún estoy preparando el material de estudio. Inténtalo de nuevo en unos momentos.";

/// Answers questions against the current index snapshot
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<RwLock<VectorIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
    answerer: Arc<dyn AnswerProvider>,
    ready: Arc<AtomicBool>,
    top_k: usize,
    greeting: GreetingConfig,
}

impl QueryEngine {
    pub fn new(
        index: Arc<RwLock<VectorIndex>>,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn AnswerProvider>,
        ready: Arc<AtomicBool>,
        top_k: usize,
        greeting: GreetingConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            answerer,
            ready,
            top_k,
            greeting,
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Short inputs that open with a greeting word bypass retrieval
    fn is_greeting(&self, question: &str) -> bool {
        let trimmed = question.trim();
        if trimmed.chars().count() >= self.greeting.max_len {
            return false;
        }
        let lower = trimmed.to_lowercase();
        self.greeting
            .vocabulary
            .iter()
            .any(|g| lower.starts_with(&g.to_lowercase()))
    }

    /// Embed the question, retrieve top-k chunks, assemble the grounded prompt
    async fn build_prompt(&self, question: &str) -> Result<String> {
        let query_embedding = self.embedder.embed(question).await?;
        let results = { self.index.read().search(&query_embedding, self.top_k)? };
        tracing::debug!(retrieved = results.len(), "chunks retrieved for question");

        let context = PromptBuilder::build_context(&results);
        Ok(PromptBuilder::build_grounded_prompt(question, &context))
    }

    /// One-shot grounded answer. Provider failures come back as a
    /// displayable string, never as an error.
    pub async fn answer(&self, question: &str) -> String {
        if !self.is_ready() {
            return NOT_READY_MESSAGE.to_string();
        }

        let prompt = match self.build_prompt(question).await {
            Ok(prompt) => prompt,
            Err(e) => return display_error(&e),
        };
        match self.answerer.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => display_error(&e),
        }
    }

    /// Streamed grounded answer: a finite token sequence that always
    /// terminates. A mid-stream provider failure emits one final error token.
    /// Dropping the stream cancels the work and releases the provider
    /// connection.
    pub fn answer_stream(&self, question: &str) -> BoxStream<'static, String> {
        let (tx, rx) = mpsc::channel(16);
        let engine = self.clone();
        let question = question.to_string();
        let _task = tokio::spawn(async move {
            engine.stream_task(question, tx).await;
        });
        ReceiverStream::new(rx).boxed()
    }

    async fn stream_task(self, question: String, tx: mpsc::Sender<String>) {
        if !self.is_ready() {
            let _ = tx.send(NOT_READY_MESSAGE.to_string()).await;
            return;
        }

        if self.is_greeting(&question) {
            tracing::debug!("greeting detected, bypassing retrieval");
            let delay = Duration::from_millis(self.greeting.token_delay_ms);
            for token in self.greeting.reply.split_whitespace() {
                if tx.send(format!("{token} ")).await.is_err() {
                    return;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            return;
        }

        let prompt = match self.build_prompt(&question).await {
            Ok(prompt) => prompt,
            Err(e) => {
                let _ = tx.send(display_error(&e)).await;
                return;
            }
        };

        let mut tokens = match self.answerer.stream(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(display_error(&e)).await;
                return;
            }
        };

        while let Some(item) = tokens.next().await {
            match item {
                Ok(token) => {
                    // A closed receiver means the consumer stopped pulling;
                    // returning drops the provider stream
                    if tx.send(token).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(display_error(&e)).await;
                    return;
                }
            }
        }
    }
}

fn display_error(error: &crate::error::Error) -> String {
    format!("Hubo un error al generar la respuesta: {error}")
}
