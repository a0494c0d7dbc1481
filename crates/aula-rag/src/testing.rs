//! Deterministic mock providers for tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::error::{Error, Result};
use crate::providers::{AnswerProvider, EmbeddingProvider, TokenStream};

/// Embeds text as keyword-occurrence counts, so retrieval behaves
/// semantically: a question mentioning a keyword lands near the chunks that
/// mention it. Dimensionality is the keyword count.
pub(crate) struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    pub calls: AtomicUsize,
    /// Fail the next N embed calls with a rate-limit error
    pub fail_next: AtomicUsize,
    /// Always fail for texts containing this needle
    pub fail_containing: Option<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(keywords: Vec<&'static str>) -> Self {
        Self {
            keywords,
            calls: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            fail_containing: None,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::RateLimited("mock quota exhausted".into()));
        }
        if let Some(needle) = self.fail_containing {
            if text.contains(needle) {
                return Err(Error::Transient("mock network failure".into()));
            }
        }

        let lower = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock-embedder"
    }
}

/// Scripted answer provider behaviors
pub(crate) enum AnswerScript {
    /// `complete` returns the prompt itself; `stream` yields it word by word
    Echo,
    /// Every call fails
    Fail,
    /// Stream the given tokens, then end cleanly
    Tokens(Vec<&'static str>),
    /// Stream the given tokens, then fail mid-stream
    TokensThenError(Vec<&'static str>),
}

pub(crate) struct ScriptedAnswer {
    script: AnswerScript,
    pub completions: AtomicUsize,
    pub streams: AtomicUsize,
}

impl ScriptedAnswer {
    pub fn new(script: AnswerScript) -> Self {
        Self {
            script,
            completions: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnswerProvider for ScriptedAnswer {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            AnswerScript::Echo => Ok(prompt.to_string()),
            AnswerScript::Fail => Err(Error::provider("model offline")),
            AnswerScript::Tokens(tokens) | AnswerScript::TokensThenError(tokens) => {
                Ok(tokens.concat())
            }
        }
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        let items: Vec<Result<String>> = match &self.script {
            AnswerScript::Echo => prompt
                .split_whitespace()
                .map(|w| Ok(format!("{w} ")))
                .collect(),
            AnswerScript::Fail => return Err(Error::provider("model offline")),
            AnswerScript::Tokens(tokens) => tokens.iter().map(|t| Ok(t.to_string())).collect(),
            AnswerScript::TokensThenError(tokens) => {
                let mut items: Vec<Result<String>> =
                    tokens.iter().map(|t| Ok(t.to_string())).collect();
                items.push(Err(Error::Transient("connection reset".into())));
                items
            }
        };
        Ok(futures_util::stream::iter(items).boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock-answerer"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
