//! Provider abstractions for embeddings and answer generation
//!
//! The provider kind is resolved exactly once, at service construction; an
//! unknown kind never falls back to a default.

pub mod answer;
pub mod embedding;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;

pub use answer::{AnswerProvider, TokenStream};
pub use embedding::EmbeddingProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};

/// Construct the embedding and answer providers for the configured kind.
///
/// One concrete provider implements both traits; the two handles share a
/// single HTTP client.
pub fn build(
    config: &ProviderConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn AnswerProvider>)> {
    match config.kind {
        ProviderKind::Gemini => {
            let provider = Arc::new(GeminiProvider::new(config)?);
            Ok((provider.clone(), provider))
        }
        ProviderKind::OpenAi => {
            let provider = Arc::new(OpenAiProvider::new(config)?);
            Ok((provider.clone(), provider))
        }
        ProviderKind::Ollama => {
            let provider = Arc::new(OllamaProvider::new(config)?);
            Ok((provider.clone(), provider))
        }
    }
}

/// Shared HTTP client with the configured timeout
pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::provider(format!("failed to build HTTP client: {e}")))
}

/// Required API key for remote providers; missing is a construction-time
/// configuration error.
pub(crate) fn require_api_key(config: &ProviderConfig) -> Result<String> {
    config.api_key.clone().ok_or_else(|| {
        Error::config(format!(
            "provider '{}' requires {} to be set",
            config.kind,
            config.kind.api_key_var()
        ))
    })
}

/// Classify an unsuccessful HTTP response: 429 is a rate-limit signal,
/// timeouts and 5xx are transient, anything else is a plain provider error.
pub(crate) fn http_error(provider: &str, status: StatusCode, body: &str) -> Error {
    let body: String = body.chars().take(200).collect();
    let message = format!("{provider} returned HTTP {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited(message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        Error::Transient(message)
    } else {
        Error::Provider(message)
    }
}

struct LineState<S> {
    body: Pin<Box<S>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Split a response byte stream into non-empty lines, carrying a buffer so
/// lines split across network chunks are reassembled. Used for both SSE
/// (`data: ...`) and NDJSON bodies.
pub(crate) fn lines_of<S, E>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };
    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.pending.pop_front() {
                return Some((Ok(line), st));
            }
            if st.done {
                if st.buffer.trim().is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut st.buffer);
                return Some((Ok(line.trim_end().to_string()), st));
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(pos) = st.buffer.find('\n') {
                        let line: String = st.buffer.drain(..=pos).collect();
                        let line = line.trim_end().to_string();
                        if !line.is_empty() {
                            st.pending.push_back(line);
                        }
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e.into()), st));
                }
                None => st.done = true,
            }
        }
    })
}
