//! Answer provider trait for text generation

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;

/// Lazy, finite sequence of answer tokens. Dropping the stream releases the
/// underlying provider connection.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Trait for LLM-based answer generation
///
/// Exactly one concrete provider is active per process, selected by
/// configuration at startup.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Generate a complete answer for a prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generate an answer as a token stream
    async fn stream(&self, prompt: &str) -> Result<TokenStream>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// The generation model being used
    fn model(&self) -> &str;
}
