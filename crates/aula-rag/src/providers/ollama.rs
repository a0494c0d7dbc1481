//! Ollama provider for local embeddings and answer generation

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

use super::answer::{AnswerProvider, TokenStream};
use super::embedding::EmbeddingProvider;
use super::{http_client, http_error, lines_of};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama API client implementing both provider traits
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    answer_model: String,
    embed_model: String,
    dimensions: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            answer_model: config.answer_model.clone(),
            embed_model: config.embed_model.clone(),
            dimensions: config.dimensions,
            temperature: config.temperature,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(http_error("Ollama", status, &body))
    }

    /// NDJSON: one JSON object per line, each carrying a `response` fragment
    fn parse_stream_line(line: &str) -> Option<String> {
        let chunk: StreamChunk = serde_json::from_str(line).ok()?;
        if chunk.response.is_empty() {
            None
        } else {
            Some(chunk.response)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse Ollama embedding: {e}")))?;
        Ok(parsed.embedding)
    }

    // No native batch endpoint; the default sequential embed_batch applies

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl AnswerProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.answer_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse Ollama response: {e}")))?;
        Ok(parsed.response)
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.answer_model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;

        let stream = lines_of(response.bytes_stream())
            .filter_map(|item| async move {
                match item {
                    Ok(line) => Self::parse_stream_line(&line).map(Ok),
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.answer_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedding_response() {
        let json = r#"{"embedding":[0.25,0.5]}"#;
        let parsed: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding, vec![0.25, 0.5]);
    }

    #[test]
    fn stream_lines_yield_response_fragments() {
        assert_eq!(
            OllamaProvider::parse_stream_line(r#"{"response":"El ","done":false}"#),
            Some("El ".to_string())
        );
        // Final chunk carries an empty fragment
        assert_eq!(
            OllamaProvider::parse_stream_line(r#"{"response":"","done":true}"#),
            None
        );
        assert_eq!(OllamaProvider::parse_stream_line("not json"), None);
    }
}
