//! OpenAI provider for embeddings and answer generation

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

use super::answer::{AnswerProvider, TokenStream};
use super::embedding::EmbeddingProvider;
use super::{http_client, http_error, lines_of, require_api_key};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI API client implementing both provider traits
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    answer_model: String,
    embed_model: String,
    dimensions: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            api_key: require_api_key(config)?,
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
        Err(http_error("OpenAI", status, &body))
    }

    fn parse_stream_line(line: &str) -> Option<String> {
        let data = line.strip_prefix("data:")?.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        let chunk: ChatChunk = serde_json::from_str(data).ok()?;
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::provider("OpenAI returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.embed_model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse OpenAI embeddings: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::provider(format!(
                "OpenAI returned {} embeddings for {} texts",
                parsed.data.len(),
                texts.len()
            )));
        }

        // The API documents index-ordered results; sort to be safe
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl AnswerProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.answer_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse OpenAI response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::provider("OpenAI response missing message content"))
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.answer_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
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
        "openai"
    }

    fn model(&self) -> &str {
        &self.answer_model
    }
}
