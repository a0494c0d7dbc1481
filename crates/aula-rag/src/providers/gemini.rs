//! Google Gemini provider for embeddings and answer generation

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

use super::answer::{AnswerProvider, TokenStream};
use super::embedding::EmbeddingProvider;
use super::{http_client, http_error, lines_of, require_api_key};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini API client implementing both provider traits
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    answer_model: String,
    embed_model: String,
    dimensions: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<BatchEmbedEntry<'a>>,
}

#[derive(Serialize)]
struct BatchEmbedEntry<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiProvider {
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

    /// The API addresses models as `models/<name>`; accept either form
    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn url(&self, model: &str, verb: &str) -> String {
        format!(
            "{}/v1beta/{}:{verb}?key={}",
            self.base_url,
            Self::model_path(model),
            self.api_key
        )
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(http_error("Gemini", status, &body))
    }

    fn parse_stream_line(line: &str) -> Option<String> {
        let data = line.strip_prefix("data:")?.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        let response: GenerateResponse = serde_json::from_str(data).ok()?;
        let text = response.text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.url(&self.embed_model, "embedContent");
        let request = EmbedContentRequest {
            content: Content::text(text),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse Gemini embedding: {e}")))?;
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(&self.embed_model, "batchEmbedContents");
        let model = Self::model_path(&self.embed_model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| BatchEmbedEntry {
                    model: model.clone(),
                    content: Content::text(text),
                })
                .collect(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse Gemini embeddings: {e}")))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(Error::provider(format!(
                "Gemini returned {} embeddings for {} texts",
                parsed.embeddings.len(),
                texts.len()
            )));
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1beta/models?key={}", self.base_url, self.api_key);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl AnswerProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = self.url(&self.answer_model, "generateContent");
        let request = GenerateRequest {
            contents: vec![Content::text(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("failed to parse Gemini response: {e}")))?;

        let text = parsed.text();
        if text.is_empty() {
            return Err(Error::provider("Gemini response missing text content"));
        }
        Ok(text)
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let url = format!(
            "{}/v1beta/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url,
            Self::model_path(&self.answer_model),
            self.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content::text(prompt)],
            generation_config: GenerationConfig {
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
        "gemini"
    }

    fn model(&self) -> &str {
        &self.answer_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_accepts_both_forms() {
        assert_eq!(GeminiProvider::model_path("embedding-001"), "models/embedding-001");
        assert_eq!(
            GeminiProvider::model_path("models/embedding-001"),
            "models/embedding-001"
        );
    }

    #[test]
    fn parses_embedding_response() {
        let json = r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#;
        let parsed: EmbedContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding.values, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn extracts_candidate_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Hola "},{"text":"mundo"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), "Hola mundo");

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn stream_lines_yield_token_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"paso"}]}}]}"#;
        assert_eq!(GeminiProvider::parse_stream_line(line), Some("paso".to_string()));

        assert_eq!(GeminiProvider::parse_stream_line("data: [DONE]"), None);
        assert_eq!(GeminiProvider::parse_stream_line(": keep-alive"), None);
        assert_eq!(GeminiProvider::parse_stream_line("data: {}"), None);
    }
}
