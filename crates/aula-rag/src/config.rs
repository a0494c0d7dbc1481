//! Configuration for the assistant core

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main assistant configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Provider selection and credentials
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Greeting short-circuit configuration
    #[serde(default)]
    pub greeting: GreetingConfig,
}

impl AssistantConfig {
    /// Build a configuration from environment variables.
    ///
    /// `ASSISTANT_PROVIDER` selects the backend (`gemini`, `openai`, `ollama`);
    /// an unrecognized value is a fatal configuration error, never a fallback.
    pub fn from_env() -> Result<Self> {
        let kind = match env::var("ASSISTANT_PROVIDER") {
            Ok(value) => ProviderKind::from_str(&value)?,
            Err(_) => ProviderKind::default(),
        };

        let mut provider = ProviderConfig::for_kind(kind);
        if let Ok(key) = env::var(kind.api_key_var()) {
            provider.api_key = Some(key);
        }
        if let Ok(url) = env::var("ASSISTANT_BASE_URL") {
            provider.base_url = Some(url);
        }
        if let Ok(model) = env::var("ASSISTANT_ANSWER_MODEL") {
            provider.answer_model = model;
        }
        if let Ok(model) = env::var("ASSISTANT_EMBED_MODEL") {
            provider.embed_model = model;
        }
        if let Ok(dims) = env::var("ASSISTANT_EMBED_DIM") {
            provider.dimensions = dims
                .parse()
                .map_err(|_| Error::config(format!("ASSISTANT_EMBED_DIM is not a number: {dims}")))?;
        }

        let mut config = Self {
            provider,
            ..Self::default()
        };
        if let Ok(dir) = env::var("ASSISTANT_SOURCE_DIR") {
            config.ingestion.source_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ASSISTANT_DATA_DIR") {
            config.ingestion.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that must hold before any provider is constructed
    pub fn validate(&self) -> Result<()> {
        if self.provider.kind.requires_api_key() && self.provider.api_key.is_none() {
            return Err(Error::config(format!(
                "provider '{}' requires {} to be set",
                self.provider.kind,
                self.provider.kind.api_key_var()
            )));
        }
        if self.provider.dimensions == 0 {
            return Err(Error::config("embedding dimensions must be non-zero"));
        }
        Ok(())
    }
}

/// Backend provider selection - the closed set of supported providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini (generative language API)
    #[default]
    Gemini,
    /// OpenAI (embeddings + chat completions)
    #[serde(rename = "openai")]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// Environment variable holding this provider's credential
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Ollama => "OLLAMA_API_KEY",
        }
    }

    /// Whether the provider refuses to start without a credential
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::config(format!(
                "unknown provider '{other}' (expected gemini, openai, or ollama)"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Provider connection configuration. Immutable after service construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend to use
    pub kind: ProviderKind,
    /// API key (required for gemini and openai)
    pub api_key: Option<String>,
    /// Base URL override (defaults per provider)
    pub base_url: Option<String>,
    /// Generation model name
    pub answer_model: String,
    /// Embedding model name
    pub embed_model: String,
    /// Embedding dimensions, fixed for the lifetime of an index
    pub dimensions: usize,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Default models and dimensionality for a provider kind
    pub fn for_kind(kind: ProviderKind) -> Self {
        let (answer_model, embed_model, dimensions) = match kind {
            ProviderKind::Gemini => ("gemini-1.5-flash", "embedding-001", 768),
            ProviderKind::OpenAi => ("gpt-4o-mini", "text-embedding-3-small", 1536),
            ProviderKind::Ollama => ("phi3", "nomic-embed-text", 768),
        };
        Self {
            kind,
            api_key: None,
            base_url: None,
            answer_model: answer_model.to_string(),
            embed_model: embed_model.to_string(),
            dimensions,
            temperature: 0.3,
            timeout_secs: 120,
        }
    }

    /// Filename-safe scope tag: persisted state is keyed per
    /// (provider kind, embedding model) so switching providers never reuses
    /// another scope's index or ledger.
    pub fn scope_slug(&self) -> String {
        let model: String = self
            .embed_model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        format!("{}-{}", self.kind, model)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::for_kind(ProviderKind::default())
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Directory scanned for source documents
    pub source_dir: PathBuf,
    /// Directory holding the index snapshot and ledger
    pub data_dir: PathBuf,
    /// Attempts per source before it is skipped for the run
    pub max_attempts: u32,
    /// Base delay for exponential backoff on transient failures
    pub retry_base_secs: u64,
    /// Cooldown after a rate-limit signal
    pub rate_limit_cooldown_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data"),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("aula-rag"),
            max_attempts: 3,
            retry_base_secs: 2,
            rate_limit_cooldown_secs: 30,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters for plain-text sources
    pub chunk_size: usize,
    /// Chunks shorter than this are dropped
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            min_chunk_size: 25,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Greeting short-circuit configuration.
///
/// The vocabulary and reply are configuration rather than fixed behavior:
/// a short input whose lowercase form starts with any vocabulary entry gets
/// the canned reply without touching retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingConfig {
    /// Case-insensitive prefixes treated as greetings
    pub vocabulary: Vec<String>,
    /// Canned reply streamed for greetings
    pub reply: String,
    /// Inputs at or above this length (after trimming) never short-circuit
    pub max_len: usize,
    /// Inter-token pacing delay when streaming the reply; 0 disables
    pub token_delay_ms: u64,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            vocabulary: [
                "hola",
                "buenas",
                "buenos dias",
                "buenas tardes",
                "buenas noches",
                "hello",
                "hi",
                "hey",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            reply: "¡Hola! Soy tu asistente de estudio. ¿Sobre qué tema del material quieres preguntar?"
                .to_string(),
            max_len: 20,
            token_delay_ms: 40,
        }
    }
}
