use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "statutes".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            base_url: default_embedding_base_url(),
            api_key_env: default_embedding_api_key_env(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
    #[serde(default = "default_assistant_model")]
    pub model: String,
    #[serde(default = "default_assistant_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_assistant_base_url(),
            model: default_assistant_model(),
            api_key_env: default_assistant_api_key_env(),
            top_k: default_top_k(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_assistant_timeout_secs(),
        }
    }
}

fn default_assistant_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_assistant_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_assistant_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_top_k() -> usize {
    4
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> usize {
    1024
}
fn default_assistant_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_hint_buffer_secs")]
    pub hint_buffer_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            hint_buffer_secs: default_hint_buffer_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_secs() -> u64 {
    30
}
fn default_hint_buffer_secs() -> u64 {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate assistant
    if config.assistant.top_k == 0 {
        anyhow::bail!("assistant.top_k must be >= 1");
    }

    // Validate retry
    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be >= 1");
    }

    Ok(config)
}
