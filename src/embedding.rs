//! Embedding capability and adapters.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible embeddings endpoint.
//!
//! Ingestion runs in controlled, offline conditions, so the adapters do not
//! retry: a failed embedding call aborts the ingestion run and surfaces to
//! the operator.
//!
//! Also provides vector utilities for the BLOB-encoded vectors stored in
//! SQLite:
//! - [`cosine_similarity`] — compute similarity between two vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Capability trait for embedding backends.
///
/// The indexer and the query path consume this interface; how the vectors
/// are actually computed is the backend's business.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed`] for single-text use cases
/// (e.g. embedding a question for semantic retrieval).
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

// ============ Disabled Embedder ============

/// A no-op embedder that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ OpenAI-compatible Embedder ============

/// Embedder backed by an OpenAI-compatible `POST /embeddings` endpoint.
///
/// The API key is read from the environment variable named in
/// `embedding.api_key_env`.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    api_key_env: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Create a new embedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config, or if
    /// the HTTP client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for openai provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", self.api_key_env))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Embeddings API error {}: {}", status, body_text);
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            bail!(
                "Embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the openai embedder
/// cannot be initialized.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values from
/// the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
