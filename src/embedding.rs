use crate::config::{ProviderConfig, DEFAULT_EMBEDDING_DIMENSIONS};
use crate::llm::ProviderError;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Which path produced an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    Provider,
    /// Random stand-in: no API key, or the provider call failed.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub source: EmbeddingSource,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Every vector it hands out has exactly `dimensions` entries, whether it
/// came from the provider or from the random fallback. Only an explicitly
/// configured size is sent upstream; models such as `text-embedding-ada-002`
/// reject the `dimensions` field.
pub struct EmbeddingClient {
    config: ProviderConfig,
    dimensions: usize,
    send_dimensions: bool,
    http: Client,
}

impl EmbeddingClient {
    pub fn new(config: ProviderConfig, dimensions: Option<usize>) -> Result<Self, ProviderError> {
        let http = config.http_client()?;
        Ok(Self {
            config,
            dimensions: dimensions.unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS),
            send_dimensions: dimensions.is_some(),
            http,
        })
    }

    /// Embed `text`, falling back to a random vector. Never fails.
    pub async fn generate_embedding(&self, text: &str) -> Vec<f32> {
        self.embed(text).await.values
    }

    pub async fn embed(&self, text: &str) -> Embedding {
        let Some(api_key) = self.config.api_key() else {
            tracing::warn!(
                dimensions = self.dimensions,
                "Embedding API key not configured, using random fallback embedding"
            );
            return self.fallback();
        };

        match self.request(api_key, text).await {
            Ok(values) => Embedding {
                values,
                source: EmbeddingSource::Provider,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Embedding generation failed, using random fallback embedding");
                self.fallback()
            }
        }
    }

    fn request_body<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.config.model,
            input: text,
            dimensions: self.send_dimensions.then_some(self.dimensions),
        }
    }

    async fn request(&self, api_key: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = self.request_body(text);

        let resp = self
            .http
            .post(format!("{}/embeddings", self.config.endpoint()))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let text = resp.text().await?;
        let data: EmbeddingResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let values = data
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Parse("response has no embedding data".into()))?;

        if values.len() != self.dimensions {
            return Err(ProviderError::Parse(format!(
                "expected {} dimensions, provider returned {}",
                self.dimensions,
                values.len()
            )));
        }
        Ok(values)
    }

    fn fallback(&self) -> Embedding {
        Embedding {
            values: random_embedding(self.dimensions),
            source: EmbeddingSource::Fallback,
        }
    }
}

/// `dimensions` independent values drawn uniformly from [-1, 1].
pub fn random_embedding(dimensions: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dimensions).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Serialize embedding to bytes for SQLite BLOB storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// Deserialize embedding from SQLite BLOB bytes
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
