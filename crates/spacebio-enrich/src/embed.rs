//! Embedding client over an OpenAI-compatible `/embeddings` endpoint.
//!
//! The service's dimensionality is probed once and cached; if the probe
//! itself fails the configured fallback (conventionally 384 for MiniLM
//! models) is used. A failed batch degrades to zero vectors of the
//! expected dimensionality instead of erroring out of the pipeline.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{instrument, warn};

use spacebio_common::config::AiConfig;
use spacebio_common::retry::RetryPolicy;

use crate::llm::EnrichError;

/// Vectors produced for one document: one for the full text, one per
/// non-empty section.
#[derive(Debug, Clone, Default)]
pub struct Embeddings {
    pub full_text: Vec<f32>,
    pub sections: Vec<(String, Vec<f32>)>,
}

/// Seam between the scheduler and the embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Map each text to a vector. Always returns one vector per input;
    /// on failure these are zero vectors of the expected dimensionality.
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Dimensionality used when the probe fails.
    pub fallback_dim: usize,
    pub retry: RetryPolicy,
}

impl From<&AiConfig> for EmbeddingConfig {
    fn from(cfg: &AiConfig) -> Self {
        Self {
            base_url: cfg.embedding_base_url.clone(),
            model: cfg.embedding_model.clone(),
            api_key: cfg.embedding_api_key.clone(),
            fallback_dim: cfg.embedding_dim,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct EmbeddingClient {
    cfg: EmbeddingConfig,
    client: reqwest::Client,
    dim: OnceCell<usize>,
}

impl EmbeddingClient {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { cfg, client, dim: OnceCell::new() })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EnrichError> {
        let body = serde_json::json!({
            "model": &self.cfg.model,
            "input": texts,
        });
        let mut req = self
            .client
            .post(format!("{}/embeddings", self.cfg.base_url))
            .json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let json: Value = resp.json().await?;
        if status >= 400 {
            let message = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            return Err(EnrichError::Api { status, message });
        }
        let vectors = parse_embeddings_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(EnrichError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    /// The service's vector dimensionality, probed once per process.
    pub async fn expected_dim(&self) -> usize {
        *self
            .dim
            .get_or_init(|| async {
                let probe = vec!["test".to_string()];
                match self.request_embeddings(&probe).await {
                    Ok(vectors) => vectors
                        .first()
                        .map(|v| v.len())
                        .unwrap_or(self.cfg.fallback_dim),
                    Err(err) => {
                        warn!(error = %err, fallback = self.cfg.fallback_dim, "dimension probe failed");
                        self.cfg.fallback_dim
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[instrument(skip(self, texts), fields(n = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        match self
            .cfg
            .retry
            .run("embeddings", || self.request_embeddings(texts))
            .await
        {
            Ok(vectors) => vectors,
            Err(err) => {
                let dim = self.expected_dim().await;
                warn!(error = %err, dim, "embedding failed, substituting zero vectors");
                vec![vec![0.0; dim]; texts.len()]
            }
        }
    }
}

fn parse_embeddings_response(json: &Value) -> Result<Vec<Vec<f32>>, EnrichError> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| EnrichError::Malformed("missing data array".to_string()))?;
    let mut out = Vec::with_capacity(data.len());
    for entry in data {
        let vector: Vec<f32> = serde_json::from_value(entry["embedding"].clone())?;
        out.push(vector);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_client(fallback_dim: usize) -> EmbeddingClient {
        EmbeddingClient::new(EmbeddingConfig {
            // Nothing listens here; connections are refused immediately.
            base_url: "http://127.0.0.1:1/v1".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            api_key: None,
            fallback_dim,
            retry: RetryPolicy {
                max_attempts: 1,
                floor: Duration::from_millis(1),
                ceiling: Duration::from_millis(1),
            },
        })
        .unwrap()
    }

    #[test]
    fn test_parse_embeddings_response() {
        let json: Value = serde_json::from_str(
            r#"{"data": [{"embedding": [0.1, 0.2]}, {"embedding": [0.3, 0.4]}]}"#,
        )
        .unwrap();
        let vectors = parse_embeddings_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn test_parse_embeddings_response_malformed() {
        assert!(parse_embeddings_response(&serde_json::json!({})).is_err());
        assert!(parse_embeddings_response(&serde_json::json!({"data": [{}]})).is_err());
    }

    #[tokio::test]
    async fn test_service_failure_yields_zero_vectors() {
        let client = unreachable_client(384);
        let vectors = client.embed(&["text".to_string()]).await;
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0], vec![0.0; 384]);
    }

    #[tokio::test]
    async fn test_fallback_dim_is_configurable() {
        let client = unreachable_client(7);
        let vectors = client
            .embed(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(vectors, vec![vec![0.0; 7], vec![0.0; 7]]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let client = unreachable_client(384);
        assert!(client.embed(&[]).await.is_empty());
    }
}
