//! Embedding client implementations.
//!
//! [`OpenAiEmbeddings`] calls the OpenAI embeddings API with internal
//! batching and exponential backoff (1s, 2s, 4s, …, capped at 32s):
//! HTTP 429, 5xx, and network errors retry; any other 4xx fails
//! immediately. [`DisabledEmbeddings`] is the config default and fails
//! loudly on use, so a misconfigured deployment cannot silently ingest
//! nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use grounding_core::embedding::EmbeddingClient;
use grounding_core::{Error, Result};

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Build the embedding client named by the configuration.
pub fn create_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbeddings)),
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        other => Err(Error::config(format!("unknown embedding provider: {other}"))),
    }
}

/// Placeholder client used when no provider is configured.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingClient for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::config(
            "embedding provider is disabled; set [embedding] provider in the config",
        ))
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbeddings {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::config("embedding.model required for the openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::config("embedding.dims required for the openai provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::config("OPENAI_API_KEY environment variable not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::upstream)?;

        Ok(Self {
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            api_key,
            http,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingsResponse =
                            response.json().await.map_err(Error::upstream)?;
                        return self.collect_vectors(parsed, texts.len());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(Error::Upstream(format!(
                            "embeddings API error {status}: {body_text}"
                        )));
                        continue;
                    }

                    // other 4xx means the request itself is bad; retrying
                    // cannot help
                    return Err(Error::Upstream(format!(
                        "embeddings API error {status}: {body_text}"
                    )));
                }
                Err(err) => {
                    last_err = Some(Error::upstream(err));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Upstream("embedding failed after retries".to_string())))
    }

    fn collect_vectors(
        &self,
        parsed: EmbeddingsResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if parsed.data.len() != expected {
            return Err(Error::Upstream(format!(
                "embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                expected
            )));
        }
        // responses carry an index field; order by it rather than
        // trusting array order
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(batch = batch.len(), model = %self.model, "embedding batch");
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_a_config_error() {
        let config = EmbeddingConfig {
            provider: "word2vec".into(),
            ..Default::default()
        };
        assert!(matches!(create_client(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn disabled_client_fails_on_use() {
        let client = create_client(&EmbeddingConfig::default()).unwrap();
        assert_eq!(client.model_name(), "disabled");
        let err = client.embed(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
