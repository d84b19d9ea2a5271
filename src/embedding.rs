//! OpenAI embeddings client.
//!
//! Implements [`EmbeddingProvider`] over `POST {base_url}/embeddings`.
//! Retries follow [`crate::retry`]. Vectors are returned in input order,
//! using the `index` field of each response item when present.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use repo_chat_core::embedding::EmbeddingProvider;

use crate::config::{EmbeddingConfig, ProviderConfig};
use crate::retry::{post_json, RetryPolicy};

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, provider: &ProviderConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", provider.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json(&self.client, &self.url, &self.api_key, &body, self.retry, "OpenAI").await?;
        let vectors = parse_embeddings(&json)?;
        if vectors.len() != texts.len() {
            bail!(
                "OpenAI returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        let vector = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Invalid OpenAI response: non-numeric embedding value"))
            })
            .collect::<Result<Vec<f32>>>()?;
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> OpenAIEmbedder {
        let provider = ProviderConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..ProviderConfig::default()
        };
        OpenAIEmbedder::new(&EmbeddingConfig::default(), &provider, "sk-test".into())
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            })
    }

    #[test]
    fn test_parse_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_embeddings(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_missing_data() {
        assert!(parse_embeddings(&serde_json::json!({"object": "list"})).is_err());
    }

    #[tokio::test]
    async fn test_embed_posts_model_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-ada-002",
                "input": ["alpha", "beta"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 0, "embedding": [0.5, 0.5]},
                    {"index": 1, "embedding": [0.1, 0.9]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vectors = embedder(&server)
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.1, 0.9]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let err = embedder(&server)
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2 inputs"));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        assert!(embedder(&server).embed(&[]).await.unwrap().is_empty());
    }
}
