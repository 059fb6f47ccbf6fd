//! HTTP client for a hosted embedding model speaking the common
//! `{model, input} -> {data: [{embedding}]}` wire shape.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ccmdb_core::traits::Embedder;

pub struct HostedEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dim: usize,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HostedEmbedder {
    pub fn new(endpoint: String, model: String, dim: usize, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            dim,
            api_key,
        }
    }
}

#[async_trait]
impl Embedder for HostedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?
            .error_for_status()
            .context("embedding endpoint returned an error status")?;
        let parsed: EmbeddingResponse = response.json().await.context("decode embedding response")?;

        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "embedding endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            ));
        }
        let mut out = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            if row.embedding.len() != self.dim {
                return Err(anyhow!(
                    "embedding has dim {}, expected {}",
                    row.embedding.len(),
                    self.dim
                ));
            }
            out.push(row.embedding);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_parses() {
        let raw = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],"model":"text-embedding-3-small"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn request_shape_serializes() {
        let input = vec!["how often is AC-2 reviewed".to_string()];
        let body = EmbeddingRequest { model: "text-embedding-3-small", input: &input };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"][0], "how often is AC-2 reviewed");
    }
}
