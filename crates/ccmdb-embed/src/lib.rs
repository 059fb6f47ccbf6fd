//! ccmdb-embed
//!
//! Embedding clients behind the `Embedder` trait: a hosted HTTP model
//! for production and a deterministic hashing embedder for offline and
//! test runs.

pub mod hashing;
pub mod hosted;

use serde::Deserialize;

use ccmdb_core::traits::Embedder;

pub use hashing::HashingEmbedder;
pub use hosted::HostedEmbedder;

/// `[embedding]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "hashing" (offline, deterministic) or "hosted" (HTTP model).
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub dim: usize,
    /// Name of the env var holding the bearer token. The token itself
    /// never lives in config files.
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
            dim: 384,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

pub fn embedder_from_settings(settings: &EmbeddingSettings) -> anyhow::Result<Box<dyn Embedder>> {
    match settings.provider.as_str() {
        "hashing" => Ok(Box::new(HashingEmbedder::new(settings.dim))),
        "hosted" => {
            let api_key = std::env::var(&settings.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(
                    env = %settings.api_key_env,
                    "no embedding API key in environment; requests go out unauthenticated"
                );
            }
            Ok(Box::new(HostedEmbedder::new(
                settings.endpoint.clone(),
                settings.model.clone(),
                settings.dim,
                api_key,
            )))
        }
        other => Err(anyhow::anyhow!("unknown embedding provider '{}'", other)),
    }
}
