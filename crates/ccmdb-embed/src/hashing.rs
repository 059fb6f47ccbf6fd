//! Deterministic bag-of-words embedder. No model, no network: each
//! token is hashed into a bucket and the vector is L2-normalized.
//! Scores are meaningless semantically but stable across runs, which
//! is what the offline and test paths need.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ccmdb_core::traits::Embedder;

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let e = HashingEmbedder::new(64);
        let a = e.embed(&["account review policy".to_string()]).await.expect("embed");
        let b = e.embed(&["account review policy".to_string()]).await.expect("embed");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let e = HashingEmbedder::new(64);
        let out = e.embed(&["encryption keys rotate quarterly".to_string()]).await.expect("embed");
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn different_texts_embed_differently() {
        let e = HashingEmbedder::new(64);
        let out = e
            .embed(&["access control".to_string(), "incident response".to_string()])
            .await
            .expect("embed");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 64);
        assert_ne!(out[0], out[1]);
    }
}
