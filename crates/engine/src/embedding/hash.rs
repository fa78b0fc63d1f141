//! Deterministic feature-hashed embeddings.
//!
//! Each lowercased alphanumeric token scatters signed contributions into the
//! vector at positions derived from its SHA-256 digest, and the result is
//! L2-normalized. Texts sharing tokens end up with correlated vectors, so
//! cosine ranking behaves sensibly without any model server. Identical text
//! always produces an identical vector.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::trace;

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// Signed positions derived per token from its digest.
const SCATTER_PER_TOKEN: usize = 4;

#[derive(Debug, Clone)]
pub struct HashProvider {
  model: String,
  dimensions: usize,
}

impl HashProvider {
  pub fn new(config: &EmbeddingConfig) -> Self {
    Self {
      model: config.model.clone(),
      dimensions: config.dimensions,
    }
  }

  fn embed_sync(&self, text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; self.dimensions];

    for token in tokenize(text) {
      let digest = Sha256::digest(token.as_bytes());
      for k in 0..SCATTER_PER_TOKEN {
        let offset = k * 4;
        let idx = u32::from_le_bytes([
          digest[offset],
          digest[offset + 1],
          digest[offset + 2],
          digest[offset + 3],
        ]) as usize
          % self.dimensions;
        let sign = if digest[16 + k] & 1 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign;
      }
    }

    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
      for v in &mut vector {
        *v /= magnitude;
      }
    }

    trace!(text_len = text.len(), dimensions = self.dimensions, "Hashed embedding");
    vector
  }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(|t| t.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
  fn name(&self) -> &str {
    "hash"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Ok(self.embed_sync(text))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
  }
}
