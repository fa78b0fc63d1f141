//! Embedding providers.
//!
//! The engine stores one vector per file and embeds queries at search time.
//! Providers are selected from config: the default hash provider needs no
//! external service and is fully deterministic, which keeps indexing and
//! tests offline; the Ollama provider talks to a local model server.

mod hash;
mod ollama;

use std::sync::Arc;

pub use hash::HashProvider;
pub use ollama::OllamaProvider;

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

impl dyn EmbeddingProvider {
  pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider {
      EmbeddingProviderKind::Hash => Ok(Arc::new(HashProvider::new(config))),
      EmbeddingProviderKind::Ollama => {
        let provider = OllamaProvider::new(config)?;
        Ok(Arc::new(provider))
      }
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("Provider error: {0}")]
  ProviderError(String),
  #[error("Request timed out")]
  Timeout,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::EmbeddingConfig;

  #[test]
  fn test_from_config_default_is_hash() {
    let provider = <dyn EmbeddingProvider>::from_config(&EmbeddingConfig::default()).unwrap();
    assert_eq!(provider.name(), "hash");
    assert_eq!(provider.dimensions(), 384);
  }
}
