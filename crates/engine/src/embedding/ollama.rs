//! Ollama embedding provider.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
}

impl OllamaProvider {
  pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
    let base_url = config.ollama_url.clone();
    let model = config.model.clone();
    let dimensions = config.dimensions;

    info!(base_url, model, dimensions, "Ollama provider initialized");
    Ok(Self {
      client: reqwest::Client::new(),
      base_url,
      model,
      dimensions,
    })
  }

  /// Single embedding endpoint (legacy)
  fn embeddings_url(&self) -> String {
    format!("{}/api/embeddings", self.base_url)
  }

  /// Batch embedding endpoint
  fn embed_url(&self) -> String {
    format!("{}/api/embed", self.base_url)
  }
}

/// Request for single embedding (/api/embeddings endpoint)
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  prompt: &'a str,
}

/// Response from single embedding (/api/embeddings endpoint)
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  embedding: Vec<f32>,
}

/// Request for batch embedding (/api/embed endpoint)
#[derive(Debug, Serialize)]
struct BatchEmbeddingRequest<'a> {
  model: &'a str,
  input: Vec<&'a str>,
}

/// Response from batch embedding (/api/embed endpoint)
#[derive(Debug, Deserialize)]
struct BatchEmbeddingResponse {
  embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
  fn name(&self) -> &str {
    "ollama"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let request = EmbeddingRequest {
      model: &self.model,
      prompt: text,
    };

    trace!(text_len = text.len(), model = %self.model, "Sending embedding request");
    let start = Instant::now();

    let response = self.client.post(self.embeddings_url()).json(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!(status = %status, model = %self.model, "Ollama embedding failed");
      return Err(EmbeddingError::ProviderError(format!(
        "Ollama returned {}: {}",
        status, body
      )));
    }

    let result: EmbeddingResponse = response.json().await?;

    if result.embedding.len() != self.dimensions {
      warn!(
        expected = self.dimensions,
        got = result.embedding.len(),
        model = %self.model,
        "Unexpected embedding dimensions"
      );
    }

    trace!(
      dimensions = result.embedding.len(),
      elapsed_ms = start.elapsed().as_millis(),
      "Embedding complete"
    );

    Ok(result.embedding)
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }

    let request = BatchEmbeddingRequest {
      model: &self.model,
      input: texts.to_vec(),
    };

    debug!(batch_size = texts.len(), model = %self.model, "Embedding batch");
    let response = self.client.post(self.embed_url()).json(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!(status = %status, batch_size = texts.len(), model = %self.model, "Ollama batch embedding failed");
      return Err(EmbeddingError::ProviderError(format!(
        "Ollama returned {}: {}",
        status, body
      )));
    }

    let result: BatchEmbeddingResponse = response.json().await?;

    if result.embeddings.len() != texts.len() {
      return Err(EmbeddingError::ProviderError(format!(
        "Batch size mismatch: got {} embeddings for {} inputs",
        result.embeddings.len(),
        texts.len()
      )));
    }

    Ok(result.embeddings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_provider_customization() {
    let config = EmbeddingConfig {
      ollama_url: "http://custom:8080".to_string(),
      model: "custom-model".to_string(),
      dimensions: 1024,
      ..Default::default()
    };
    let provider = OllamaProvider::new(&config).expect("could not create provider");

    assert_eq!(provider.base_url, "http://custom:8080");
    assert_eq!(provider.model_id(), "custom-model");
    assert_eq!(provider.dimensions(), 1024);
  }

  #[tokio::test]
  #[ignore = "Requires running Ollama instance"]
  async fn test_embed_text() {
    let provider = OllamaProvider::new(&EmbeddingConfig::default()).expect("could not create provider");
    let embedding = provider.embed("Hello, world!").await.unwrap();
    assert_eq!(embedding.len(), provider.dimensions());
  }

  #[tokio::test]
  async fn test_unreachable_server_is_an_error() {
    let config = EmbeddingConfig {
      ollama_url: "http://localhost:1".to_string(),
      ..Default::default()
    };
    let provider = OllamaProvider::new(&config).expect("could not create provider");
    assert!(provider.embed("test").await.is_err());
  }
}
