//! Semantic search over stored embeddings.
//!
//! Search is brute force by design: every stored vector is scored against
//! the query with cosine similarity and the top results win. An empty query
//! is not a vector search at all; it browses the most recently modified
//! files instead.

use std::{cmp::Ordering, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  db::{DbError, EngineDb},
  embedding::{EmbeddingError, EmbeddingProvider},
};

/// Characters of stored content returned as the match snippet.
const SNIPPET_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
  #[error("Database error: {0}")]
  Db(#[from] DbError),
  #[error("Embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
}

/// One ranked hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
  pub path: String,
  pub name: String,
  pub snippet: String,
  pub score: f32,
}

pub struct SearchService {
  db: Arc<EngineDb>,
  embedding: Arc<dyn EmbeddingProvider>,
}

impl SearchService {
  pub fn new(db: Arc<EngineDb>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
    Self { db, embedding }
  }

  /// Rank stored files against a query. Blank queries take the browse path.
  pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
    if query.trim().is_empty() {
      return self.recent(limit).await;
    }

    let query_vector = self.embedding.embed(query).await?;
    let stored = self.db.list_embeddings().await?;
    debug!(query_len = query.len(), candidates = stored.len(), "Scoring search candidates");

    // Stable sort keeps scan order for equal scores
    let mut scored: Vec<(String, f32)> = stored
      .into_iter()
      .map(|e| {
        let score = cosine_similarity(&query_vector, &e.vector);
        (e.file_path, score)
      })
      .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);

    let mut results = Vec::with_capacity(scored.len());
    for (path, score) in scored {
      let Some(file) = self.db.get_file(&path).await? else {
        // Embedding without a file row; skip rather than fail the search
        warn!(path, "Stored embedding has no file row");
        continue;
      };
      results.push(SearchResult {
        path: file.path,
        name: file.name,
        snippet: snippet_of(file.content.as_deref().unwrap_or_default()),
        score,
      });
    }

    Ok(results)
  }

  /// Browse the most recently modified files, unranked.
  pub async fn recent(&self, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
    let files = self.db.recent_files(limit).await?;
    Ok(
      files
        .into_iter()
        .map(|file| SearchResult {
          path: file.path,
          name: file.name,
          snippet: String::new(),
          score: 1.0,
        })
        .collect(),
    )
  }
}

/// Cosine similarity `dot / (|a| * |b|)`.
///
/// Dimension mismatches and zero vectors score 0.0 so degraded data ranks
/// last instead of poisoning the sort with NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() {
    return 0.0;
  }

  let mut dot = 0.0f32;
  let mut mag_a = 0.0f32;
  let mut mag_b = 0.0f32;
  for (x, y) in a.iter().zip(b.iter()) {
    dot += x * y;
    mag_a += x * x;
    mag_b += y * y;
  }

  if mag_a == 0.0 || mag_b == 0.0 {
    return 0.0;
  }

  dot / (mag_a.sqrt() * mag_b.sqrt())
}

/// Leading characters of the stored content, on char boundaries.
fn snippet_of(content: &str) -> String {
  content.chars().take(SNIPPET_LEN).collect()
}
