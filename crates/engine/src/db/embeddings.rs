//! Embedding row operations.
//!
//! Each file carries at most one embedding row; re-indexing replaces it.

use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::warn;

use crate::db::{
  DbError, EngineDb, Result, escape_sql,
  files::{required_i64, required_string},
  schema::embeddings_schema,
};

/// A stored vector for one file.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
  pub file_path: String,
  /// Model identifier that produced the vector.
  pub model: String,
  /// Unix timestamp ms.
  pub created_at: i64,
  pub vector: Vec<f32>,
}

impl EngineDb {
  /// Insert or replace the embedding for a file.
  #[tracing::instrument(level = "trace", skip(self, embedding), fields(file_path = %embedding.file_path))]
  pub async fn upsert_embedding(&self, embedding: &EmbeddingRecord) -> Result<()> {
    let _guard = self.write_guard().await;
    let table = self.embeddings_table().await?;

    let _ = table
      .delete(&format!("file_path = '{}'", escape_sql(&embedding.file_path)))
      .await;

    let batch = embedding_to_batch(embedding, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], embeddings_schema(self.vector_dim));
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Get the embedding for a specific file.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_embedding(&self, file_path: &str) -> Result<Option<EmbeddingRecord>> {
    let table = self.embeddings_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_path = '{}'", escape_sql(file_path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    if results.is_empty() {
      return Ok(None);
    }

    let batch = &results[0];
    if batch.num_rows() == 0 {
      return Ok(None);
    }

    Ok(Some(batch_to_embedding(batch, 0)?))
  }

  /// List all stored embeddings in scan order.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
    let table = self.embeddings_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut embeddings = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        embeddings.push(batch_to_embedding(&batch, i)?);
      }
    }

    Ok(embeddings)
  }

  /// Count of embedding rows for one file (used by tests to assert the
  /// at-most-one invariant).
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_embeddings_for(&self, file_path: &str) -> Result<usize> {
    let table = self.embeddings_table().await?;
    Ok(
      table
        .count_rows(Some(format!("file_path = '{}'", escape_sql(file_path))))
        .await?,
    )
  }
}

/// Convert an EmbeddingRecord to an Arrow RecordBatch, padding or truncating
/// the vector to the table dimension.
pub(crate) fn embedding_to_batch(embedding: &EmbeddingRecord, vector_dim: usize) -> Result<RecordBatch> {
  if embedding.vector.len() > vector_dim {
    warn!(
      file_path = %embedding.file_path,
      got = embedding.vector.len(),
      expected = vector_dim,
      "Vector longer than table dimension, truncating"
    );
  }

  let mut values = embedding.vector.clone();
  values.resize(vector_dim, 0.0);

  let vector_arr = Float32Array::from(values);
  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector_list = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(vector_arr), None)?;

  let batch = RecordBatch::try_new(
    embeddings_schema(vector_dim),
    vec![
      Arc::new(arrow_array::StringArray::from(vec![embedding.file_path.clone()])),
      Arc::new(arrow_array::StringArray::from(vec![embedding.model.clone()])),
      Arc::new(Int64Array::from(vec![embedding.created_at])),
      Arc::new(vector_list),
    ],
  )?;

  Ok(batch)
}

/// Convert a RecordBatch row to an EmbeddingRecord.
pub(crate) fn batch_to_embedding(batch: &RecordBatch, row: usize) -> Result<EmbeddingRecord> {
  let file_path = required_string(batch, "file_path", row)?;
  let model = required_string(batch, "model", row)?;
  let created_at = required_i64(batch, "created_at", row)?;

  let vector = batch
    .column_by_name("vector")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .and_then(|list| {
      list
        .value(row)
        .as_any()
        .downcast_ref::<Float32Array>()
        .map(|a| a.values().to_vec())
    })
    .ok_or_else(|| DbError::NotFound("vector column".to_string()))?;

  Ok(EmbeddingRecord {
    file_path,
    model,
    created_at,
    vector,
  })
}
