//! File row operations.
//!
//! The files table is keyed by absolute path. Deletes cascade to the
//! embeddings and file_tags tables; renames move dependent rows so the
//! stored vector survives a path change untouched.

use std::sync::Arc;

use arrow_array::{Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::db::{
  DbError, EngineDb, Result,
  embeddings::{batch_to_embedding, embedding_to_batch},
  escape_sql,
  schema::{embeddings_schema, files_schema},
  tags::{batch_to_file_tag, file_tag_to_batch},
};

/// Metadata and extracted content for one indexed file.
#[derive(Debug, Clone)]
pub struct FileRecord {
  /// Absolute path, unique per row.
  pub path: String,
  pub name: String,
  pub extension: String,
  pub size_bytes: u64,
  /// Unix timestamp ms.
  pub created_at: i64,
  pub modified_at: i64,
  pub last_scanned_at: i64,
  /// SHA-256 of the raw file bytes.
  pub content_hash: Option<String>,
  /// Extracted text, empty or absent for unsupported formats.
  pub content: Option<String>,
}

impl EngineDb {
  /// Insert or replace the row for a file path.
  #[tracing::instrument(level = "trace", skip(self, file), fields(path = %file.path))]
  pub async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
    let _guard = self.write_guard().await;
    let table = self.files_table().await?;

    let _ = table.delete(&format!("path = '{}'", escape_sql(&file.path))).await;

    let batch = file_to_batch(file)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], files_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Get the row for a specific path.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
    let table = self.files_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("path = '{}'", escape_sql(path)))
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

    Ok(Some(batch_to_file(batch, 0)?))
  }

  /// List every indexed file.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
    let table = self.files_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut files = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        files.push(batch_to_file(&batch, i)?);
      }
    }

    Ok(files)
  }

  /// Most recently modified files, newest first. Backs the empty-query
  /// browse path, so ordering must be deterministic.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn recent_files(&self, limit: usize) -> Result<Vec<FileRecord>> {
    let mut files = self.list_files().await?;
    // Stable sort keeps scan order for equal timestamps
    files.sort_by_key(|f| std::cmp::Reverse(f.modified_at));
    files.truncate(limit);
    Ok(files)
  }

  /// Delete a file row and cascade to its embedding and tag links.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn delete_file(&self, path: &str) -> Result<()> {
    let _guard = self.write_guard().await;
    let escaped = escape_sql(path);

    let files = self.files_table().await?;
    files.delete(&format!("path = '{}'", escaped)).await?;

    let embeddings = self.embeddings_table().await?;
    embeddings.delete(&format!("file_path = '{}'", escaped)).await?;

    let file_tags = self.file_tags_table().await?;
    file_tags.delete(&format!("file_path = '{}'", escaped)).await?;

    Ok(())
  }

  /// Move a file row to a new path, carrying the embedding and tag links
  /// along. Returns false when no row exists at the old path, in which case
  /// nothing is changed and the caller should index the new path from
  /// scratch.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn rename_file(&self, from: &str, to: &str) -> Result<bool> {
    let Some(mut file) = self.get_file(from).await? else {
      return Ok(false);
    };

    let _guard = self.write_guard().await;
    let from_escaped = escape_sql(from);
    let to_path = std::path::Path::new(to);

    file.path = to.to_string();
    file.name = to_path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    file.extension = to_path
      .extension()
      .map(|e| e.to_string_lossy().to_lowercase())
      .unwrap_or_default();
    file.last_scanned_at = Utc::now().timestamp_millis();

    let files = self.files_table().await?;
    files.delete(&format!("path = '{}'", from_escaped)).await?;
    let _ = files.delete(&format!("path = '{}'", escape_sql(to))).await;
    let batch = file_to_batch(&file)?;
    files
      .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], files_schema())))
      .execute()
      .await?;

    // Re-point the embedding row without touching the vector
    let embeddings = self.embeddings_table().await?;
    let rows: Vec<RecordBatch> = embeddings
      .query()
      .only_if(format!("file_path = '{}'", from_escaped))
      .execute()
      .await?
      .try_collect()
      .await?;
    for row_batch in &rows {
      for i in 0..row_batch.num_rows() {
        let mut embedding = batch_to_embedding(row_batch, i)?;
        embedding.file_path = to.to_string();
        let batch = embedding_to_batch(&embedding, self.vector_dim)?;
        embeddings
          .add(Box::new(RecordBatchIterator::new(
            vec![Ok(batch)],
            embeddings_schema(self.vector_dim),
          )))
          .execute()
          .await?;
      }
    }
    embeddings.delete(&format!("file_path = '{}'", from_escaped)).await?;

    // Re-point tag links
    let file_tags = self.file_tags_table().await?;
    let rows: Vec<RecordBatch> = file_tags
      .query()
      .only_if(format!("file_path = '{}'", from_escaped))
      .execute()
      .await?
      .try_collect()
      .await?;
    for row_batch in &rows {
      for i in 0..row_batch.num_rows() {
        let mut link = batch_to_file_tag(row_batch, i)?;
        link.file_path = to.to_string();
        let batch = file_tag_to_batch(&link)?;
        file_tags
          .add(Box::new(RecordBatchIterator::new(
            vec![Ok(batch)],
            crate::db::schema::file_tags_schema(),
          )))
          .execute()
          .await?;
      }
    }
    file_tags.delete(&format!("file_path = '{}'", from_escaped)).await?;

    Ok(true)
  }

  /// Count of indexed files.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_files(&self) -> Result<usize> {
    let table = self.files_table().await?;
    Ok(table.count_rows(None).await?)
  }
}

/// Convert a FileRecord to an Arrow RecordBatch.
fn file_to_batch(file: &FileRecord) -> Result<RecordBatch> {
  let path = StringArray::from(vec![file.path.clone()]);
  let name = StringArray::from(vec![file.name.clone()]);
  let extension = StringArray::from(vec![file.extension.clone()]);
  let size_bytes = UInt64Array::from(vec![file.size_bytes]);
  let created_at = Int64Array::from(vec![file.created_at]);
  let modified_at = Int64Array::from(vec![file.modified_at]);
  let last_scanned_at = Int64Array::from(vec![file.last_scanned_at]);
  let content_hash = StringArray::from(vec![file.content_hash.clone()]);
  let content = StringArray::from(vec![file.content.clone()]);

  let batch = RecordBatch::try_new(
    files_schema(),
    vec![
      Arc::new(path),
      Arc::new(name),
      Arc::new(extension),
      Arc::new(size_bytes),
      Arc::new(created_at),
      Arc::new(modified_at),
      Arc::new(last_scanned_at),
      Arc::new(content_hash),
      Arc::new(content),
    ],
  )?;

  Ok(batch)
}

/// Convert a RecordBatch row to a FileRecord.
fn batch_to_file(batch: &RecordBatch, row: usize) -> Result<FileRecord> {
  let path = required_string(batch, "path", row)?;
  let name = required_string(batch, "name", row)?;
  let extension = required_string(batch, "extension", row)?;

  let size_bytes = batch
    .column_by_name("size_bytes")
    .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound("size_bytes column".to_string()))?;

  let created_at = required_i64(batch, "created_at", row)?;
  let modified_at = required_i64(batch, "modified_at", row)?;
  let last_scanned_at = required_i64(batch, "last_scanned_at", row)?;

  let content_hash = optional_string(batch, "content_hash", row);
  let content = optional_string(batch, "content", row);

  Ok(FileRecord {
    path,
    name,
    extension,
    size_bytes,
    created_at,
    modified_at,
    last_scanned_at,
    content_hash,
    content,
  })
}

pub(crate) fn required_string(batch: &RecordBatch, column: &str, row: usize) -> Result<String> {
  batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .map(|a| a.value(row).to_string())
    .ok_or_else(|| DbError::NotFound(format!("{column} column")))
}

pub(crate) fn required_i64(batch: &RecordBatch, column: &str, row: usize) -> Result<i64> {
  batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("{column} column")))
}

pub(crate) fn optional_string(batch: &RecordBatch, column: &str, row: usize) -> Option<String> {
  batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .and_then(|a| if a.is_null(row) { None } else { Some(a.value(row).to_string()) })
}
