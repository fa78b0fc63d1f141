//! Tag and file-tag operations.

use std::sync::Arc;

use arrow_array::{Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
  DbError, EngineDb, Result, escape_sql,
  files::required_string,
  schema::{file_tags_schema, tags_schema},
};

/// A user- or engine-assigned label. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
  #[serde(default)]
  pub id: String,
  pub name: String,
  #[serde(default = "default_tag_source")]
  pub source: String,
}

fn default_tag_source() -> String {
  "user".to_string()
}

/// Junction row linking a file to a tag with an assignment confidence.
#[derive(Debug, Clone)]
pub struct FileTag {
  pub file_path: String,
  pub tag_id: String,
  pub confidence: f32,
}

impl EngineDb {
  /// Add a tag. Adding a name that already exists is a no-op, so repeated
  /// requests land exactly one row.
  #[tracing::instrument(level = "trace", skip(self, tag), fields(name = %tag.name))]
  pub async fn add_tag(&self, tag: &Tag) -> Result<Tag> {
    let _guard = self.write_guard().await;

    if let Some(existing) = self.get_tag_by_name(&tag.name).await? {
      return Ok(existing);
    }

    let stored = Tag {
      id: if tag.id.is_empty() {
        Uuid::new_v4().to_string()
      } else {
        tag.id.clone()
      },
      name: tag.name.clone(),
      source: if tag.source.is_empty() {
        default_tag_source()
      } else {
        tag.source.clone()
      },
    };

    let table = self.tags_table().await?;
    let batch = RecordBatch::try_new(
      tags_schema(),
      vec![
        Arc::new(StringArray::from(vec![stored.id.clone()])),
        Arc::new(StringArray::from(vec![stored.name.clone()])),
        Arc::new(StringArray::from(vec![stored.source.clone()])),
      ],
    )?;
    table
      .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], tags_schema())))
      .execute()
      .await?;

    Ok(stored)
  }

  /// Look up a tag by its unique name.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
    let table = self.tags_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("name = '{}'", escape_sql(name)))
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

    Ok(Some(batch_to_tag(batch, 0)?))
  }

  /// List all tags.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_tags(&self) -> Result<Vec<Tag>> {
    let table = self.tags_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut tags = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        tags.push(batch_to_tag(&batch, i)?);
      }
    }

    Ok(tags)
  }

  /// Delete a tag by name, cascading to its file links. Unknown names are a
  /// no-op.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn delete_tag(&self, name: &str) -> Result<()> {
    let Some(tag) = self.get_tag_by_name(name).await? else {
      return Ok(());
    };

    let _guard = self.write_guard().await;

    let table = self.tags_table().await?;
    table.delete(&format!("name = '{}'", escape_sql(name))).await?;

    let file_tags = self.file_tags_table().await?;
    file_tags.delete(&format!("tag_id = '{}'", escape_sql(&tag.id))).await?;

    Ok(())
  }

  /// Link a file to a tag, replacing any existing link for the pair.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn tag_file(&self, file_path: &str, tag_id: &str, confidence: f32) -> Result<()> {
    let _guard = self.write_guard().await;
    let table = self.file_tags_table().await?;

    let _ = table
      .delete(&format!(
        "file_path = '{}' AND tag_id = '{}'",
        escape_sql(file_path),
        escape_sql(tag_id)
      ))
      .await;

    let link = FileTag {
      file_path: file_path.to_string(),
      tag_id: tag_id.to_string(),
      confidence: confidence.clamp(0.0, 1.0),
    };
    let batch = file_tag_to_batch(&link)?;
    table
      .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], file_tags_schema())))
      .execute()
      .await?;

    Ok(())
  }

  /// List the tag links for one file.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_file_tags(&self, file_path: &str) -> Result<Vec<FileTag>> {
    let table = self.file_tags_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_path = '{}'", escape_sql(file_path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut links = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        links.push(batch_to_file_tag(&batch, i)?);
      }
    }

    Ok(links)
  }

  /// Count of tags.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_tags(&self) -> Result<usize> {
    let table = self.tags_table().await?;
    Ok(table.count_rows(None).await?)
  }
}

fn batch_to_tag(batch: &RecordBatch, row: usize) -> Result<Tag> {
  Ok(Tag {
    id: required_string(batch, "id", row)?,
    name: required_string(batch, "name", row)?,
    source: required_string(batch, "source", row)?,
  })
}

/// Convert a FileTag to an Arrow RecordBatch.
pub(crate) fn file_tag_to_batch(link: &FileTag) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    file_tags_schema(),
    vec![
      Arc::new(StringArray::from(vec![link.file_path.clone()])),
      Arc::new(StringArray::from(vec![link.tag_id.clone()])),
      Arc::new(Float32Array::from(vec![link.confidence])),
    ],
  )?;
  Ok(batch)
}

/// Convert a RecordBatch row to a FileTag.
pub(crate) fn batch_to_file_tag(batch: &RecordBatch, row: usize) -> Result<FileTag> {
  let confidence = batch
    .column_by_name("confidence")
    .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound("confidence column".to_string()))?;

  Ok(FileTag {
    file_path: required_string(batch, "file_path", row)?,
    tag_id: required_string(batch, "tag_id", row)?,
    confidence,
  })
}
