//! Arrow schemas for the engine tables.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for the files table. `path` is the unique key; timestamps are
/// Unix milliseconds.
pub fn files_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("path", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("extension", DataType::Utf8, false),
    Field::new("size_bytes", DataType::UInt64, false),
    Field::new("created_at", DataType::Int64, false),
    Field::new("modified_at", DataType::Int64, false),
    Field::new("last_scanned_at", DataType::Int64, false),
    Field::new("content_hash", DataType::Utf8, true), // SHA-256 of raw bytes
    Field::new("content", DataType::Utf8, true),      // extracted text
  ]))
}

/// Schema for the embeddings table. At most one row per file.
pub fn embeddings_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("file_path", DataType::Utf8, false),
    Field::new("model", DataType::Utf8, false),
    Field::new("created_at", DataType::Int64, false),
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      false,
    ),
  ]))
}

/// Schema for the tags table. `name` is unique.
pub fn tags_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("source", DataType::Utf8, false), // "user" or "auto"
  ]))
}

/// Schema for the file_tags junction table.
pub fn file_tags_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("file_path", DataType::Utf8, false),
    Field::new("tag_id", DataType::Utf8, false),
    Field::new("confidence", DataType::Float32, false),
  ]))
}

/// Schema for the rules table. Conditions and actions are ordered JSON
/// arrays.
pub fn rules_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("conditions", DataType::Utf8, false), // JSON array
    Field::new("actions", DataType::Utf8, false),    // JSON array
    Field::new("match_any", DataType::Boolean, false),
    Field::new("enabled", DataType::Boolean, false),
  ]))
}

/// Schema for the partners table.
pub fn partners_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("domains", DataType::Utf8, true),
    Field::new("keywords", DataType::Utf8, true),
  ]))
}
