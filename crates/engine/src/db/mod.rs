//! LanceDB-backed store for indexed files, embeddings, tags, rules, and
//! partners.
//!
//! One table per entity; tables are created on first open. All mutations go
//! through a single writer lock so the indexing loop and the control path
//! never interleave partial updates (upserts here are delete-then-add, which
//! is not atomic on its own).

mod embeddings;
mod files;
mod partners;
mod rules;
pub mod schema;
mod tags;

use std::path::PathBuf;

use lancedb::{Connection, connect};
use thiserror::Error;
use tracing::{debug, error, info};

pub use embeddings::EmbeddingRecord;
pub use files::FileRecord;
pub use partners::Partner;
pub use rules::{Rule, RuleAction, RuleCondition};
pub use tags::{FileTag, Tag};

use schema::{embeddings_schema, file_tags_schema, files_schema, partners_schema, rules_schema, tags_schema};

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Handle to the engine database.
pub struct EngineDb {
  pub connection: Connection,
  pub vector_dim: usize,
  /// Serializes delete-then-add upserts across the indexer and control path.
  write_lock: tokio::sync::Mutex<()>,
}

impl EngineDb {
  /// Open or create the database at the given path.
  pub async fn open_at_path(db_path: PathBuf, vector_dim: usize) -> Result<Self> {
    if let Some(parent) = db_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    info!(path = %db_path.display(), vector_dim, "Opening database connection");
    let connection = match connect(db_path.to_string_lossy().as_ref()).execute().await {
      Ok(conn) => {
        debug!(path = %db_path.display(), "Database connection established");
        conn
      }
      Err(e) => {
        error!(path = %db_path.display(), err = %e, "Failed to connect to database");
        return Err(e.into());
      }
    };

    let db = Self {
      connection,
      vector_dim,
      write_lock: tokio::sync::Mutex::new(()),
    };

    debug!("Initializing database schema");
    db.ensure_tables().await?;

    Ok(db)
  }

  /// Ensure all required tables exist.
  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;
    debug!(existing_tables = table_names.len(), "Checking required tables");

    if !table_names.contains(&"files".to_string()) {
      debug!("Creating files table");
      self
        .connection
        .create_empty_table("files", files_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"embeddings".to_string()) {
      debug!("Creating embeddings table");
      self
        .connection
        .create_empty_table("embeddings", embeddings_schema(self.vector_dim))
        .execute()
        .await?;
    }

    if !table_names.contains(&"tags".to_string()) {
      debug!("Creating tags table");
      self
        .connection
        .create_empty_table("tags", tags_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"file_tags".to_string()) {
      debug!("Creating file_tags table");
      self
        .connection
        .create_empty_table("file_tags", file_tags_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"rules".to_string()) {
      debug!("Creating rules table");
      self
        .connection
        .create_empty_table("rules", rules_schema())
        .execute()
        .await?;
    }

    if !table_names.contains(&"partners".to_string()) {
      debug!("Creating partners table");
      self
        .connection
        .create_empty_table("partners", partners_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  /// Acquire the writer lock for a compound mutation.
  pub(crate) async fn write_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
    self.write_lock.lock().await
  }

  pub async fn files_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("files").execute().await?)
  }

  pub async fn embeddings_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("embeddings").execute().await?)
  }

  pub async fn tags_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("tags").execute().await?)
  }

  pub async fn file_tags_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("file_tags").execute().await?)
  }

  pub async fn rules_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("rules").execute().await?)
  }

  pub async fn partners_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table("partners").execute().await?)
  }
}

/// Escape single quotes in SQL strings.
pub(crate) fn escape_sql(s: &str) -> String {
  s.replace('\'', "''")
}
