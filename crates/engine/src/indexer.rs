//! The indexer.
//!
//! A single consumer loop drains the change event queue and applies each
//! event to the store. Every handler is idempotent: replaying an event, or
//! seeing the same change twice from a scan plus a watcher, converges on the
//! same rows. Failures are caught per event and logged; nothing here is
//! allowed to kill the loop.

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  db::{DbError, EmbeddingRecord, EngineDb, FileRecord},
  embedding::{EmbeddingError, EmbeddingProvider},
  extract::{ExtractError, ExtractorSet},
  watch::{ChangeEvent, ChangeKind, EventReceiver},
};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("Database error: {0}")]
  Db(#[from] DbError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Extraction error: {0}")]
  Extract(#[from] ExtractError),
  #[error("Embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
}

// ============================================================================
// Shared Status
// ============================================================================

/// Status shared between the indexer and the control endpoint.
///
/// Drives the STATUS verb ("Paused" wins over "Indexing" wins over "Idle")
/// and the pause gate the indexer blocks on between events.
pub struct EngineStatus {
  paused_tx: watch::Sender<bool>,
  busy: AtomicBool,
  last_error: std::sync::Mutex<Option<String>>,
}

impl EngineStatus {
  pub fn new() -> Arc<Self> {
    let (paused_tx, _) = watch::channel(false);
    Arc::new(Self {
      paused_tx,
      busy: AtomicBool::new(false),
      last_error: std::sync::Mutex::new(None),
    })
  }

  pub fn pause(&self) {
    let _ = self.paused_tx.send(true);
  }

  pub fn resume(&self) {
    let _ = self.paused_tx.send(false);
  }

  pub fn is_paused(&self) -> bool {
    *self.paused_tx.borrow()
  }

  pub(crate) fn subscribe_paused(&self) -> watch::Receiver<bool> {
    self.paused_tx.subscribe()
  }

  pub(crate) fn set_busy(&self, busy: bool) {
    self.busy.store(busy, Ordering::Relaxed);
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Relaxed)
  }

  pub(crate) fn record_error(&self, message: String) {
    let mut guard = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(message);
  }

  pub fn last_error(&self) -> Option<String> {
    let guard = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
    guard.clone()
  }

  /// Human-readable status label for the control protocol.
  pub fn label(&self) -> &'static str {
    if self.is_paused() {
      "Paused"
    } else if self.is_busy() {
      "Indexing"
    } else {
      "Idle"
    }
  }
}

// ============================================================================
// Indexer
// ============================================================================

pub struct Indexer {
  db: Arc<EngineDb>,
  extractors: Arc<ExtractorSet>,
  embedding: Arc<dyn EmbeddingProvider>,
  status: Arc<EngineStatus>,
  /// Files larger than this are indexed by metadata only.
  max_file_size: u64,
}

impl Indexer {
  pub fn new(
    db: Arc<EngineDb>,
    extractors: Arc<ExtractorSet>,
    embedding: Arc<dyn EmbeddingProvider>,
    status: Arc<EngineStatus>,
    max_file_size: u64,
  ) -> Self {
    Self {
      db,
      extractors,
      embedding,
      status,
      max_file_size,
    }
  }

  /// Spawn the consumer loop.
  pub fn spawn(self, events: EventReceiver, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(self.run(events, cancel))
  }

  /// Run the consumer loop until cancellation or queue closure.
  pub async fn run(self, mut events: EventReceiver, cancel: CancellationToken) {
    info!("Indexer started");

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          info!("Indexer shutting down (cancelled)");
          break;
        }

        event = events.recv() => {
          let Some(event) = event else {
            info!("Indexer shutting down (queue closed)");
            break;
          };

          // Pause gate: hold between events, never mid-event
          if self.status.is_paused() {
            let mut paused_rx = self.status.subscribe_paused();
            tokio::select! {
              biased;
              _ = cancel.cancelled() => break,
              _ = paused_rx.wait_for(|paused| !*paused) => {}
            }
          }

          self.status.set_busy(true);
          if let Err(e) = self.handle_event(&event).await {
            warn!(path = %event.path.display(), err = %e, "Failed to process change event");
            self.status.record_error(e.to_string());
          }
          self.status.set_busy(false);
        }
      }
    }

    info!("Indexer stopped");
  }

  /// Apply one change event to the store.
  pub async fn handle_event(&self, event: &ChangeEvent) -> Result<(), IndexError> {
    match &event.kind {
      ChangeKind::Created | ChangeKind::Modified => self.index_file(&event.path).await,
      ChangeKind::Deleted => {
        debug!(path = %event.path.display(), "Removing file from index");
        self.db.delete_file(&event.path.to_string_lossy()).await?;
        Ok(())
      }
      ChangeKind::Renamed { from } => {
        let from_str = from.to_string_lossy();
        let to_str = event.path.to_string_lossy();
        let moved = self.db.rename_file(&from_str, &to_str).await?;
        if moved {
          debug!(from = %from.display(), to = %event.path.display(), "File renamed in index");
          Ok(())
        } else {
          // The old path was never indexed; treat the new path as fresh
          debug!(to = %event.path.display(), "Rename source unknown, indexing fresh");
          self.index_file(&event.path).await
        }
      }
    }
  }

  /// Index one file: upsert metadata, extract text, embed non-empty content.
  async fn index_file(&self, path: &Path) -> Result<(), IndexError> {
    let metadata = match tokio::fs::metadata(path).await {
      Ok(m) => m,
      Err(_) => {
        // Deleted between the event and now; the delete event will follow
        debug!(path = %path.display(), "File vanished before indexing, skipping");
        return Ok(());
      }
    };
    if !metadata.is_file() {
      return Ok(());
    }

    let path_str = path.to_string_lossy().to_string();
    let now = Utc::now().timestamp_millis();

    let oversized = metadata.len() > self.max_file_size;
    let content_hash = if oversized {
      None
    } else {
      match tokio::fs::read(path).await {
        Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
        Err(e) => {
          warn!(path = %path.display(), err = %e, "Failed to read file for hashing");
          None
        }
      }
    };

    // Extraction failure downgrades to metadata-only, never aborts the upsert
    let content = if oversized {
      debug!(path = %path.display(), size = metadata.len(), "File too large, indexing metadata only");
      String::new()
    } else {
      match self.extractors.extract(path).await {
        Ok(text) => text,
        Err(e) => {
          warn!(path = %path.display(), err = %e, "Content extraction failed");
          self.status.record_error(e.to_string());
          String::new()
        }
      }
    };

    let file = FileRecord {
      path: path_str.clone(),
      name: path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default(),
      extension: path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default(),
      size_bytes: metadata.len(),
      created_at: timestamp_ms(metadata.created().ok(), now),
      modified_at: timestamp_ms(metadata.modified().ok(), now),
      last_scanned_at: now,
      content_hash,
      content: if content.is_empty() { None } else { Some(content.clone()) },
    };

    self.db.upsert_file(&file).await?;
    debug!(path = %path.display(), size = file.size_bytes, "File row upserted");

    if content.trim().is_empty() {
      return Ok(());
    }

    // Embedding failure leaves the file metadata-searchable
    match self.embedding.embed(&content).await {
      Ok(vector) => {
        self
          .db
          .upsert_embedding(&EmbeddingRecord {
            file_path: path_str,
            model: self.embedding.model_id().to_string(),
            created_at: now,
            vector,
          })
          .await?;
        debug!(path = %path.display(), "Embedding upserted");
      }
      Err(e) => {
        warn!(path = %path.display(), err = %e, "Embedding failed, file is metadata-only");
        self.status.record_error(e.to_string());
      }
    }

    Ok(())
  }
}

fn timestamp_ms(time: Option<std::time::SystemTime>, fallback: i64) -> i64 {
  time
    .map(|t| chrono::DateTime::<Utc>::from(t).timestamp_millis())
    .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_label_precedence() {
    let status = EngineStatus::new();
    assert_eq!(status.label(), "Idle");

    status.set_busy(true);
    assert_eq!(status.label(), "Indexing");

    status.pause();
    assert_eq!(status.label(), "Paused", "Paused wins over Indexing");

    status.resume();
    status.set_busy(false);
    assert_eq!(status.label(), "Idle");
  }

  #[test]
  fn test_status_records_last_error() {
    let status = EngineStatus::new();
    assert!(status.last_error().is_none());
    status.record_error("boom".to_string());
    assert_eq!(status.last_error().as_deref(), Some("boom"));
  }
}
