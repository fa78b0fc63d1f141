//! Control socket server.
//!
//! The server accepts connections on a Unix socket and answers the
//! line-oriented control protocol. Each connection carries exactly one
//! request line and one response line; the stream is closed afterwards.
//!
//! # Lifecycle
//!
//! 1. `ControlServer::new()` creates the server with all dependencies
//! 2. `ControlServer::run()` binds the socket and accepts connections
//! 3. Each connection spawns a `handle_connection` task
//! 4. On cancellation, the socket file is removed and the loop exits
//!
//! # Threading Model
//!
//! - The accept loop runs on the calling task
//! - Each connection runs in its own spawned task
//! - All tasks share the store, search service, and watch manager via `Arc`

use std::{path::PathBuf, sync::Arc};

use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::{
  codec::{Framed, LinesCodec},
  sync::CancellationToken,
};
use tracing::{debug, error, info, warn};

use crate::{
  db::EngineDb,
  indexer::EngineStatus,
  protocol::{Command, IndexStats, OK},
  scan,
  search::SearchService,
  watch::{EventQueue, WatchManager},
};

/// Result count for SEARCH requests; the protocol carries no limit field.
const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Codec error: {0}")]
  Codec(#[from] tokio_util::codec::LinesCodecError),
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Everything the server needs, provided upfront. No two-phase
/// initialization and no `set_*` methods.
pub struct ServerConfig {
  /// Path to the Unix control socket
  pub socket_path: PathBuf,

  /// Backing store, shared with the indexer
  pub db: Arc<EngineDb>,

  /// Search service for SEARCH requests
  pub search: Arc<SearchService>,

  /// Shared status driving STATUS and PAUSE/RESUME
  pub status: Arc<EngineStatus>,

  /// Watch manager for REINDEX and REBUILD
  pub watcher: Arc<WatchManager>,

  /// Change event queue; REBUILD and REINDEX scans feed it
  pub queue: EventQueue,

  /// Master token; SHUTDOWN cancels it
  pub shutdown: CancellationToken,
}

// ============================================================================
// Server
// ============================================================================

pub struct ControlServer {
  config: Arc<ServerConfig>,
}

impl ControlServer {
  pub fn new(config: ServerConfig) -> Self {
    Self {
      config: Arc::new(config),
    }
  }

  /// Run the server until the cancellation token is triggered.
  ///
  /// Removes any stale socket file, creates the parent directory if needed,
  /// then accepts connections until cancelled. Accept errors are logged and
  /// the loop continues.
  pub async fn run(&self, cancel: CancellationToken) -> Result<(), IpcError> {
    if self.config.socket_path.exists() {
      tokio::fs::remove_file(&self.config.socket_path).await?;
    }

    if let Some(parent) = self.config.socket_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    let listener = UnixListener::bind(&self.config.socket_path)?;
    info!("Control server listening on {:?}", self.config.socket_path);

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          info!("Control server shutting down (cancelled)");
          break;
        }

        result = listener.accept() => {
          match result {
            Ok((stream, _)) => {
              tokio::spawn(handle_connection(stream, Arc::clone(&self.config)));
            }
            Err(e) => {
              error!("Accept error: {}", e);
            }
          }
        }
      }
    }

    // Cleanup socket file
    if self.config.socket_path.exists() {
      tokio::fs::remove_file(&self.config.socket_path).await?;
    }

    Ok(())
  }
}

// ============================================================================
// Connection Handler
// ============================================================================

/// Handle a single client connection: one request line, one response line.
///
/// Parse errors answer `ERR <msg>`; handler errors answer `ERR <msg>` for
/// mutations and empty collections for reads. IO errors close the
/// connection. Nothing here touches the accept loop.
async fn handle_connection(stream: UnixStream, config: Arc<ServerConfig>) -> Result<(), IpcError> {
  debug!("Client connected");
  let framed = Framed::new(stream, LinesCodec::new());
  let (mut sink, mut stream) = framed.split();

  let Some(result) = stream.next().await else {
    debug!("Client disconnected without a request");
    return Ok(());
  };

  let line = match result {
    Ok(l) => l,
    Err(e) => {
      warn!(err = %e, "Error reading from client");
      return Ok(());
    }
  };

  let command = match Command::parse(&line) {
    Ok(c) => c,
    Err(e) => {
      warn!(err = %e, "Rejected malformed request");
      sink.send(format!("ERR {e}")).await?;
      return Ok(());
    }
  };

  let shutdown_after = matches!(command, Command::Shutdown);
  let response = dispatch(command, &config).await;
  sink.send(response).await?;

  if shutdown_after {
    info!("Shutdown requested over control socket");
    config.shutdown.cancel();
  }

  debug!("Client disconnected");
  Ok(())
}

/// Produce the single response line for a parsed command.
async fn dispatch(command: Command, config: &ServerConfig) -> String {
  match command {
    Command::Status => config.status.label().to_string(),

    Command::GetStats => match stats(config).await {
      Ok(json) => json,
      Err(e) => {
        warn!(err = %e, "Failed to gather stats");
        format!("ERR {e}")
      }
    },

    Command::Search { query } => match config.search.search(&query, DEFAULT_SEARCH_LIMIT).await {
      Ok(results) => json_array(&results),
      Err(e) => {
        // Degraded search answers an empty result set, never an error
        warn!(err = %e, "Search failed");
        "[]".to_string()
      }
    },

    Command::GetTags => match config.db.list_tags().await {
      Ok(tags) => json_array(&tags),
      Err(e) => {
        warn!(err = %e, "Failed to list tags");
        "[]".to_string()
      }
    },

    Command::AddTag(tag) => match config.db.add_tag(&tag).await {
      Ok(_) => OK.to_string(),
      Err(e) => {
        warn!(name = %tag.name, err = %e, "Failed to add tag");
        format!("ERR {e}")
      }
    },

    Command::DeleteTag { name } => match config.db.delete_tag(&name).await {
      Ok(()) => OK.to_string(),
      Err(e) => {
        warn!(name, err = %e, "Failed to delete tag");
        format!("ERR {e}")
      }
    },

    Command::GetPartners => match config.db.list_partners().await {
      Ok(partners) => json_array(&partners),
      Err(e) => {
        warn!(err = %e, "Failed to list partners");
        "[]".to_string()
      }
    },

    Command::AddPartner(partner) => match config.db.add_partner(&partner).await {
      Ok(()) => OK.to_string(),
      Err(e) => {
        warn!(name = %partner.name, err = %e, "Failed to add partner");
        format!("ERR {e}")
      }
    },

    Command::GetRules => match config.db.list_rules().await {
      Ok(rules) => json_array(&rules),
      Err(e) => {
        warn!(err = %e, "Failed to list rules");
        "[]".to_string()
      }
    },

    Command::AddRule(rule) => match config.db.add_rule(&rule).await {
      Ok(_) => OK.to_string(),
      Err(e) => {
        warn!(name = %rule.name, err = %e, "Failed to add rule");
        format!("ERR {e}")
      }
    },

    Command::DeleteRule { id } => match config.db.delete_rule(&id).await {
      Ok(()) => OK.to_string(),
      Err(e) => {
        warn!(id, err = %e, "Failed to delete rule");
        format!("ERR {e}")
      }
    },

    Command::Pause => {
      config.status.pause();
      info!("Indexing paused");
      OK.to_string()
    }

    Command::Resume => {
      config.status.resume();
      info!("Indexing resumed");
      OK.to_string()
    }

    Command::Rebuild => {
      let roots = config.watcher.watched_roots();
      info!(roots = roots.len(), "Rebuild requested, re-scanning all roots");
      for root in roots {
        let queue = config.queue.clone();
        tokio::task::spawn_blocking(move || scan::enqueue_root(&root, &queue));
      }
      OK.to_string()
    }

    Command::Reindex { path } => {
      let path = PathBuf::from(path);
      // Plain files are a monitoring no-op but still get scanned below
      if let Err(e) = config.watcher.start_monitoring(&path) {
        warn!(path = %path.display(), err = %e, "Could not monitor reindex path");
      }
      let queue = config.queue.clone();
      tokio::task::spawn_blocking(move || scan::enqueue_root(&path, &queue));
      OK.to_string()
    }

    // The response is sent before cancellation, in handle_connection
    Command::Shutdown => OK.to_string(),

    Command::Unknown(line) => {
      debug!(line, "Unknown command, answering OK");
      OK.to_string()
    }
  }
}

async fn stats(config: &ServerConfig) -> Result<String, crate::db::DbError> {
  let stats = IndexStats {
    files_indexed: config.db.count_files().await?,
    total_tags: config.db.count_tags().await?,
    total_partners: config.db.count_partners().await?,
    queue_length: config.queue.len(),
    last_error: config.status.last_error(),
    status: config.status.label().to_string(),
  };
  // IndexStats carries no non-serializable fields
  Ok(serde_json::to_string(&stats).unwrap_or_else(|_| "{}".to_string()))
}

/// Serialize a slice to a JSON array, degrading to `[]` on failure.
fn json_array<T: serde::Serialize>(items: &[T]) -> String {
  serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::EmbeddingConfig,
    db::Tag,
    embedding::{EmbeddingProvider, HashProvider},
  };

  async fn test_config(dir: &std::path::Path) -> ServerConfig {
    let db = Arc::new(EngineDb::open_at_path(dir.join("lancedb"), 8).await.unwrap());
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(&EmbeddingConfig {
      dimensions: 8,
      ..Default::default()
    }));
    let (queue, _rx) = EventQueue::channel();
    ServerConfig {
      socket_path: dir.join("control.sock"),
      search: Arc::new(SearchService::new(Arc::clone(&db), provider)),
      db,
      status: EngineStatus::new(),
      watcher: Arc::new(WatchManager::new(queue.clone())),
      queue,
      shutdown: CancellationToken::new(),
    }
  }

  #[tokio::test]
  async fn test_dispatch_status_idle() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    assert_eq!(dispatch(Command::Status, &config).await, "Idle");
  }

  #[tokio::test]
  async fn test_dispatch_pause_changes_status() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;

    assert_eq!(dispatch(Command::Pause, &config).await, "OK");
    assert_eq!(dispatch(Command::Status, &config).await, "Paused");
    assert_eq!(dispatch(Command::Resume, &config).await, "OK");
    assert_eq!(dispatch(Command::Status, &config).await, "Idle");
  }

  #[tokio::test]
  async fn test_dispatch_unknown_answers_ok() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    let command = Command::parse("NO_SUCH_VERB at all").unwrap();
    assert_eq!(dispatch(command, &config).await, "OK");
  }

  #[tokio::test]
  async fn test_dispatch_search_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    let response = dispatch(
      Command::Search {
        query: "anything".to_string(),
      },
      &config,
    )
    .await;
    assert_eq!(response, "[]");
  }

  #[tokio::test]
  async fn test_dispatch_add_tag_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;

    let add = Command::AddTag(Tag {
      id: String::new(),
      name: "Work".to_string(),
      source: "user".to_string(),
    });
    assert_eq!(dispatch(add, &config).await, "OK");

    let listed = dispatch(Command::GetTags, &config).await;
    let tags: Vec<Tag> = serde_json::from_str(&listed).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "Work");
  }

  #[tokio::test]
  async fn test_dispatch_stats_shape() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;

    let response = dispatch(Command::GetStats, &config).await;
    let stats: IndexStats = serde_json::from_str(&response).unwrap();
    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.status, "Idle");
  }
}
