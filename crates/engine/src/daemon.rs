//! Engine process lifecycle.
//!
//! The engine is the long-lived background process. It wires the watch
//! manager, the change event queue, the indexer, the store, and the control
//! server together and supervises them until shutdown.
//!
//! # Architecture
//!
//! ```text
//! Engine (Supervisor)
//!   ├── ControlServer (socket listener, spawns connection tasks)
//!   ├── Indexer (single consumer of the change event queue)
//!   └── WatchManager
//!         └── notify watcher + forwarder task, one per root
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Build embedding provider, store, extractors, queue
//! 3. Start monitoring configured roots and enqueue initial scans
//! 4. Spawn the indexer, run the control server until cancelled
//! 5. Graceful shutdown: cancel children, await the indexer, stop watchers

use std::{path::PathBuf, sync::Arc};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
  config::Config,
  db::EngineDb,
  dirs,
  embedding::EmbeddingProvider,
  extract::ExtractorSet,
  indexer::{EngineStatus, Indexer},
  scan,
  search::SearchService,
  server::{ControlServer, ServerConfig},
  watch::{EventQueue, WatchManager},
};

// ============================================================================
// Configuration
// ============================================================================

/// Engine runtime configuration, resolved from the config file plus
/// environment-driven paths.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Path to the Unix control socket
  pub socket_path: PathBuf,
  /// Base directory for the database
  pub data_dir: PathBuf,
  /// Run attached to the terminal
  pub foreground: bool,
  /// Full configuration (embedding, index, watch, daemon)
  pub config: Config,
}

impl RuntimeConfig {
  pub async fn load() -> Self {
    // Auto-create the user config on first run
    Self::ensure_user_config().await;

    Self {
      socket_path: dirs::default_socket_path(),
      data_dir: dirs::default_data_dir(),
      foreground: false,
      config: Config::load(),
    }
  }

  /// Write a commented default config file if none exists yet.
  async fn ensure_user_config() {
    let user_config_path = Config::user_config_path();
    if user_config_path.exists() {
      return;
    }

    if let Some(parent) = user_config_path.parent()
      && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
      warn!("Failed to create config directory: {}", e);
      return;
    }

    match tokio::fs::write(&user_config_path, Config::generate_template()).await {
      Ok(()) => info!("Created user config: {:?}", user_config_path),
      Err(e) => warn!("Failed to create user config: {}", e),
    }
  }
}

// ============================================================================
// Engine
// ============================================================================

/// The engine supervisor.
pub struct Engine {
  runtime_config: RuntimeConfig,
}

impl Engine {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self { runtime_config }
  }

  pub async fn with_defaults() -> Self {
    Self::new(RuntimeConfig::load().await)
  }

  /// Run the engine in foreground mode, blocking until shutdown.
  pub async fn spawn_foreground() -> std::io::Result<()> {
    let config = RuntimeConfig {
      foreground: true,
      ..RuntimeConfig::load().await
    };

    Engine::new(config).run().await;
    Ok(())
  }

  /// Spawn a detached engine process and return its PID.
  ///
  /// Re-executes the current binary with `daemon --background` so the child
  /// gets a clean process with its own Tokio runtime.
  pub async fn spawn_background() -> std::io::Result<i32> {
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;

    let child = Command::new(&exe)
      .arg("daemon")
      .arg("--background")
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()?;

    let pid = child.id() as i32;
    info!("Spawned engine process with PID {}", pid);

    Ok(pid)
  }

  /// Run the engine directly in this process (background mode).
  ///
  /// Called when the process was spawned with `--background`.
  pub async fn run_background() {
    Engine::with_defaults().await.run().await;
  }

  /// Run the engine until shutdown.
  pub async fn run(self) {
    info!("Starting Vantus engine");
    info!("Socket: {:?}", self.runtime_config.socket_path);
    info!("Data dir: {:?}", self.runtime_config.data_dir);

    // Master cancellation token, propagates to all children
    let cancel = CancellationToken::new();

    let embedding = match <dyn EmbeddingProvider>::from_config(&self.runtime_config.config.embedding) {
      Ok(provider) => provider,
      Err(e) => {
        error!(err = %e, "Failed to create embedding provider, aborting startup");
        return;
      }
    };
    info!(
      "Embedding provider: {} ({}, {} dims)",
      embedding.name(),
      embedding.model_id(),
      embedding.dimensions()
    );

    let db_path = self.runtime_config.data_dir.join("lancedb");
    let db = match EngineDb::open_at_path(db_path, embedding.dimensions()).await {
      Ok(db) => Arc::new(db),
      Err(e) => {
        error!(err = %e, "Failed to open database, aborting startup");
        return;
      }
    };

    let extractors = Arc::new(ExtractorSet::with_defaults());
    let status = EngineStatus::new();
    let (queue, events) = EventQueue::channel();
    let watcher = Arc::new(WatchManager::new(queue.clone()));

    // Monitor configured roots and reconcile them with an initial scan
    for root in &self.runtime_config.config.watch.roots {
      if let Err(e) = watcher.start_monitoring(root) {
        warn!(root = %root.display(), err = %e, "Skipping configured root");
        continue;
      }
      let root = root.clone();
      let scan_queue = queue.clone();
      tokio::task::spawn_blocking(move || scan::enqueue_root(&root, &scan_queue));
    }

    let indexer = Indexer::new(
      Arc::clone(&db),
      extractors,
      Arc::clone(&embedding),
      Arc::clone(&status),
      self.runtime_config.config.index.max_file_size,
    );
    let indexer_handle = indexer.spawn(events, cancel.child_token());

    let server = ControlServer::new(ServerConfig {
      socket_path: self.runtime_config.socket_path.clone(),
      search: Arc::new(SearchService::new(Arc::clone(&db), Arc::clone(&embedding))),
      db,
      status,
      watcher: Arc::clone(&watcher),
      queue,
      shutdown: cancel.clone(),
    });

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    // Run the control server until cancelled
    if let Err(e) = server.run(cancel.child_token()).await {
      warn!("Control server error: {}", e);
    }

    info!("Shutting down...");
    cancel.cancel();
    watcher.stop_all();

    if let Err(e) = indexer_handle.await {
      warn!("Indexer task did not exit cleanly: {}", e);
    }

    info!("Engine shutdown complete");
  }
}
