//! Client-side engine lifecycle management.
//!
//! Starts the engine when it is not running and stops it on request. Only a
//! process spawned by this handle is ever killed; an engine started by
//! someone else is asked to shut down over the socket and otherwise left
//! alone.

use std::{
  path::PathBuf,
  process::{Child, Command, Stdio},
  sync::Mutex,
  time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
  client::EngineClient,
  dirs::{default_socket_path, is_engine_running_at},
};

/// Environment variable overriding engine binary discovery.
pub const ENGINE_PATH_ENV: &str = "VANTUS_ENGINE_PATH";

const STARTUP_POLL_DELAY: Duration = Duration::from_millis(500);
const STARTUP_MAX_ATTEMPTS: u32 = 10;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Engine did not come up within {0:?}")]
  StartTimeout(Duration),
}

/// Handle for starting and stopping the engine process.
pub struct EngineLifecycle {
  socket_path: PathBuf,
  /// Child we spawned ourselves; None for foreign engine instances.
  child: Mutex<Option<Child>>,
}

impl EngineLifecycle {
  pub fn new(socket_path: PathBuf) -> Self {
    Self {
      socket_path,
      child: Mutex::new(None),
    }
  }

  pub fn is_running(&self) -> bool {
    is_engine_running_at(&self.socket_path)
  }

  /// Start the engine in the background unless one is already serving the
  /// socket, then wait for the socket to come up.
  pub async fn ensure_running(&self) -> Result<(), LifecycleError> {
    if self.is_running() {
      debug!("Engine already running");
      return Ok(());
    }

    let binary = locate_engine_binary()?;
    info!(binary = %binary.display(), "Starting engine");

    let child = Command::new(&binary)
      .arg("daemon")
      .arg("--background")
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()?;
    debug!(pid = child.id(), "Spawned engine process");

    {
      let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
      *guard = Some(child);
    }

    for attempt in 0..STARTUP_MAX_ATTEMPTS {
      tokio::time::sleep(STARTUP_POLL_DELAY).await;
      if self.is_running() {
        info!("Engine is up");
        return Ok(());
      }
      debug!(attempt, "Waiting for engine socket");
    }

    Err(LifecycleError::StartTimeout(STARTUP_POLL_DELAY * STARTUP_MAX_ATTEMPTS))
  }

  /// Ask the engine to shut down. A child we spawned that outlives the
  /// shutdown grace period is force-killed; foreign engines are not.
  pub async fn stop(&self) -> Result<(), LifecycleError> {
    if self.is_running() {
      let client = EngineClient::new(self.socket_path.clone());
      match tokio::time::timeout(SHUTDOWN_TIMEOUT, client.shutdown()).await {
        Ok(true) => info!("Engine acknowledged shutdown"),
        Ok(false) => warn!("Engine did not acknowledge shutdown"),
        Err(_) => warn!("Shutdown request timed out"),
      }
    }

    let child = {
      let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
      guard.take()
    };

    if let Some(mut child) = child {
      tokio::time::sleep(Duration::from_millis(200)).await;
      match child.try_wait()? {
        Some(status) => debug!(?status, "Engine process exited"),
        None => {
          warn!(pid = child.id(), "Engine still alive after shutdown, killing");
          child.kill()?;
          let _ = child.wait();
        }
      }
    }

    Ok(())
  }
}

impl Default for EngineLifecycle {
  fn default() -> Self {
    Self::new(default_socket_path())
  }
}

/// Find the engine binary to spawn.
///
/// Probes, in order: the `VANTUS_ENGINE_PATH` override, a `vantus` binary
/// next to the current executable, dev target directories relative to the
/// working directory. Falls back to re-executing the current binary, which
/// is the common case since the engine and the CLI share one executable.
pub fn locate_engine_binary() -> Result<PathBuf, std::io::Error> {
  if let Ok(explicit) = std::env::var(ENGINE_PATH_ENV) {
    let path = PathBuf::from(explicit);
    if path.is_file() {
      return Ok(path);
    }
    warn!(path = %path.display(), "{ENGINE_PATH_ENV} does not point at a file, ignoring");
  }

  let current = std::env::current_exe()?;

  let mut candidates = Vec::new();
  if let Some(dir) = current.parent() {
    candidates.push(dir.join("vantus"));
  }
  candidates.push(PathBuf::from("target/debug/vantus"));
  candidates.push(PathBuf::from("target/release/vantus"));

  for candidate in candidates {
    if candidate.is_file() {
      return Ok(candidate);
    }
  }

  Ok(current)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_locate_engine_binary_always_resolves() {
    // Without the override the current executable is a valid fallback
    let path = locate_engine_binary().unwrap();
    assert!(path.is_file());
  }

  #[tokio::test]
  async fn test_stop_without_engine_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let lifecycle = EngineLifecycle::new(dir.path().join("nobody-home.sock"));
    assert!(!lifecycle.is_running());
    lifecycle.stop().await.unwrap();
  }
}
