//! Daemon command

use anyhow::Result;
use tracing::info;
use vantus_engine::daemon::Engine;

/// Start the engine.
///
/// Default mode spawns a detached background process and returns. The
/// `--foreground` flag runs the engine attached to the terminal; the hidden
/// `--background` flag is what the detached child itself runs.
pub async fn cmd_daemon(foreground: bool, background: bool) -> Result<()> {
  if background {
    Engine::run_background().await;
    return Ok(());
  }

  if foreground {
    info!("Starting engine in foreground, ctrl-c to stop");
    Engine::spawn_foreground().await?;
    return Ok(());
  }

  let pid = Engine::spawn_background().await?;
  println!("Engine started in background (PID {pid})");
  Ok(())
}
