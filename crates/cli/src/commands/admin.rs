//! Engine status and control commands

use anyhow::{Context, Result};
use vantus_engine::{client::EngineClient, lifecycle::EngineLifecycle, protocol::DISCONNECTED};

/// Show what the engine is doing.
pub async fn cmd_status() -> Result<()> {
  let client = EngineClient::default();
  let status = client.status().await;

  if status == DISCONNECTED {
    println!("Engine is not running.");
  } else {
    println!("Engine status: {status}");
  }

  Ok(())
}

/// Show index statistics.
pub async fn cmd_stats(json_output: bool) -> Result<()> {
  let client = EngineClient::default();
  let Some(stats) = client.stats().await else {
    println!("Engine is not running.");
    return Ok(());
  };

  if json_output {
    println!("{}", serde_json::to_string_pretty(&stats)?);
    return Ok(());
  }

  println!("Files indexed:  {}", stats.files_indexed);
  println!("Tags:           {}", stats.total_tags);
  println!("Partners:       {}", stats.total_partners);
  println!("Queue length:   {}", stats.queue_length);
  println!("Status:         {}", stats.status);
  if let Some(err) = &stats.last_error {
    println!("Last error:     {err}");
  }

  Ok(())
}

pub async fn cmd_pause() -> Result<()> {
  if EngineClient::default().pause().await {
    println!("Indexing paused.");
  } else {
    println!("Engine is not running.");
  }
  Ok(())
}

pub async fn cmd_resume() -> Result<()> {
  if EngineClient::default().resume().await {
    println!("Indexing resumed.");
  } else {
    println!("Engine is not running.");
  }
  Ok(())
}

/// Re-scan all monitored roots.
pub async fn cmd_rebuild() -> Result<()> {
  if EngineClient::default().rebuild().await {
    println!("Rebuild started.");
  } else {
    println!("Engine is not running.");
  }
  Ok(())
}

/// Start monitoring and indexing a path, starting the engine if needed.
pub async fn cmd_reindex(path: &str) -> Result<()> {
  let absolute = std::fs::canonicalize(path).with_context(|| format!("No such path: {path}"))?;

  let lifecycle = EngineLifecycle::default();
  lifecycle.ensure_running().await.context("Failed to start the engine")?;

  if EngineClient::default().reindex(&absolute.to_string_lossy()).await {
    println!("Indexing {}", absolute.display());
  } else {
    println!("Engine did not accept the request.");
  }
  Ok(())
}

/// Shut the engine down.
pub async fn cmd_stop() -> Result<()> {
  let lifecycle = EngineLifecycle::default();
  if !lifecycle.is_running() {
    println!("Engine is not running.");
    return Ok(());
  }

  lifecycle.stop().await.context("Failed to stop the engine")?;
  println!("Engine stopped.");
  Ok(())
}
