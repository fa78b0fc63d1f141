//! Search command

use anyhow::{Context, Result};
use vantus_engine::{client::EngineClient, lifecycle::EngineLifecycle};

/// Semantic search over indexed files.
///
/// Starts the engine first when it is not running, so `vantus search` works
/// cold.
pub async fn cmd_search(query: &str, json_output: bool) -> Result<()> {
  if query.trim().is_empty() {
    println!("Nothing to search for.");
    return Ok(());
  }

  let lifecycle = EngineLifecycle::default();
  lifecycle.ensure_running().await.context("Failed to start the engine")?;

  let client = EngineClient::default();
  let results = client.search(query).await;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&results)?);
    return Ok(());
  }

  if results.is_empty() {
    println!("No results for: {query}");
    return Ok(());
  }

  println!("Found {} results:\n", results.len());
  for (i, result) in results.iter().enumerate() {
    println!("{}. {} ({:.2})", i + 1, result.name, result.score);
    println!("   {}", result.path);
    if !result.snippet.is_empty() {
      let preview = result.snippet.replace('\n', " ");
      println!("   {preview}");
    }
    println!();
  }

  Ok(())
}
