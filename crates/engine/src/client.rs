//! Control socket client.
//!
//! Connects to the engine's Unix socket, writes one request line, reads one
//! response line. Transport failures are retried a few times with a growing
//! delay and then degrade to the [`DISCONNECTED`] sentinel; callers never
//! see a transport error, only an absent engine.

use std::{path::PathBuf, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, trace, warn};

use crate::{
  db::{Partner, Rule, Tag},
  dirs::default_socket_path,
  protocol::{DISCONNECTED, IndexStats, OK},
  search::SearchResult,
};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(200);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Client handle for the engine control socket.
#[derive(Debug, Clone)]
pub struct EngineClient {
  socket_path: PathBuf,
}

impl EngineClient {
  pub fn new(socket_path: PathBuf) -> Self {
    Self { socket_path }
  }

  pub fn socket_path(&self) -> &PathBuf {
    &self.socket_path
  }

  /// Send one raw command line and return the response line.
  ///
  /// Retries up to [`MAX_RETRIES`] times with a linearly growing delay.
  /// When every attempt fails the [`DISCONNECTED`] sentinel is returned.
  pub async fn send_command(&self, command: &str) -> String {
    for attempt in 0..MAX_RETRIES {
      match self.try_send(command).await {
        Ok(response) => {
          trace!(command, response, "Command round trip");
          return response;
        }
        Err(e) => {
          debug!(attempt, err = %e, "Engine connection attempt failed");
          // No backoff after the last attempt; the sentinel goes out now
          if attempt + 1 < MAX_RETRIES {
            tokio::time::sleep(BASE_DELAY * (attempt + 1)).await;
          }
        }
      }
    }

    warn!(command, "Engine unreachable after {MAX_RETRIES} attempts");
    DISCONNECTED.to_string()
  }

  async fn try_send(&self, command: &str) -> Result<String, std::io::Error> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
      .await
      .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;

    let framed = Framed::new(stream, LinesCodec::new());
    let (mut sink, mut stream) = framed.split();

    sink
      .send(command.to_string())
      .await
      .map_err(|e| std::io::Error::other(e.to_string()))?;

    match stream.next().await {
      Some(Ok(line)) => Ok(line),
      Some(Err(e)) => Err(std::io::Error::other(e.to_string())),
      None => Err(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "engine closed the connection without replying",
      )),
    }
  }

  // ==========================================================================
  // Typed helpers
  // ==========================================================================

  /// Current engine status label, or [`DISCONNECTED`].
  pub async fn status(&self) -> String {
    self.send_command("STATUS").await
  }

  /// Index statistics. None when the engine is unreachable or the
  /// response does not decode.
  pub async fn stats(&self) -> Option<IndexStats> {
    let response = self.send_command("GET_STATS").await;
    serde_json::from_str(&response).ok()
  }

  /// Semantic search. Empty queries short-circuit to an empty result
  /// without touching the socket; undecodable responses decode to empty.
  pub async fn search(&self, query: &str) -> Vec<SearchResult> {
    if query.trim().is_empty() {
      return Vec::new();
    }

    let response = self.send_command(&format!("SEARCH {query}")).await;
    serde_json::from_str(&response).unwrap_or_default()
  }

  pub async fn get_tags(&self) -> Vec<Tag> {
    let response = self.send_command("GET_TAGS").await;
    serde_json::from_str(&response).unwrap_or_default()
  }

  /// Add a tag by name. True on acknowledgement.
  pub async fn add_tag(&self, name: &str) -> bool {
    let payload = serde_json::json!({ "name": name });
    self.send_command(&format!("ADD_TAG {payload}")).await == OK
  }

  pub async fn delete_tag(&self, name: &str) -> bool {
    self.send_command(&format!("DELETE_TAG {name}")).await == OK
  }

  pub async fn get_partners(&self) -> Vec<Partner> {
    let response = self.send_command("GET_PARTNERS").await;
    serde_json::from_str(&response).unwrap_or_default()
  }

  pub async fn add_partner(&self, partner: &Partner) -> bool {
    let Ok(payload) = serde_json::to_string(partner) else {
      return false;
    };
    self.send_command(&format!("ADD_PARTNER {payload}")).await == OK
  }

  pub async fn get_rules(&self) -> Vec<Rule> {
    let response = self.send_command("GET_RULES").await;
    serde_json::from_str(&response).unwrap_or_default()
  }

  pub async fn add_rule(&self, rule: &Rule) -> bool {
    let Ok(payload) = serde_json::to_string(rule) else {
      return false;
    };
    self.send_command(&format!("ADD_RULE {payload}")).await == OK
  }

  pub async fn delete_rule(&self, id: &str) -> bool {
    self.send_command(&format!("DELETE_RULE {id}")).await == OK
  }

  pub async fn pause(&self) -> bool {
    self.send_command("PAUSE").await == OK
  }

  pub async fn resume(&self) -> bool {
    self.send_command("RESUME").await == OK
  }

  pub async fn rebuild(&self) -> bool {
    self.send_command("REBUILD").await == OK
  }

  pub async fn reindex(&self, path: &str) -> bool {
    self.send_command(&format!("REINDEX {path}")).await == OK
  }

  pub async fn shutdown(&self) -> bool {
    self.send_command("SHUTDOWN").await == OK
  }
}

impl Default for EngineClient {
  fn default() -> Self {
    Self::new(default_socket_path())
  }
}

#[cfg(test)]
mod tests {
  use tokio::net::UnixListener;

  use super::*;

  /// One-shot server answering every connection with a fixed line.
  fn fixed_reply_server(socket_path: PathBuf, reply: &'static str) {
    tokio::spawn(async move {
      let listener = UnixListener::bind(&socket_path).unwrap();
      loop {
        let (stream, _) = listener.accept().await.unwrap();
        let framed = Framed::new(stream, LinesCodec::new());
        let (mut sink, mut stream) = framed.split();
        let _ = stream.next().await;
        sink.send(reply.to_string()).await.unwrap();
      }
    });
  }

  #[tokio::test]
  async fn test_dead_socket_yields_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let client = EngineClient::new(dir.path().join("nobody-home.sock"));

    let start = std::time::Instant::now();
    assert_eq!(client.send_command("STATUS").await, DISCONNECTED);
    // Two inter-attempt delays (200ms + 400ms), none after the last attempt
    assert!(start.elapsed() < Duration::from_millis(1000));
  }

  #[tokio::test]
  async fn test_empty_search_never_touches_socket() {
    let dir = tempfile::tempdir().unwrap();
    // No server behind this path; a send would cost three retries
    let client = EngineClient::new(dir.path().join("nobody-home.sock"));

    let start = std::time::Instant::now();
    assert!(client.search("   ").await.is_empty());
    assert!(start.elapsed() < Duration::from_millis(100));
  }

  #[tokio::test]
  async fn test_round_trip_against_fixed_server() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("engine.sock");
    fixed_reply_server(socket_path.clone(), "Idle");

    // Give the listener a beat to bind
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = EngineClient::new(socket_path);
    assert_eq!(client.status().await, "Idle");
  }

  #[tokio::test]
  async fn test_undecodable_search_response_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("engine.sock");
    fixed_reply_server(socket_path.clone(), "Unknown");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = EngineClient::new(socket_path);
    assert!(client.search("anything").await.is_empty());
  }

  #[tokio::test]
  async fn test_ok_helpers_interpret_acknowledgement() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("engine.sock");
    fixed_reply_server(socket_path.clone(), "OK");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = EngineClient::new(socket_path);
    assert!(client.pause().await);
    assert!(client.add_tag("Work").await);
    assert!(client.rebuild().await);
  }
}
