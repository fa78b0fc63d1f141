//! Protocol round trips over a real Unix socket.

use std::{path::Path, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use vantus_engine::{
  client::EngineClient,
  config::EmbeddingConfig,
  db::EngineDb,
  embedding::{EmbeddingProvider, HashProvider},
  indexer::EngineStatus,
  protocol::DISCONNECTED,
  search::SearchService,
  server::{ControlServer, ServerConfig},
  watch::{EventQueue, WatchManager},
};

const DIM: usize = 16;

struct Harness {
  client: EngineClient,
  shutdown: CancellationToken,
  server_task: tokio::task::JoinHandle<()>,
}

/// Bring up a full control server on a scratch socket.
async fn start_server(data_dir: &Path) -> Harness {
  let db = Arc::new(EngineDb::open_at_path(data_dir.join("lancedb"), DIM).await.unwrap());
  let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(&EmbeddingConfig {
    dimensions: DIM,
    ..Default::default()
  }));
  let (queue, _events) = EventQueue::channel();
  let socket_path = data_dir.join("vantus.sock");
  let shutdown = CancellationToken::new();

  let server = ControlServer::new(ServerConfig {
    socket_path: socket_path.clone(),
    search: Arc::new(SearchService::new(Arc::clone(&db), provider)),
    db,
    status: EngineStatus::new(),
    watcher: Arc::new(WatchManager::new(queue.clone())),
    queue,
    shutdown: shutdown.clone(),
  });

  let cancel = shutdown.child_token();
  let server_task = tokio::spawn(async move {
    server.run(cancel).await.unwrap();
  });

  // Wait for the socket to come up
  for _ in 0..50 {
    if socket_path.exists() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  Harness {
    client: EngineClient::new(socket_path),
    shutdown,
    server_task,
  }
}

#[tokio::test]
async fn status_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert_eq!(harness.client.status().await, "Idle");

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn pause_and_resume_change_status() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert!(harness.client.pause().await);
  assert_eq!(harness.client.status().await, "Paused");
  assert!(harness.client.resume().await);
  assert_eq!(harness.client.status().await, "Idle");

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn add_tag_twice_creates_one_tag() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert!(harness.client.add_tag("Work").await);
  assert!(harness.client.add_tag("Work").await);

  let tags = harness.client.get_tags().await;
  assert_eq!(tags.len(), 1);
  assert_eq!(tags[0].name, "Work");
  assert!(!tags[0].id.is_empty());

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn search_on_empty_index_is_an_empty_array() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  let raw = harness.client.send_command("SEARCH anything").await;
  assert_eq!(raw, "[]");
  assert!(harness.client.search("anything").await.is_empty());

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn unknown_verbs_answer_ok() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert_eq!(harness.client.send_command("FROBNICATE").await, "OK");

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn malformed_payload_answers_err() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  let response = harness.client.send_command("ADD_TAG {broken").await;
  assert!(response.starts_with("ERR "), "got: {response}");

  // The listener survives the bad request
  assert_eq!(harness.client.status().await, "Idle");

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn stats_decode_and_count_tags() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert!(harness.client.add_tag("Receipts").await);

  let stats = harness.client.stats().await.unwrap();
  assert_eq!(stats.files_indexed, 0);
  assert_eq!(stats.total_tags, 1);
  assert_eq!(stats.total_partners, 0);
  assert_eq!(stats.status, "Idle");

  harness.shutdown.cancel();
  harness.server_task.await.unwrap();
}

#[tokio::test]
async fn shutdown_verb_stops_the_server() {
  let dir = tempfile::tempdir().unwrap();
  let harness = start_server(dir.path()).await;

  assert!(harness.client.shutdown().await);

  // The master token is cancelled and the server exits
  tokio::time::timeout(Duration::from_secs(2), harness.server_task)
    .await
    .unwrap()
    .unwrap();
  assert!(harness.shutdown.is_cancelled());
}

#[tokio::test]
async fn dead_socket_degrades_to_disconnected() {
  let dir = tempfile::tempdir().unwrap();
  let client = EngineClient::new(dir.path().join("nobody.sock"));

  assert_eq!(client.status().await, DISCONNECTED);
  assert!(client.search("query").await.is_empty());
  assert!(client.stats().await.is_none());
  assert!(!client.pause().await);
}
