//! Full directory scans.
//!
//! A scan walks a root and enqueues a Created event for every regular file.
//! Because the indexer upserts idempotently, scanning is safe to run over
//! already-indexed trees; it is used for initial indexing, REBUILD, and
//! watcher error recovery.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::watch::{ChangeEvent, EventQueue};

/// Walk a root and enqueue every regular file as a Created event. Returns
/// the number of files enqueued.
pub fn enqueue_root(root: &Path, queue: &EventQueue) -> usize {
  let mut count = 0;

  for entry in WalkDir::new(root).follow_links(false) {
    let entry = match entry {
      Ok(e) => e,
      Err(e) => {
        warn!(root = %root.display(), err = %e, "Skipping unreadable entry during scan");
        continue;
      }
    };

    if !entry.file_type().is_file() {
      continue;
    }

    if !queue.send(ChangeEvent::created(entry.path().to_path_buf())) {
      // Queue closed mid-scan; the engine is shutting down
      break;
    }
    count += 1;
  }

  debug!(root = %root.display(), files = count, "Scan enqueued");
  count
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::watch::ChangeKind;

  #[tokio::test]
  async fn test_enqueue_root_finds_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub/b.txt"), "b").unwrap();

    let (queue, mut rx) = EventQueue::channel();
    let count = enqueue_root(dir.path(), &queue);
    assert_eq!(count, 2);

    for _ in 0..2 {
      let event = rx.recv().await.unwrap();
      assert_eq!(event.kind, ChangeKind::Created);
    }
  }

  #[tokio::test]
  async fn test_enqueue_missing_root_is_empty() {
    let (queue, _rx) = EventQueue::channel();
    let count = enqueue_root(Path::new("/no/such/dir"), &queue);
    assert_eq!(count, 0);
  }
}
