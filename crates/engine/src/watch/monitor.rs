//! The watch manager.
//!
//! Owns one recursive `notify` watcher per monitored root. Each watcher's
//! sync callback forwards raw events over a bridge channel to a spawned
//! async task, which normalizes them into [`ChangeEvent`]s on the shared
//! queue. Watcher errors are logged and recovered by re-scanning the
//! affected root, trading duplicate work for eventual consistency.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Mutex,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{ChangeEvent, EventQueue};
use crate::scan;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

struct WatchEntry {
  // Held to keep the notify watcher alive
  _watcher: RecommendedWatcher,
  forward_task: tokio::task::JoinHandle<()>,
}

/// Manages the set of monitored roots.
pub struct WatchManager {
  queue: EventQueue,
  watchers: Mutex<HashMap<PathBuf, WatchEntry>>,
}

impl WatchManager {
  pub fn new(queue: EventQueue) -> Self {
    Self {
      queue,
      watchers: Mutex::new(HashMap::new()),
    }
  }

  /// Start watching a directory recursively. Already-watched roots and
  /// paths that are not directories are no-ops; errors are reserved for
  /// roots that exist but cannot be watched.
  pub fn start_monitoring(&self, root: &Path) -> Result<(), WatchError> {
    if !root.is_dir() {
      debug!(root = %root.display(), "Not a directory, nothing to monitor");
      return Ok(());
    }

    let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
    if watchers.contains_key(root) {
      debug!(root = %root.display(), "Root already monitored");
      return Ok(());
    }

    // Bridge channel between notify's callback thread and our async task
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread; drop the event if the bridge is gone
        let _ = event_tx.blocking_send(res);
      },
      notify::Config::default(),
    )
    .map_err(WatchError::Init)?;

    watcher.watch(root, RecursiveMode::Recursive).map_err(WatchError::Watch)?;

    let forward_task = tokio::spawn(forward_events(root.to_path_buf(), event_rx, self.queue.clone()));

    watchers.insert(
      root.to_path_buf(),
      WatchEntry {
        _watcher: watcher,
        forward_task,
      },
    );

    info!(root = %root.display(), "Started monitoring");
    Ok(())
  }

  /// Stop watching a directory. Unknown roots are a no-op.
  pub fn stop_monitoring(&self, root: &Path) {
    let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(entry) = watchers.remove(root) {
      // Dropping the watcher closes the bridge channel, which ends the task;
      // abort is just a shortcut for events already in flight.
      entry.forward_task.abort();
      info!(root = %root.display(), "Stopped monitoring");
    }
  }

  /// Currently monitored roots.
  pub fn watched_roots(&self) -> Vec<PathBuf> {
    let watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
    watchers.keys().cloned().collect()
  }

  /// Stop all watchers.
  pub fn stop_all(&self) {
    let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
    for (root, entry) in watchers.drain() {
      entry.forward_task.abort();
      debug!(root = %root.display(), "Stopped monitoring");
    }
  }
}

impl Drop for WatchManager {
  fn drop(&mut self) {
    self.stop_all();
  }
}

/// Consume raw notify events for one root and push normalized change events
/// onto the queue.
async fn forward_events(
  root: PathBuf,
  mut event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  queue: EventQueue,
) {
  debug!(root = %root.display(), "Watch forwarder started");

  while let Some(result) = event_rx.recv().await {
    match result {
      Ok(event) => {
        for change in normalize_event(event) {
          if !queue.send(change) {
            debug!(root = %root.display(), "Watch forwarder stopping (queue closed)");
            return;
          }
        }
      }
      Err(e) => {
        // The watcher may have missed events; re-scan the root so the
        // idempotent indexer can reconcile.
        warn!(root = %root.display(), err = %e, "Watcher error, re-scanning root");
        scan::enqueue_root(&root, &queue);
      }
    }
  }

  debug!(root = %root.display(), "Watch forwarder stopped");
}

/// Map one raw notify event to zero or more change events.
fn normalize_event(event: Event) -> Vec<ChangeEvent> {
  use notify::event::{ModifyKind, RenameMode};

  let mut changes = Vec::new();

  match event.kind {
    EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
      // paths[0] = from, paths[1] = to
      let from = event.paths[0].clone();
      let to = event.paths[1].clone();
      if !to.is_dir() {
        debug!(from = %from.display(), to = %to.display(), "File renamed");
        changes.push(ChangeEvent::renamed(from, to));
      }
      return changes;
    }
    _ => {}
  }

  for path in event.paths {
    if path.is_dir() {
      trace!(path = %path.display(), "Skipping directory event");
      continue;
    }

    let change = match event.kind {
      EventKind::Create(_) => {
        debug!(file = %path.display(), "File created");
        ChangeEvent::created(path)
      }
      EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
        // Only the old half of a rename; the new half arrives separately
        debug!(file = %path.display(), "File renamed away (treating as delete)");
        ChangeEvent::deleted(path)
      }
      EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
        debug!(file = %path.display(), "File renamed in (treating as create)");
        ChangeEvent::created(path)
      }
      EventKind::Modify(_) => {
        debug!(file = %path.display(), "File modified");
        ChangeEvent::modified(path)
      }
      EventKind::Remove(_) => {
        debug!(file = %path.display(), "File deleted");
        ChangeEvent::deleted(path)
      }
      EventKind::Access(_) | EventKind::Any | EventKind::Other => {
        trace!(file = %path.display(), kind = ?event.kind, "Ignoring event");
        continue;
      }
    };

    changes.push(change);
  }

  changes
}

#[cfg(test)]
mod tests {
  use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

  use super::*;
  use crate::watch::ChangeKind;

  fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
    let mut e = Event::new(kind);
    e.paths = paths;
    e
  }

  #[test]
  fn test_create_event() {
    let changes = normalize_event(event(
      EventKind::Create(CreateKind::File),
      vec![PathBuf::from("/w/a.txt")],
    ));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Created);
    assert_eq!(changes[0].path, PathBuf::from("/w/a.txt"));
  }

  #[test]
  fn test_remove_event() {
    let changes = normalize_event(event(
      EventKind::Remove(RemoveKind::File),
      vec![PathBuf::from("/w/a.txt")],
    ));
    assert_eq!(changes[0].kind, ChangeKind::Deleted);
  }

  #[test]
  fn test_rename_both_carries_both_paths() {
    let changes = normalize_event(event(
      EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
      vec![PathBuf::from("/w/old.txt"), PathBuf::from("/w/new.txt")],
    ));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, PathBuf::from("/w/new.txt"));
    assert_eq!(
      changes[0].kind,
      ChangeKind::Renamed {
        from: PathBuf::from("/w/old.txt")
      }
    );
  }

  #[test]
  fn test_rename_halves_degrade() {
    let from = normalize_event(event(
      EventKind::Modify(ModifyKind::Name(RenameMode::From)),
      vec![PathBuf::from("/w/old.txt")],
    ));
    assert_eq!(from[0].kind, ChangeKind::Deleted);

    let to = normalize_event(event(
      EventKind::Modify(ModifyKind::Name(RenameMode::To)),
      vec![PathBuf::from("/w/new.txt")],
    ));
    assert_eq!(to[0].kind, ChangeKind::Created);
  }

  #[test]
  fn test_access_events_ignored() {
    let changes = normalize_event(event(
      EventKind::Access(notify::event::AccessKind::Read),
      vec![PathBuf::from("/w/a.txt")],
    ));
    assert!(changes.is_empty());
  }

  #[tokio::test]
  async fn test_start_monitoring_missing_directory_is_a_noop() {
    let (queue, _rx) = EventQueue::channel();
    let manager = WatchManager::new(queue);
    manager.start_monitoring(Path::new("/no/such/dir")).unwrap();
    assert!(manager.watched_roots().is_empty());
  }

  #[tokio::test]
  async fn test_watcher_error_triggers_rescan() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    std::fs::write(dir.path().join("b.txt"), "b").unwrap();

    let (queue, mut rx) = EventQueue::channel();
    let (tx, event_rx) = mpsc::channel(8);
    let task = tokio::spawn(forward_events(dir.path().to_path_buf(), event_rx, queue));

    tx.send(Err(notify::Error::generic("overflow"))).await.unwrap();

    // The failed root is reconciled by enqueueing every file it contains
    let mut paths = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
    paths.sort_by(|a, b| a.path.cmp(&b.path));
    assert!(paths.iter().all(|e| e.kind == ChangeKind::Created));
    assert_eq!(paths[0].path, dir.path().join("a.txt"));
    assert_eq!(paths[1].path, dir.path().join("b.txt"));

    drop(tx);
    task.await.unwrap();
  }

  #[tokio::test]
  async fn test_start_monitoring_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, _rx) = EventQueue::channel();
    let manager = WatchManager::new(queue);

    manager.start_monitoring(dir.path()).unwrap();
    manager.start_monitoring(dir.path()).unwrap();
    assert_eq!(manager.watched_roots().len(), 1);

    manager.stop_monitoring(dir.path());
    assert!(manager.watched_roots().is_empty());
    // Stopping again is a no-op
    manager.stop_monitoring(dir.path());
  }
}
