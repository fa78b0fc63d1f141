//! The change event channel.
//!
//! Unbounded so producers never block and never drop events; backpressure
//! is absorbed as queue depth and the single indexer consumer drains it in
//! FIFO order. Depth is tracked so stats can report a queue length.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use tokio::sync::mpsc;
use tracing::warn;

use super::ChangeEvent;

/// Producer half. Cheap to clone; one per watcher plus the control path.
#[derive(Debug, Clone)]
pub struct EventQueue {
  tx: mpsc::UnboundedSender<ChangeEvent>,
  depth: Arc<AtomicUsize>,
}

/// Consumer half, held by the indexer.
#[derive(Debug)]
pub struct EventReceiver {
  rx: mpsc::UnboundedReceiver<ChangeEvent>,
  depth: Arc<AtomicUsize>,
}

impl EventQueue {
  pub fn channel() -> (Self, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
      Self {
        tx,
        depth: Arc::clone(&depth),
      },
      EventReceiver { rx, depth },
    )
  }

  /// Enqueue an event. Returns false only when the consumer is gone
  /// (engine shutting down), which callers treat as a droppable condition.
  pub fn send(&self, event: ChangeEvent) -> bool {
    if self.tx.send(event).is_err() {
      warn!("Event queue closed, dropping change event");
      return false;
    }
    self.depth.fetch_add(1, Ordering::Relaxed);
    true
  }

  /// Events enqueued but not yet consumed.
  pub fn len(&self) -> usize {
    self.depth.load(Ordering::Relaxed)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl EventReceiver {
  /// Receive the next event in FIFO order. None after all producers and
  /// the queue handles are dropped.
  pub async fn recv(&mut self) -> Option<ChangeEvent> {
    let event = self.rx.recv().await;
    if event.is_some() {
      self.depth.fetch_sub(1, Ordering::Relaxed);
    }
    event
  }
}
