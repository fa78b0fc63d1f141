//! Filesystem watching.
//!
//! One recursive watcher per monitored root, owned by the [`WatchManager`].
//! Watcher callbacks bridge notify's sync world into an async forwarding
//! task, which normalizes raw events into [`ChangeEvent`]s and pushes them
//! onto the unbounded queue the indexer consumes. No deduplication happens
//! here; the indexer is idempotent, so duplicate events are only wasted
//! work, never corruption.

mod event;
mod monitor;
mod queue;

pub use event::{ChangeEvent, ChangeKind};
pub use monitor::{WatchError, WatchManager};
pub use queue::{EventQueue, EventReceiver};
