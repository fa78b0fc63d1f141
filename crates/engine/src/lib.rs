//! Vantus background indexing and retrieval engine.
//!
//! The engine watches directories for file changes, extracts text content,
//! embeds it into vectors, and answers semantic search queries over a local
//! LanceDB store. Clients talk to a running engine over a line-oriented
//! Unix-socket control protocol; the [`client`] and [`lifecycle`] modules
//! provide the consumer side of that protocol.
//!
//! # Architecture
//!
//! ```text
//! Engine (supervisor)
//!   ├── ControlServer (socket listener, one task per connection)
//!   ├── Indexer (single consumer of the change event queue)
//!   └── WatchManager
//!         └── one recursive watcher per monitored root
//! ```
//!
//! Events flow strictly one way: watcher callbacks → event queue → indexer
//! → store. The control path shares the store through [`db::EngineDb`] and
//! signals the indexer through pause/cancellation handles.

pub mod client;
pub mod config;
pub mod daemon;
pub mod db;
pub mod dirs;
pub mod embedding;
pub mod extract;
pub mod indexer;
pub mod lifecycle;
pub mod protocol;
pub mod scan;
pub mod search;
pub mod server;
pub mod watch;
