//! Engine configuration.
//!
//! Configuration lives in a single TOML file at the user config directory
//! (`~/.config/vantus/config.toml` by default, overridable via `CONFIG_DIR`
//! and `XDG_CONFIG_HOME`). Every section is optional; missing sections and
//! fields fall back to defaults so an empty file is always valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dirs;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub embedding: EmbeddingConfig,
  pub index: IndexConfig,
  pub watch: WatchConfig,
  pub daemon: DaemonConfig,
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
  /// Deterministic feature-hashed vectors, no external service required.
  #[default]
  Hash,
  /// A local Ollama server.
  Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub provider: EmbeddingProviderKind,
  /// Model identifier recorded alongside stored vectors.
  pub model: String,
  pub dimensions: usize,
  pub ollama_url: String,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      provider: EmbeddingProviderKind::Hash,
      model: "all-MiniLM-L6-v2".to_string(),
      dimensions: 384,
      ollama_url: "http://localhost:11434".to_string(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Files larger than this are indexed by metadata only (no extraction).
  pub max_file_size: u64,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      max_file_size: 10 * 1024 * 1024,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
  /// Directories monitored on startup.
  pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level for the background process (error/warn/info/debug/trace).
  pub log_level: String,
  /// Log rotation policy for background mode: daily, hourly, or never.
  pub log_rotation: String,
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      log_rotation: "daily".to_string(),
    }
  }
}

impl Config {
  /// Load the user configuration, falling back to defaults when the file is
  /// missing or unparseable. A broken config file is logged and ignored
  /// rather than preventing startup.
  pub fn load() -> Self {
    let path = Self::user_config_path();
    Self::load_from(&path).unwrap_or_else(|| {
      debug!(path = %path.display(), "No config file, using defaults");
      Self::default()
    })
  }

  /// Load configuration from an explicit path.
  pub fn load_from(path: &Path) -> Option<Self> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&contents) {
      Ok(config) => {
        debug!(path = %path.display(), "Loaded config");
        Some(config)
      }
      Err(e) => {
        warn!(path = %path.display(), err = %e, "Failed to parse config, using defaults");
        None
      }
    }
  }

  /// Path to the user config file.
  pub fn user_config_path() -> PathBuf {
    dirs::default_config_dir().join("config.toml")
  }

  /// Render a commented template for first-run config creation.
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# Vantus engine configuration

[embedding]
# provider: "hash" (offline, deterministic) or "ollama"
provider = "hash"
model = "{model}"
dimensions = {dimensions}
ollama_url = "{ollama_url}"

[index]
# Files larger than this many bytes are indexed by metadata only.
max_file_size = {max_file_size}

[watch]
# Directories to monitor on startup, e.g. roots = ["/home/me/Documents"]
roots = []

[daemon]
log_level = "{log_level}"
log_rotation = "{log_rotation}"
"#,
      model = defaults.embedding.model,
      dimensions = defaults.embedding.dimensions,
      ollama_url = defaults.embedding.ollama_url,
      max_file_size = defaults.index.max_file_size,
      log_level = defaults.daemon.log_level,
      log_rotation = defaults.daemon.log_rotation,
    )
  }
}
