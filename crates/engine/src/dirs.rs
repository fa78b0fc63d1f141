//! Well-known filesystem locations for the engine.

/// Get the control socket path.
///
/// Uses XDG_RUNTIME_DIR when available, falling back to a per-uid
/// path under /tmp.
pub fn default_socket_path() -> std::path::PathBuf {
  if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
    std::path::PathBuf::from(runtime_dir).join("vantus-engine.sock")
  } else {
    let uid = unsafe { libc::getuid() };
    std::path::PathBuf::from(format!("/tmp/vantus-engine-{}.sock", uid))
  }
}

/// Check whether an engine is accepting connections at the default socket.
pub fn is_engine_running() -> bool {
  is_engine_running_at(&default_socket_path())
}

/// Check whether an engine is accepting connections at a specific socket.
pub fn is_engine_running_at(socket_path: &std::path::Path) -> bool {
  std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Get the base directory for engine data (database, logs).
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> std::path::PathBuf {
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return std::path::PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return std::path::PathBuf::from(xdg_data).join("vantus");
  }

  dirs::data_local_dir()
    .unwrap_or_else(|| std::path::PathBuf::from("."))
    .join("vantus")
}

/// Get the config directory.
///
/// Respects the following environment variables (in order of precedence):
/// 1. CONFIG_DIR - explicit config directory override
/// 2. XDG_CONFIG_HOME - standard XDG config home directory
/// 3. dirs::config_dir() - platform default
pub fn default_config_dir() -> std::path::PathBuf {
  if let Ok(dir) = std::env::var("CONFIG_DIR") {
    return std::path::PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return std::path::PathBuf::from(xdg_config).join("vantus");
  }

  dirs::config_dir()
    .unwrap_or_else(|| std::path::PathBuf::from("."))
    .join("vantus")
}
