//! Plain-text extraction.

use std::path::Path;

use async_trait::async_trait;

use super::{ContentExtractor, ExtractError};

/// Extensions read as plain text.
const TEXT_EXTENSIONS: &[&str] = &[
  "txt", "md", "markdown", "log", "csv", "tsv", "json", "toml", "yaml", "yml", "xml", "html", "htm", "ini", "cfg",
  "rs", "py", "js", "ts", "sh", "c", "h", "cpp", "java", "go",
];

pub struct TextExtractor;

impl TextExtractor {
  pub fn new() -> Self {
    Self
  }
}

impl Default for TextExtractor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ContentExtractor for TextExtractor {
  fn name(&self) -> &str {
    "text"
  }

  fn can_extract(&self, extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension)
  }

  async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
    // Tolerate invalid UTF-8 rather than failing the whole file
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }
}
