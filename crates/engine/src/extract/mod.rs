//! Content extraction.
//!
//! The indexer hands every created or modified file to an [`ExtractorSet`],
//! which probes an explicitly registered, ordered list of extractors by file
//! extension. The first extractor claiming the extension wins. Files no
//! extractor claims yield empty text, which is not an error: such files stay
//! metadata-searchable.

mod office;
mod pdf;
mod text;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};

pub use office::OfficeExtractor;
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Failed to parse {path}: {message}")]
  Parse { path: String, message: String },
  #[error("Extraction task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
  fn name(&self) -> &str;

  /// Probe on the file extension, without the leading dot. Callers pass the
  /// extension lowercased.
  fn can_extract(&self, extension: &str) -> bool;

  async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Ordered extractor registry.
pub struct ExtractorSet {
  extractors: Vec<Box<dyn ContentExtractor>>,
}

impl ExtractorSet {
  /// An empty set; extractors must be registered explicitly.
  pub fn new() -> Self {
    Self { extractors: Vec::new() }
  }

  /// The built-in extractors in probe order.
  pub fn with_defaults() -> Self {
    let mut set = Self::new();
    set.register(Box::new(TextExtractor::new()));
    set.register(Box::new(PdfExtractor::new()));
    set.register(Box::new(OfficeExtractor::new()));
    set
  }

  pub fn register(&mut self, extractor: Box<dyn ContentExtractor>) {
    debug!(extractor = extractor.name(), "Registered content extractor");
    self.extractors.push(extractor);
  }

  /// Extract text from a file. Registration order decides which extractor
  /// handles an extension claimed by more than one; unsupported extensions
  /// produce empty text.
  pub async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
    let extension = path
      .extension()
      .map(|e| e.to_string_lossy().to_lowercase())
      .unwrap_or_default();

    let Some(extractor) = self.extractors.iter().find(|e| e.can_extract(&extension)) else {
      trace!(path = %path.display(), extension, "No extractor for file");
      return Ok(String::new());
    };

    trace!(path = %path.display(), extractor = extractor.name(), "Extracting content");
    extractor.extract(path).await
  }
}

impl Default for ExtractorSet {
  fn default() -> Self {
    Self::with_defaults()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_unsupported_extension_yields_empty_text() {
    let set = ExtractorSet::with_defaults();
    let content = set.extract(Path::new("/nowhere/photo.jpg")).await.unwrap();
    assert!(content.is_empty());
  }

  #[tokio::test]
  async fn test_no_extension_yields_empty_text() {
    let set = ExtractorSet::with_defaults();
    let content = set.extract(Path::new("/nowhere/Makefile2")).await.unwrap();
    assert!(content.is_empty());
  }

  #[tokio::test]
  async fn test_probe_is_case_insensitive() {
    let set = ExtractorSet::with_defaults();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("NOTES.TXT");
    std::fs::write(&path, "upper case extension").unwrap();

    let content = set.extract(&path).await.unwrap();
    assert_eq!(content, "upper case extension");
  }

  #[tokio::test]
  async fn test_registration_order_wins() {
    struct Grabby;

    #[async_trait]
    impl ContentExtractor for Grabby {
      fn name(&self) -> &str {
        "grabby"
      }
      fn can_extract(&self, _extension: &str) -> bool {
        true
      }
      async fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
        Ok("grabbed".to_string())
      }
    }

    let mut set = ExtractorSet::new();
    set.register(Box::new(Grabby));
    set.register(Box::new(TextExtractor::new()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "real content").unwrap();

    assert_eq!(set.extract(&path).await.unwrap(), "grabbed");
  }

  #[tokio::test]
  async fn test_missing_file_is_an_error() {
    let set = ExtractorSet::with_defaults();
    assert!(set.extract(Path::new("/nowhere/missing.txt")).await.is_err());
  }
}
