//! PDF text extraction.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{ContentExtractor, ExtractError};

pub struct PdfExtractor;

impl PdfExtractor {
  pub fn new() -> Self {
    Self
  }
}

impl Default for PdfExtractor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ContentExtractor for PdfExtractor {
  fn name(&self) -> &str {
    "pdf"
  }

  fn can_extract(&self, extension: &str) -> bool {
    extension == "pdf"
  }

  async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
    let path_buf = path.to_path_buf();
    // The parser is CPU-bound and synchronous
    let text = tokio::task::spawn_blocking(move || {
      pdf_extract::extract_text(&path_buf).map_err(|e| ExtractError::Parse {
        path: path_buf.display().to_string(),
        message: e.to_string(),
      })
    })
    .await??;

    debug!(path = %path.display(), chars = text.len(), "Extracted PDF text");
    Ok(text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_claims_only_pdf() {
    let extractor = PdfExtractor::new();
    assert!(extractor.can_extract("pdf"));
    assert!(!extractor.can_extract("docx"));
    assert!(!extractor.can_extract("txt"));
  }

  #[tokio::test]
  async fn test_garbage_bytes_are_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf at all").unwrap();

    let extractor = PdfExtractor::new();
    assert!(extractor.extract(&path).await.is_err());
  }
}
