//! Office document text extraction.
//!
//! Word, Excel, and PowerPoint files are OOXML zip containers; text lives in
//! well-known XML parts inside. This extractor opens the container, pulls the
//! text nodes out of those parts, and space-joins them. No formatting,
//! images, or embedded objects survive.

use std::{fs::File, io::Read as _, path::Path};

use async_trait::async_trait;
use quick_xml::{Reader, events::Event};
use tracing::debug;
use zip::ZipArchive;

use super::{ContentExtractor, ExtractError};

pub struct OfficeExtractor;

impl OfficeExtractor {
  pub fn new() -> Self {
    Self
  }
}

impl Default for OfficeExtractor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ContentExtractor for OfficeExtractor {
  fn name(&self) -> &str {
    "office"
  }

  fn can_extract(&self, extension: &str) -> bool {
    matches!(extension, "docx" | "xlsx" | "pptx")
  }

  async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
    let path_buf = path.to_path_buf();
    // Container and XML parsing are synchronous
    let text = tokio::task::spawn_blocking(move || extract_sync(&path_buf)).await??;

    debug!(path = %path.display(), chars = text.len(), "Extracted office document text");
    Ok(text)
  }
}

fn extract_sync(path: &Path) -> Result<String, ExtractError> {
  let extension = path
    .extension()
    .map(|e| e.to_string_lossy().to_lowercase())
    .unwrap_or_default();

  let file = File::open(path)?;
  let mut archive = ZipArchive::new(file).map_err(|e| parse_error(path, e.to_string()))?;

  let parts = match extension.as_str() {
    "docx" => docx_text(&mut archive),
    "xlsx" => xlsx_text(&mut archive),
    "pptx" => pptx_text(&mut archive),
    _ => Ok(Vec::new()),
  };

  parts
    .map(|p| p.join(" "))
    .map_err(|message| parse_error(path, message))
}

fn parse_error(path: &Path, message: String) -> ExtractError {
  ExtractError::Parse {
    path: path.display().to_string(),
    message,
  }
}

/// The document body lives in a single part.
fn docx_text(archive: &mut ZipArchive<File>) -> Result<Vec<String>, String> {
  let Some(xml) = entry_string(archive, "word/document.xml")? else {
    return Err("word/document.xml missing".to_string());
  };

  let mut parts = Vec::new();
  text_nodes(&xml, &mut parts)?;
  Ok(parts)
}

/// Cell values, with `t="s"` cells resolved through the shared string table.
fn xlsx_text(archive: &mut ZipArchive<File>) -> Result<Vec<String>, String> {
  let shared = match entry_string(archive, "xl/sharedStrings.xml")? {
    Some(xml) => shared_strings(&xml)?,
    None => Vec::new(),
  };

  let mut sheets: Vec<String> = archive
    .file_names()
    .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
    .map(String::from)
    .collect();
  sheets.sort();

  let mut parts = Vec::new();
  for sheet in sheets {
    if let Some(xml) = entry_string(archive, &sheet)? {
      worksheet_text(&xml, &shared, &mut parts)?;
    }
  }
  Ok(parts)
}

/// All text from every slide, in slide order.
fn pptx_text(archive: &mut ZipArchive<File>) -> Result<Vec<String>, String> {
  let mut slides: Vec<String> = archive
    .file_names()
    .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
    .map(String::from)
    .collect();
  slides.sort();

  let mut parts = Vec::new();
  for slide in slides {
    if let Some(xml) = entry_string(archive, &slide)? {
      text_nodes(&xml, &mut parts)?;
    }
  }
  Ok(parts)
}

fn entry_string(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, String> {
  match archive.by_name(name) {
    Ok(mut entry) => {
      let mut bytes = Vec::new();
      entry.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
      Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
    Err(zip::result::ZipError::FileNotFound) => Ok(None),
    Err(e) => Err(e.to_string()),
  }
}

/// Collect the content of every `<t>` element. Both Word (`w:t`) and
/// PowerPoint (`a:t`) keep their visible text in elements with that local
/// name.
fn text_nodes(xml: &str, out: &mut Vec<String>) -> Result<(), String> {
  let mut reader = Reader::from_str(xml);
  let mut in_text = false;

  loop {
    match reader.read_event().map_err(|e| e.to_string())? {
      Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
      Event::End(e) if e.local_name().as_ref() == b"t" => in_text = false,
      Event::Text(t) if in_text => out.push(t.unescape().map_err(|e| e.to_string())?.into_owned()),
      Event::Eof => break,
      _ => {}
    }
  }
  Ok(())
}

/// Parse `xl/sharedStrings.xml` into one string per `<si>` item. Rich-text
/// items concatenate their runs.
fn shared_strings(xml: &str) -> Result<Vec<String>, String> {
  let mut reader = Reader::from_str(xml);
  let mut strings = Vec::new();
  let mut current: Option<String> = None;
  let mut in_text = false;

  loop {
    match reader.read_event().map_err(|e| e.to_string())? {
      Event::Start(e) => match e.local_name().as_ref() {
        b"si" => current = Some(String::new()),
        b"t" => in_text = true,
        _ => {}
      },
      Event::End(e) => match e.local_name().as_ref() {
        b"si" => {
          if let Some(s) = current.take() {
            strings.push(s);
          }
        }
        b"t" => in_text = false,
        _ => {}
      },
      Event::Text(t) if in_text => {
        if let Some(s) = current.as_mut() {
          s.push_str(&t.unescape().map_err(|e| e.to_string())?);
        }
      }
      Event::Eof => break,
      _ => {}
    }
  }
  Ok(strings)
}

/// Pull cell values out of one worksheet. A cell marked `t="s"` stores a
/// shared string index in its `<v>`; anything else stores the value
/// directly. Unresolvable indexes are skipped.
fn worksheet_text(xml: &str, shared: &[String], out: &mut Vec<String>) -> Result<(), String> {
  let mut reader = Reader::from_str(xml);
  let mut shared_cell = false;
  let mut in_value = false;

  loop {
    match reader.read_event().map_err(|e| e.to_string())? {
      Event::Start(e) if e.local_name().as_ref() == b"c" => {
        shared_cell = e
          .try_get_attribute("t")
          .map_err(|e| e.to_string())?
          .is_some_and(|a| a.value.as_ref() == b"s");
      }
      Event::Start(e) if e.local_name().as_ref() == b"v" => in_value = true,
      Event::End(e) if e.local_name().as_ref() == b"v" => in_value = false,
      Event::Text(t) if in_value => {
        let value = t.unescape().map_err(|e| e.to_string())?.into_owned();
        if shared_cell {
          if let Ok(idx) = value.trim().parse::<usize>()
            && let Some(s) = shared.get(idx)
          {
            out.push(s.clone());
          }
        } else {
          out.push(value);
        }
      }
      Event::Eof => break,
      _ => {}
    }
  }
  Ok(())
}
