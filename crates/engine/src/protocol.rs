//! The line-oriented control protocol.
//!
//! One connection carries one request line and one response line. A request
//! is an uppercase verb, optionally followed by a single space and an
//! argument; arguments for the ADD_* verbs are JSON payloads. Responses are
//! either a bare token (`OK`, a status label), a JSON document, or
//! `ERR <message>` for malformed payloads. Unknown verbs answer `OK` so old
//! clients stay compatible with newer engines.

use serde::{Deserialize, Serialize};

use crate::db::{Partner, Rule, Tag};

/// Positive acknowledgement for verbs with no payload to return.
pub const OK: &str = "OK";

/// Sentinel returned by the client when the engine cannot be reached.
pub const DISCONNECTED: &str = "Disconnected";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("Invalid payload: {0}")]
  Payload(#[from] serde_json::Error),
  #[error("Missing argument for {0}")]
  MissingArgument(&'static str),
}

/// A parsed request line.
#[derive(Debug, Clone)]
pub enum Command {
  Status,
  GetStats,
  Search { query: String },
  GetTags,
  AddTag(Tag),
  DeleteTag { name: String },
  GetPartners,
  AddPartner(Partner),
  GetRules,
  AddRule(Rule),
  DeleteRule { id: String },
  Pause,
  Resume,
  Rebuild,
  Reindex { path: String },
  Shutdown,
  /// Anything unrecognized; answered with `OK` and otherwise ignored.
  Unknown(String),
}

impl Command {
  /// Parse one request line.
  pub fn parse(line: &str) -> Result<Self, ProtocolError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(' ') {
      Some((verb, rest)) => (verb, rest.trim()),
      None => (line, ""),
    };

    let command = match verb {
      "STATUS" => Self::Status,
      "GET_STATS" => Self::GetStats,
      "SEARCH" => Self::Search {
        query: rest.to_string(),
      },
      "GET_TAGS" => Self::GetTags,
      "ADD_TAG" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("ADD_TAG"));
        }
        Self::AddTag(serde_json::from_str(rest)?)
      }
      "DELETE_TAG" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("DELETE_TAG"));
        }
        Self::DeleteTag { name: rest.to_string() }
      }
      "GET_PARTNERS" => Self::GetPartners,
      "ADD_PARTNER" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("ADD_PARTNER"));
        }
        Self::AddPartner(serde_json::from_str(rest)?)
      }
      "GET_RULES" => Self::GetRules,
      "ADD_RULE" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("ADD_RULE"));
        }
        Self::AddRule(serde_json::from_str(rest)?)
      }
      "DELETE_RULE" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("DELETE_RULE"));
        }
        Self::DeleteRule { id: rest.to_string() }
      }
      "PAUSE" => Self::Pause,
      "RESUME" => Self::Resume,
      "REBUILD" => Self::Rebuild,
      "REINDEX" => {
        if rest.is_empty() {
          return Err(ProtocolError::MissingArgument("REINDEX"));
        }
        Self::Reindex { path: rest.to_string() }
      }
      "SHUTDOWN" => Self::Shutdown,
      _ => Self::Unknown(line.to_string()),
    };

    Ok(command)
  }
}

/// GET_STATS response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
  pub files_indexed: usize,
  pub total_tags: usize,
  pub total_partners: usize,
  pub queue_length: usize,
  #[serde(default)]
  pub last_error: Option<String>,
  pub status: String,
}
