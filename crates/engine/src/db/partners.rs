//! Partner directory operations.

use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
  EngineDb, Result, escape_sql,
  files::{optional_string, required_string},
  schema::partners_schema,
};

/// An external organization files can be associated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
  #[serde(default)]
  pub id: String,
  pub name: String,
  /// Comma-separated email/web domains.
  #[serde(default)]
  pub domains: Option<String>,
  /// Comma-separated match keywords.
  #[serde(default)]
  pub keywords: Option<String>,
}

impl EngineDb {
  /// Add a partner, assigning an id when the payload carries none.
  #[tracing::instrument(level = "trace", skip(self, partner), fields(name = %partner.name))]
  pub async fn add_partner(&self, partner: &Partner) -> Result<Partner> {
    let _guard = self.write_guard().await;

    let stored = Partner {
      id: if partner.id.is_empty() {
        Uuid::new_v4().to_string()
      } else {
        partner.id.clone()
      },
      ..partner.clone()
    };

    let table = self.partners_table().await?;
    let _ = table.delete(&format!("id = '{}'", escape_sql(&stored.id))).await;

    let batch = RecordBatch::try_new(
      partners_schema(),
      vec![
        Arc::new(StringArray::from(vec![stored.id.clone()])),
        Arc::new(StringArray::from(vec![stored.name.clone()])),
        Arc::new(StringArray::from(vec![stored.domains.clone()])),
        Arc::new(StringArray::from(vec![stored.keywords.clone()])),
      ],
    )?;
    table
      .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], partners_schema())))
      .execute()
      .await?;

    Ok(stored)
  }

  /// List all partners.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_partners(&self) -> Result<Vec<Partner>> {
    let table = self.partners_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut partners = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        partners.push(Partner {
          id: required_string(&batch, "id", i)?,
          name: required_string(&batch, "name", i)?,
          domains: optional_string(&batch, "domains", i),
          keywords: optional_string(&batch, "keywords", i),
        });
      }
    }

    Ok(partners)
  }

  /// Count of partners.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn count_partners(&self) -> Result<usize> {
    let table = self.partners_table().await?;
    Ok(table.count_rows(None).await?)
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  async fn create_test_db() -> (TempDir, EngineDb) {
    let temp_dir = TempDir::new().unwrap();
    let db = EngineDb::open_at_path(temp_dir.path().join("test.lancedb"), 4)
      .await
      .unwrap();
    (temp_dir, db)
  }

  #[tokio::test]
  async fn test_add_and_list_partners() {
    let (_temp, db) = create_test_db().await;

    let partner = Partner {
      id: String::new(),
      name: "Acme Corp".to_string(),
      domains: Some("acme.com".to_string()),
      keywords: None,
    };

    let stored = db.add_partner(&partner).await.unwrap();
    assert!(!stored.id.is_empty());

    let partners = db.list_partners().await.unwrap();
    assert_eq!(partners.len(), 1);
    assert_eq!(partners[0].name, "Acme Corp");
    assert_eq!(partners[0].domains.as_deref(), Some("acme.com"));
    assert!(partners[0].keywords.is_none());
  }

  #[tokio::test]
  async fn test_count_partners() {
    let (_temp, db) = create_test_db().await;
    assert_eq!(db.count_partners().await.unwrap(), 0);

    db.add_partner(&Partner {
      id: String::new(),
      name: "Acme Corp".to_string(),
      domains: None,
      keywords: None,
    })
    .await
    .unwrap();

    assert_eq!(db.count_partners().await.unwrap(), 1);
  }

  #[test]
  fn test_partner_json_defaults() {
    let parsed: Partner = serde_json::from_str(r#"{"name":"Acme"}"#).unwrap();
    assert_eq!(parsed.name, "Acme");
    assert!(parsed.domains.is_none());
  }
}
