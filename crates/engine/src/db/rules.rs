//! Organization rule operations.
//!
//! A rule is an ordered list of conditions plus an ordered list of actions.
//! `match_any` selects OR semantics over the conditions; the default is AND.

use std::sync::Arc;

use arrow_array::{BooleanArray, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DbError, EngineDb, Result, escape_sql, files::required_string, schema::rules_schema};

/// One predicate over file attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
  /// Attribute to test: "extension", "name", "path", "tag", ...
  pub field: String,
  /// Comparison: "equals", "contains", "startsWith", "endsWith"
  pub op: String,
  pub value: String,
}

/// One effect applied when a rule matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
  /// Effect kind: "addTag", "move", "notify", ...
  pub kind: String,
  pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
  #[serde(default)]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub conditions: Vec<RuleCondition>,
  #[serde(default)]
  pub actions: Vec<RuleAction>,
  #[serde(default)]
  pub match_any: bool,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
}

fn default_enabled() -> bool {
  true
}

impl EngineDb {
  /// Add a rule, assigning an id when the payload carries none.
  #[tracing::instrument(level = "trace", skip(self, rule), fields(name = %rule.name))]
  pub async fn add_rule(&self, rule: &Rule) -> Result<Rule> {
    let _guard = self.write_guard().await;

    let stored = Rule {
      id: if rule.id.is_empty() {
        Uuid::new_v4().to_string()
      } else {
        rule.id.clone()
      },
      ..rule.clone()
    };

    let table = self.rules_table().await?;
    let _ = table.delete(&format!("id = '{}'", escape_sql(&stored.id))).await;

    let batch = rule_to_batch(&stored)?;
    table
      .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], rules_schema())))
      .execute()
      .await?;

    Ok(stored)
  }

  /// List all rules.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn list_rules(&self) -> Result<Vec<Rule>> {
    let table = self.rules_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut rules = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        rules.push(batch_to_rule(&batch, i)?);
      }
    }

    Ok(rules)
  }

  /// Delete a rule by id. Unknown ids are a no-op.
  #[tracing::instrument(level = "trace", skip(self))]
  pub async fn delete_rule(&self, id: &str) -> Result<()> {
    let _guard = self.write_guard().await;
    let table = self.rules_table().await?;
    table.delete(&format!("id = '{}'", escape_sql(id))).await?;
    Ok(())
  }
}

fn rule_to_batch(rule: &Rule) -> Result<RecordBatch> {
  let conditions = serde_json::to_string(&rule.conditions)?;
  let actions = serde_json::to_string(&rule.actions)?;

  let batch = RecordBatch::try_new(
    rules_schema(),
    vec![
      Arc::new(StringArray::from(vec![rule.id.clone()])),
      Arc::new(StringArray::from(vec![rule.name.clone()])),
      Arc::new(StringArray::from(vec![conditions])),
      Arc::new(StringArray::from(vec![actions])),
      Arc::new(BooleanArray::from(vec![rule.match_any])),
      Arc::new(BooleanArray::from(vec![rule.enabled])),
    ],
  )?;

  Ok(batch)
}

fn batch_to_rule(batch: &RecordBatch, row: usize) -> Result<Rule> {
  let conditions_json = required_string(batch, "conditions", row)?;
  let actions_json = required_string(batch, "actions", row)?;

  let match_any = required_bool(batch, "match_any", row)?;
  let enabled = required_bool(batch, "enabled", row)?;

  Ok(Rule {
    id: required_string(batch, "id", row)?,
    name: required_string(batch, "name", row)?,
    conditions: serde_json::from_str(&conditions_json)?,
    actions: serde_json::from_str(&actions_json)?,
    match_any,
    enabled,
  })
}

fn required_bool(batch: &RecordBatch, column: &str, row: usize) -> Result<bool> {
  batch
    .column_by_name(column)
    .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("{column} column")))
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

  fn sample_rule() -> Rule {
    Rule {
      id: String::new(),
      name: "Tag invoices".to_string(),
      conditions: vec![RuleCondition {
        field: "name".to_string(),
        op: "contains".to_string(),
        value: "invoice".to_string(),
      }],
      actions: vec![RuleAction {
        kind: "addTag".to_string(),
        value: "Finance".to_string(),
      }],
      match_any: false,
      enabled: true,
    }
  }

  #[tokio::test]
  async fn test_add_and_list_rules() {
    let (_temp, db) = create_test_db().await;

    let stored = db.add_rule(&sample_rule()).await.unwrap();
    assert!(!stored.id.is_empty());

    let rules = db.list_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].conditions, stored.conditions);
    assert_eq!(rules[0].actions, stored.actions);
    assert!(rules[0].enabled);
  }

  #[tokio::test]
  async fn test_delete_rule() {
    let (_temp, db) = create_test_db().await;

    let stored = db.add_rule(&sample_rule()).await.unwrap();
    db.delete_rule(&stored.id).await.unwrap();
    assert!(db.list_rules().await.unwrap().is_empty());

    // Unknown id is a no-op
    db.delete_rule("no-such-rule").await.unwrap();
  }

  #[tokio::test]
  async fn test_condition_order_is_preserved() {
    let (_temp, db) = create_test_db().await;

    let mut rule = sample_rule();
    rule.conditions.push(RuleCondition {
      field: "extension".to_string(),
      op: "equals".to_string(),
      value: "pdf".to_string(),
    });
    db.add_rule(&rule).await.unwrap();

    let rules = db.list_rules().await.unwrap();
    assert_eq!(rules[0].conditions[0].field, "name");
    assert_eq!(rules[0].conditions[1].field, "extension");
  }

  #[test]
  fn test_rule_json_defaults() {
    let parsed: Rule = serde_json::from_str(r#"{"name":"Minimal"}"#).unwrap();
    assert!(parsed.enabled, "Rules default to enabled");
    assert!(!parsed.match_any, "Conditions default to AND semantics");
    assert!(parsed.conditions.is_empty());
  }
}
