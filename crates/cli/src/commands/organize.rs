//! Tag, rule, and partner management commands

use anyhow::{Context, Result};
use vantus_engine::{
  client::EngineClient,
  db::{Partner, Rule},
};

// ============================================================================
// Tags
// ============================================================================

pub async fn cmd_tags_list(json_output: bool) -> Result<()> {
  let tags = EngineClient::default().get_tags().await;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&tags)?);
    return Ok(());
  }

  if tags.is_empty() {
    println!("No tags.");
    return Ok(());
  }

  for tag in tags {
    println!("{}  [{}]", tag.name, tag.source);
  }
  Ok(())
}

pub async fn cmd_tags_add(name: &str) -> Result<()> {
  if EngineClient::default().add_tag(name).await {
    println!("Tag added: {name}");
  } else {
    println!("Engine did not accept the tag.");
  }
  Ok(())
}

pub async fn cmd_tags_delete(name: &str) -> Result<()> {
  if EngineClient::default().delete_tag(name).await {
    println!("Tag deleted: {name}");
  } else {
    println!("Engine did not accept the request.");
  }
  Ok(())
}

// ============================================================================
// Rules
// ============================================================================

pub async fn cmd_rules_list(json_output: bool) -> Result<()> {
  let rules = EngineClient::default().get_rules().await;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&rules)?);
    return Ok(());
  }

  if rules.is_empty() {
    println!("No rules.");
    return Ok(());
  }

  for rule in rules {
    let state = if rule.enabled { "enabled" } else { "disabled" };
    println!(
      "{}  {}  ({} conditions, {} actions, {})",
      rule.id,
      rule.name,
      rule.conditions.len(),
      rule.actions.len(),
      state
    );
  }
  Ok(())
}

pub async fn cmd_rules_add(json: &str) -> Result<()> {
  // Validate locally so the user gets a real parse error, not an ERR line
  let rule: Rule = serde_json::from_str(json).context("Invalid rule JSON")?;

  if EngineClient::default().add_rule(&rule).await {
    println!("Rule added: {}", rule.name);
  } else {
    println!("Engine did not accept the rule.");
  }
  Ok(())
}

pub async fn cmd_rules_delete(id: &str) -> Result<()> {
  if EngineClient::default().delete_rule(id).await {
    println!("Rule deleted: {id}");
  } else {
    println!("Engine did not accept the request.");
  }
  Ok(())
}

// ============================================================================
// Partners
// ============================================================================

pub async fn cmd_partners_list(json_output: bool) -> Result<()> {
  let partners = EngineClient::default().get_partners().await;

  if json_output {
    println!("{}", serde_json::to_string_pretty(&partners)?);
    return Ok(());
  }

  if partners.is_empty() {
    println!("No partners.");
    return Ok(());
  }

  for partner in partners {
    print!("{}  {}", partner.id, partner.name);
    if let Some(domains) = &partner.domains {
      print!("  domains: {domains}");
    }
    if let Some(keywords) = &partner.keywords {
      print!("  keywords: {keywords}");
    }
    println!();
  }
  Ok(())
}

pub async fn cmd_partners_add(name: &str, domains: Option<&str>, keywords: Option<&str>) -> Result<()> {
  let partner = Partner {
    id: String::new(),
    name: name.to_string(),
    domains: domains.map(str::to_string),
    keywords: keywords.map(str::to_string),
  };

  if EngineClient::default().add_partner(&partner).await {
    println!("Partner added: {name}");
  } else {
    println!("Engine did not accept the partner.");
  }
  Ok(())
}
