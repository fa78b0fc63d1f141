//! Vantus CLI - incremental file indexing and semantic search

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{
  cmd_daemon, cmd_partners_add, cmd_partners_list, cmd_pause, cmd_rebuild, cmd_reindex, cmd_resume, cmd_rules_add,
  cmd_rules_delete, cmd_rules_list, cmd_search, cmd_stats, cmd_status, cmd_stop, cmd_tags_add, cmd_tags_delete,
  cmd_tags_list,
};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "vantus")]
#[command(about = "Incremental file indexing and semantic search")]
#[command(after_help = "\
QUICK START:
  vantus daemon                   # Start the engine in the background
  vantus reindex ~/Documents      # Monitor and index a directory
  vantus search \"quarterly plan\"  # Semantic search over indexed files

COMMON WORKFLOWS:
  vantus status                   # Check what the engine is doing
  vantus stats                    # Index size and health
  vantus pause / vantus resume    # Hold or release indexing
  vantus stop                     # Shut the engine down")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `vantus tags`
#[derive(Subcommand)]
pub enum TagsCommand {
  /// List all tags
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Add a tag
  Add {
    /// Tag name
    name: String,
  },
  /// Delete a tag (and its file links)
  Delete {
    /// Tag name
    name: String,
  },
}

/// Subcommands for `vantus rules`
#[derive(Subcommand)]
pub enum RulesCommand {
  /// List all rules
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Add a rule from a JSON definition
  Add {
    /// Rule as JSON: {"name":..., "conditions":[...], "actions":[...]}
    json: String,
  },
  /// Delete a rule by id
  Delete {
    /// Rule id
    id: String,
  },
}

/// Subcommands for `vantus partners`
#[derive(Subcommand)]
pub enum PartnersCommand {
  /// List all partners
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Add a partner
  Add {
    /// Partner name
    name: String,
    /// Comma-separated domains
    #[arg(long)]
    domains: Option<String>,
    /// Comma-separated keywords
    #[arg(long)]
    keywords: Option<String>,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Start the engine
  Daemon {
    /// Run attached to the terminal instead of detaching
    #[arg(long)]
    foreground: bool,
    /// Run the engine loop in this process (used by the detached spawn)
    #[arg(long, hide = true)]
    background: bool,
  },
  /// Show what the engine is doing (Indexing / Paused / Idle)
  Status,
  /// Show index statistics
  Stats {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Semantic search over indexed files
  #[command(after_help = "\
EXAMPLES:
  vantus search \"tax documents 2025\"
  vantus search \"meeting notes\" --json")]
  Search {
    /// Search query
    query: String,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Manage tags
  Tags {
    #[command(subcommand)]
    command: TagsCommand,
  },
  /// Manage organization rules
  Rules {
    #[command(subcommand)]
    command: RulesCommand,
  },
  /// Manage partners
  Partners {
    #[command(subcommand)]
    command: PartnersCommand,
  },
  /// Pause indexing (events queue up)
  Pause,
  /// Resume indexing
  Resume,
  /// Re-scan all monitored roots
  Rebuild,
  /// Start monitoring and indexing a path
  Reindex {
    /// Directory (or file) to index
    path: String,
  },
  /// Shut the engine down
  Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // File logging for the engine process, console-only otherwise
  let _guard = match &cli.command {
    Commands::Daemon { foreground, .. } => init_daemon_logging(*foreground),
    _ => {
      init_cli_logging();
      None
    }
  };

  match cli.command {
    Commands::Daemon { foreground, background } => cmd_daemon(foreground, background).await,
    Commands::Status => cmd_status().await,
    Commands::Stats { json } => cmd_stats(json).await,
    Commands::Search { query, json } => cmd_search(&query, json).await,

    Commands::Tags { command } => match command {
      TagsCommand::List { json } => cmd_tags_list(json).await,
      TagsCommand::Add { name } => cmd_tags_add(&name).await,
      TagsCommand::Delete { name } => cmd_tags_delete(&name).await,
    },

    Commands::Rules { command } => match command {
      RulesCommand::List { json } => cmd_rules_list(json).await,
      RulesCommand::Add { json } => cmd_rules_add(&json).await,
      RulesCommand::Delete { id } => cmd_rules_delete(&id).await,
    },

    Commands::Partners { command } => match command {
      PartnersCommand::List { json } => cmd_partners_list(json).await,
      PartnersCommand::Add {
        name,
        domains,
        keywords,
      } => cmd_partners_add(&name, domains.as_deref(), keywords.as_deref()).await,
    },

    Commands::Pause => cmd_pause().await,
    Commands::Resume => cmd_resume().await,
    Commands::Rebuild => cmd_rebuild().await,
    Commands::Reindex { path } => cmd_reindex(&path).await,
    Commands::Stop => cmd_stop().await,
  }
}
