//! CLI command implementations

mod admin;
mod daemon;
mod organize;
mod search;

pub use admin::{cmd_pause, cmd_rebuild, cmd_reindex, cmd_resume, cmd_stats, cmd_status, cmd_stop};
pub use daemon::cmd_daemon;
pub use organize::{
  cmd_partners_add, cmd_partners_list, cmd_rules_add, cmd_rules_delete, cmd_rules_list, cmd_tags_add, cmd_tags_delete,
  cmd_tags_list,
};
pub use search::cmd_search;
