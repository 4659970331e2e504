//! One module per `lapscache` subcommand.

pub mod audit_cmd;
pub mod clear;
pub mod completions;
pub mod config_cmd;
pub mod get;
pub mod init;
pub mod list;
pub mod version;
