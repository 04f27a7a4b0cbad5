//! # great_expectations command line
//!
//! Command group, console formatting and the project context whose usage
//! events are delivered by `usage_statistics`.

pub mod cli;
pub mod commands;
pub mod context;
pub mod util;

pub use cli::Cli;
pub use context::ProjectContext;
