use std::path::PathBuf;

use clap::{Parser, Subcommand};

const ABOUT: &str = "Welcome to the great_expectations CLI!

Most commands follow this format: great_expectations <NOUN> <VERB>

The nouns are: datasource, store, validation-operator, project,
usage-statistics. Most nouns accept the verb `list`.";

#[derive(Debug, Parser)]
#[command(name = "great_expectations", version, about = ABOUT)]
pub struct Cli {
    /// Set great_expectations to use verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project configuration file [default: great_expectations.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new project configuration file
    Init,
    /// Datasource operations
    #[command(subcommand)]
    Datasource(ListCommand),
    /// Store operations
    #[command(subcommand)]
    Store(ListCommand),
    /// Validation Operator operations
    #[command(subcommand)]
    ValidationOperator(ListCommand),
    /// Project operations
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Anonymous usage statistics
    #[command(subcommand)]
    UsageStatistics(UsageStatisticsCommand),
}

#[derive(Debug, Subcommand)]
pub enum ListCommand {
    /// List the configured entries
    List,
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Construct a project context, then optionally sleep
    Instantiate {
        /// Seconds to sleep after construction; interrupted by Ctrl-C
        #[arg(long, default_value_t = 0)]
        nap_seconds: u64,
        /// Send usage statistics to an unreachable collector
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum UsageStatisticsCommand {
    /// Show the effective usage statistics settings
    Status,
    /// POST one JSON record from FILE to the collector and print its answer
    Send {
        file: PathBuf,
    },
}
