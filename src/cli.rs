// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `trygraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "trygraph",
    version,
    about = "Plan, create and inspect build/test task graphs of try jobs.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TRYGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Validate a job file and print its graph in evaluation order.
    Plan {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },

    /// Persist a job file's graph into a store directory.
    Create {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "DIR")]
        store: PathBuf,
    },

    /// Print the status report of a stored job as JSON.
    Status {
        #[arg(long, value_name = "ID")]
        job: String,

        #[arg(long, value_name = "DIR")]
        store: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
