//! Command-line interface definitions for the lintbridge client.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for analysis findings and rule listings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// One line per finding or rule.
    #[default]
    Human,
    /// The service's JSON payload.
    Json,
}

/// Command-line client for the lintbridge analysis service.
///
/// Configuration flags such as `--service-socket` must come before the
/// subcommand.
#[derive(Parser, Debug)]
#[command(name = "lintbridge", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Checks that the service answers.
    Ping {
        /// Text echoed back by the service.
        #[arg(default_value = "ping")]
        text: String,
    },
    /// Sends the configured initialize settings and reports the outcome.
    Initialize,
    /// Initialises a session and analyses the given files.
    Analyze {
        /// Directory the input files are resolved against; defaults to the
        /// working directory.
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,
        /// How findings are printed.
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        output: OutputFormat,
        /// Files to analyse.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Initialises a session and lists the project's rules.
    Rules {
        /// How rules are printed.
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        output: OutputFormat,
    },
    /// Asks the service to shut down.
    Quit,
}
