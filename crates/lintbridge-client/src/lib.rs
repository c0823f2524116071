//! Client library and command-line front end for the lintbridge service.
//!
//! [`Channel`] multiplexes requests over one connection and routes each
//! response to the continuation registered for its correlation id.
//! [`Client`] layers the typed exchanges on top. [`run`] drives the
//! `lintbridge` binary: it splits configuration flags from the subcommand,
//! connects, initialises a session where the command needs one and renders
//! the outcome. Diagnostics go through `tracing` to the process's stderr,
//! filtered by the configured `log_filter`.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use lintbridge_config::Config;
use lintbridge_protocol::InitializeRequest;
use tracing::debug;

mod channel;
mod cli;
mod client;
mod config;
mod errors;
mod logging;
mod output;
mod transport;

pub use channel::{Channel, ChannelError, Continuation};
pub use cli::OutputFormat;
pub use client::{Client, ClientError, Reply, relative_inputs};
use cli::{Cli, CliCommand};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use transport::{Connection, TransportError, connect};

const TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `lintbridge_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--service-socket",
    "--log-filter",
    "--log-format",
    "--connection-policy",
    "--engine-command",
    "--engine-args",
    "--incompatible-rules",
    "--request-timeout-secs",
    "--toolchain-path",
    "--compiler-version",
    "--server-url",
    "--project-key",
    "--api-token",
    "--language-key",
];

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli_arguments = prepare_cli_arguments(&args, &split);

    let result = Cli::try_parse_from(cli_arguments)
        .map_err(AppError::CliUsage)
        .and_then(|cli| {
            loader
                .load(&split.config_arguments)
                .map(|config| (cli, config))
        })
        .and_then(|(cli, config)| logging::install(&config).map(|()| (cli, config)))
        .and_then(|(cli, config)| execute(cli.command, &config, stdout, stderr));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            // `--help` and `--version` render to stdout and succeed.
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            if error.is_service_not_running() {
                let _ = writeln!(
                    stderr,
                    "hint: start lintbridged or point --service-socket at a running instance"
                );
            }
            ExitCode::FAILURE
        }
    }
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if split.command_start < args.len() {
        cli_arguments.extend(args[split.command_start..].iter().cloned());
    }
    cli_arguments
}

fn execute<W, E>(
    command: CliCommand,
    config: &Config,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<(), AppError>
where
    W: Write,
    E: Write,
{
    let client = Client::connect(config.service_socket())?;
    debug!(target: TARGET, endpoint = %config.service_socket(), "connected");

    match command {
        CliCommand::Ping { text } => {
            let echoed = client.ping(text.into_bytes())?;
            writeln!(stdout, "{}", String::from_utf8_lossy(&echoed))?;
        }
        CliCommand::Initialize => {
            client.initialize(&initialize_request(config))?;
            writeln!(stdout, "initialized")?;
        }
        CliCommand::Analyze {
            base_dir,
            output,
            files,
        } => {
            let working_dir = std::env::current_dir().map_err(AppError::WorkingDirectory)?;
            let base_dir =
                base_dir.map_or_else(|| working_dir.clone(), |dir| working_dir.join(dir));
            let files = absolute_inputs(&working_dir, files);
            client.initialize(&initialize_request(config))?;
            let result = client.analyze(&base_dir, &files)?;
            output::render_analysis(&result, output, stdout, stderr)?;
        }
        CliCommand::Rules { output } => {
            client.initialize(&initialize_request(config))?;
            let rules = client.retrieve_rules()?;
            output::render_rules(&rules, output, stdout)?;
        }
        CliCommand::Quit => {
            client.quit()?;
            writeln!(stdout, "lintbridged is shutting down")?;
        }
    }

    client.close();
    stdout.flush()?;
    Ok(())
}

/// Builds the session settings from configuration; unset fields are sent
/// empty or omitted.
fn initialize_request(config: &Config) -> InitializeRequest {
    InitializeRequest {
        toolchain_path: config.toolchain_path.clone().unwrap_or_default(),
        compiler_version: config.compiler_version.clone().unwrap_or_default(),
        server_url: config.server_url().map(str::to_owned),
        project_key: config.project_key().map(str::to_owned),
        api_token: config.api_token.clone(),
        language_key: config.language_key.clone(),
    }
}

/// Anchors relative command-line paths at the working directory so that
/// [`relative_inputs`] can re-express them against the base directory.
fn absolute_inputs(working_dir: &Path, files: Vec<PathBuf>) -> Vec<PathBuf> {
    files
        .into_iter()
        .map(|file| {
            if file.is_absolute() {
                file
            } else {
                working_dir.join(file)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests;
