//! Configuration loading helpers for the lintbridge client.
//!
//! Configuration flags are split off the front of the argument list so
//! `ortho_config` only sees the flags it understands while `clap` parses the
//! subcommand and its own arguments.

use std::ffi::{OsStr, OsString};

use lintbridge_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the client.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags (listed in `CONFIG_CLI_FLAGS`) must appear before
    /// the subcommand. Later occurrences are left for the subcommand parser.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let argument_text = argument.to_string_lossy();
        if !argument_text.starts_with("--") {
            return FlagAction::Skip;
        }

        let (flag, has_inline_value) = match argument_text.split_once('=') {
            Some((flag, _)) => (flag, true),
            None => (&*argument_text, false),
        };

        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            return FlagAction::Include {
                needs_value: !has_inline_value,
            };
        }

        FlagAction::Skip
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut command_start = 1;
    let mut pending_value = false;

    for argument in args.iter().skip(1) {
        if pending_value {
            filtered.push(argument.clone());
            pending_value = false;
            command_start += 1;
            continue;
        }

        match OrthoConfigLoader::process_config_flag(argument.as_os_str()) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                command_start += 1;
                pending_value = needs_value;
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}
