//! Test support for the lintbridge client.
//!
//! Supplies a scripted fake service, a fixed configuration loader and a world
//! that captures CLI output so tests stay focused on their assertions.

mod fake_service;

use std::cell::RefCell;
use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use lintbridge_config::{Config, SocketEndpoint};
use lintbridge_protocol::Category;
use rstest::fixture;
use tempfile::TempDir;

use crate::{AppError, ConfigLoader, run_with_loader};

pub(super) use fake_service::{FakeService, Recorded, Scripted};

/// A config loader that returns a fixed configuration.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Port with nothing listening on it.
pub(super) fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind spare port");
    listener.local_addr().expect("spare addr").port()
}

/// CLI state, the fake service and captured output.
#[derive(Default)]
pub(super) struct TestWorld {
    pub config: Config,
    pub overrides: Vec<(Category, Scripted)>,
    pub service: Option<FakeService>,
    pub workspace: Option<TempDir>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
}

impl TestWorld {
    pub fn script(&mut self, request: Category, response: Scripted) {
        self.overrides.push((request, response));
    }

    pub fn start_service(&mut self) -> Result<()> {
        let service = FakeService::spawn(std::mem::take(&mut self.overrides))?;
        self.config.service_socket = SocketEndpoint::tcp("127.0.0.1", service.port());
        self.service = Some(service);
        Ok(())
    }

    pub fn point_at_closed_port(&mut self) {
        self.config.service_socket = SocketEndpoint::tcp("127.0.0.1", closed_port());
    }

    /// Creates a workspace directory and returns its path as a string.
    pub fn workspace(&mut self) -> Result<String> {
        if self.workspace.is_none() {
            self.workspace = Some(TempDir::new().context("create workspace")?);
        }
        let dir = self.workspace.as_ref().context("workspace")?;
        Ok(dir.path().to_string_lossy().into_owned())
    }

    pub fn run(&mut self, command: &str) -> Result<()> {
        let mut args = vec![OsString::from("lintbridge")];
        for token in command.split_whitespace() {
            let token = if token == "$WORKSPACE" {
                self.workspace()?
            } else {
                token.replace("$WORKSPACE", &self.workspace()?)
            };
            args.push(OsString::from(token));
        }
        let loader = StaticConfigLoader::new(self.config.clone());
        self.stdout.clear();
        self.stderr.clear();
        let exit = run_with_loader(args, &mut self.stdout, &mut self.stderr, &loader);
        self.exit_code = Some(exit);
        Ok(())
    }

    pub fn requests(&mut self) -> Result<Vec<Recorded>> {
        let service = self.service.as_mut().context("fake service not started")?;
        service.take_requests()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
