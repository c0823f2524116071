//! Analyzer executed as a child process per analysis.
//!
//! The request is written to the child's stdin as one JSON line. The child
//! answers with one JSON line on stdout and may log to stderr; each stderr
//! line becomes a log message, with a leading `LEVEL:` tag rewritten to
//! `[LEVEL]`.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use tracing::{debug, info};

use lintbridge_protocol::Finding;

use super::{AnalysisEngine, ENGINE_TARGET, EngineError, EngineOutput, EngineRequest};

const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Engine that runs an external analyzer command for each analysis.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: String,
    args: Vec<String>,
    started: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzerResponse {
    #[serde(default)]
    findings: Vec<Finding>,
}

impl ProcessEngine {
    /// Builds an engine running `command` with `args`.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            started: false,
        }
    }

    fn io_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Io {
            command: self.command.clone(),
            source,
        }
    }

    fn spawn(&self) -> Result<Child, EngineError> {
        Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: self.command.clone(),
                source,
            })
    }

    fn run(&self, request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        let line = serde_json::to_string(request).map_err(EngineError::SerializeRequest)?;
        let mut child = self.spawn()?;
        debug!(
            target: ENGINE_TARGET,
            command = %self.command,
            files = request.input_files.len(),
            rules = request.active_rules.len(),
            "analyzer spawned"
        );

        let stderr = child.stderr.take().map(collect_log_lines);
        let exchanged = self.exchange(&mut child, &line);
        let waited = child.wait().map_err(|source| self.io_error(source));
        let log_messages = stderr
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        // A failed exit explains a broken pipe better than the pipe error does.
        let status = waited?;
        if !status.success() {
            return Err(EngineError::Exit {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }
        let response_line = exchanged?;
        let Some(response) = response_line else {
            return Err(EngineError::MissingOutput {
                command: self.command.clone(),
            });
        };

        let parsed: AnalyzerResponse =
            serde_json::from_str(&response).map_err(|source| EngineError::MalformedOutput {
                command: self.command.clone(),
                source,
            })?;
        Ok(EngineOutput {
            findings: parsed.findings,
            log_messages,
        })
    }

    /// Writes the request line and reads the response line.
    fn exchange(&self, child: &mut Child, line: &str) -> Result<Option<String>, EngineError> {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(line.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"))
                .and_then(|()| stdin.flush())
                .map_err(|source| self.io_error(source))?;
        }

        let Some(stdout) = child.stdout.take() else {
            return Ok(None);
        };
        let mut response = String::new();
        let read = BufReader::new(stdout)
            .read_line(&mut response)
            .map_err(|source| self.io_error(source))?;
        Ok((read > 0 && !response.trim().is_empty()).then_some(response))
    }
}

impl AnalysisEngine for ProcessEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        self.started = true;
        info!(
            target: ENGINE_TARGET,
            command = %self.command,
            "process engine ready"
        );
        Ok(())
    }

    fn analyze(&mut self, request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        if !self.started {
            return Err(EngineError::NotStarted);
        }
        self.run(request)
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.started = false;
        Ok(())
    }
}

/// Drains stderr on its own thread so a chatty analyzer never blocks on a
/// full pipe while the service waits for stdout.
fn collect_log_lines(stderr: ChildStderr) -> JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut text = String::new();
        if BufReader::new(stderr).read_to_string(&mut text).is_err() {
            return Vec::new();
        }
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(format_log_line)
            .collect()
    })
}

/// Rewrites `LEVEL: message` as `[LEVEL] message`; other lines pass through.
pub(super) fn format_log_line(line: &str) -> String {
    if let Some((level, message)) = line.split_once(':') {
        let tag = level.trim();
        if LOG_LEVELS.contains(&tag) {
            return format!("[{tag}] {}", message.trim_start());
        }
    }
    line.to_owned()
}
