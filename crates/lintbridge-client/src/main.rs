//! Entry point for the `lintbridge` command-line client.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    lintbridge_client::run(std::env::args_os(), &mut stdout, &mut stderr)
}
