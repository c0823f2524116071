//! Entry point for the lintbridge analysis service.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match lintbridged::run_service() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Configuration errors arrive before the log subscriber exists.
            let _ = writeln!(io::stderr(), "lintbridged: {error}");
            ExitCode::FAILURE
        }
    }
}
