//! Rendering of analysis results and rule listings.

use std::io::Write;

use lintbridge_protocol::{AnalyzeResult, RuleInfo};

use crate::AppError;
use crate::cli::OutputFormat;

/// Writes findings to `stdout` and engine log lines to `stderr`.
pub(crate) fn render_analysis<W: Write, E: Write>(
    result: &AnalyzeResult,
    format: OutputFormat,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => write_json(result, stdout),
        OutputFormat::Human => {
            for line in &result.log_messages {
                writeln!(stderr, "{line}")?;
            }
            for issue in &result.issues {
                writeln!(
                    stdout,
                    "{}:{}:{}: {} [{}]",
                    issue.file,
                    issue.range.start_line,
                    issue.range.start_offset + 1,
                    issue.message,
                    issue.rule_key
                )?;
            }
            match result.issues.len() {
                0 => writeln!(stdout, "no issues found")?,
                1 => writeln!(stdout, "1 issue found")?,
                count => writeln!(stdout, "{count} issues found")?,
            }
            Ok(())
        }
    }
}

pub(crate) fn render_rules<W: Write>(
    rules: &[RuleInfo],
    format: OutputFormat,
    stdout: &mut W,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => write_json(&rules, stdout),
        OutputFormat::Human => {
            for rule in rules {
                writeln!(
                    stdout,
                    "{}\t{}\t{}\t{}",
                    rule.key, rule.severity, rule.rule_type, rule.name
                )?;
            }
            Ok(())
        }
    }
}

fn write_json<T: serde::Serialize, W: Write>(value: &T, stdout: &mut W) -> Result<(), AppError> {
    serde_json::to_writer(&mut *stdout, value).map_err(AppError::SerialiseOutput)?;
    writeln!(stdout)?;
    Ok(())
}
