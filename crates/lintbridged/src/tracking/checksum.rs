//! Line-content checksums shared with the quality server.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tracing::debug;

use super::TRACKING_TARGET;

/// Lowercase hex MD5 of `text` with every checksum-whitespace character
/// removed (see `is_checksum_whitespace`).
///
/// Returns `None` for blank lines, which never take part in checksum
/// matching.
#[must_use]
pub fn line_hash(text: &str) -> Option<String> {
    let compact: String = text
        .chars()
        .filter(|&ch| !is_checksum_whitespace(ch))
        .collect();
    if compact.is_empty() {
        return None;
    }
    let digest = Md5::digest(compact.as_bytes());
    Some(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Whitespace as the quality server strips it before hashing.
///
/// This is Java's `Character.isWhitespace`, which differs from
/// [`char::is_whitespace`]: the file, group, record and unit separators
/// (U+001C to U+001F) count, while the no-break spaces (U+00A0, U+2007,
/// U+202F) and NEL (U+0085) do not.
#[must_use]
pub(crate) const fn is_checksum_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\t'..='\r'
            | '\u{1C}'..='\u{20}'
            | '\u{1680}'
            | '\u{2000}'..='\u{2006}'
            | '\u{2008}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Reads source lines under a base directory, caching each file once.
#[derive(Debug)]
pub(crate) struct SourceLines {
    base_dir: PathBuf,
    files: HashMap<String, Option<Vec<String>>>,
}

impl SourceLines {
    pub(crate) fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            files: HashMap::new(),
        }
    }

    /// Checksum of the 1-based `line` of `file`, when the line is readable.
    pub(crate) fn hash(&mut self, file: &str, line: u32) -> Option<String> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        let lines = self
            .files
            .entry(file.to_owned())
            .or_insert_with(|| read_lines(&self.base_dir, file))
            .as_ref()?;
        lines.get(index).and_then(|text| line_hash(text))
    }
}

fn read_lines(base_dir: &Path, file: &str) -> Option<Vec<String>> {
    let path = base_dir.join(file);
    match fs::read(&path) {
        Ok(bytes) => Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_owned)
                .collect(),
        ),
        Err(error) => {
            debug!(
                target: TRACKING_TARGET,
                path = %path.display(),
                error = %error,
                "source unreadable; findings in this file match without checksums"
            );
            None
        }
    }
}
