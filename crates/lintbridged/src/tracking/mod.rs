//! Reconciliation of fresh findings against resolved server-side findings.
//!
//! Fresh findings and resolved findings are wrapped in a common
//! [`Trackable`] view and paired by successive matching passes, strictest
//! first. Each pass walks the still-unmatched fresh items in input order and
//! gives each one the earliest unconsumed resolved item sharing its key. A
//! fresh item that pairs with anything is suppressed; the rest are returned
//! in their original order.
//!
//! The passes are:
//!
//! 1. rule, file, start line and identical range;
//! 2. rule, file and start line;
//! 3. rule, file and line checksum, ignoring the line number.
//!
//! An item missing a component of a pass key (no line, no range, no
//! checksum) sits that pass out.

mod checksum;

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use tracing::debug;

use lintbridge_protocol::{Finding, TextRange};

use crate::server::ResolvedFinding;

pub use self::checksum::line_hash;
use self::checksum::SourceLines;

pub(crate) const TRACKING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tracking");

/// Uniform view of a finding used purely for matching.
pub trait Trackable {
    /// Fully qualified rule key.
    fn rule_key(&self) -> &str;
    /// Path relative to the project root.
    fn file(&self) -> &str;
    /// 1-based start line, if known.
    fn line(&self) -> Option<u32>;
    /// Exact location, if known.
    fn range(&self) -> Option<TextRange>;
    /// Message text.
    fn message(&self) -> &str;
    /// Checksum of the flagged line's content, if known.
    fn line_hash(&self) -> Option<&str>;
}

/// Finding produced by the current analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshTrackable {
    finding: Finding,
    line_hash: Option<String>,
}

impl FreshTrackable {
    /// Wraps `finding` with the checksum of its start line.
    #[must_use]
    pub const fn new(finding: Finding, line_hash: Option<String>) -> Self {
        Self { finding, line_hash }
    }

    /// Wrapped finding.
    #[must_use]
    pub const fn finding(&self) -> &Finding {
        &self.finding
    }

    /// Unwraps the finding.
    #[must_use]
    pub fn into_finding(self) -> Finding {
        self.finding
    }
}

impl Trackable for FreshTrackable {
    fn rule_key(&self) -> &str {
        &self.finding.rule_key
    }

    fn file(&self) -> &str {
        &self.finding.file
    }

    fn line(&self) -> Option<u32> {
        Some(self.finding.line()).filter(|line| *line > 0)
    }

    fn range(&self) -> Option<TextRange> {
        Some(self.finding.range).filter(|range| *range != TextRange::default())
    }

    fn message(&self) -> &str {
        &self.finding.message
    }

    fn line_hash(&self) -> Option<&str> {
        self.line_hash.as_deref()
    }
}

/// Finding the quality server already recorded as resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownTrackable {
    resolved: ResolvedFinding,
}

impl KnownTrackable {
    /// Wraps a resolved finding.
    #[must_use]
    pub const fn new(resolved: ResolvedFinding) -> Self {
        Self { resolved }
    }
}

impl From<ResolvedFinding> for KnownTrackable {
    fn from(resolved: ResolvedFinding) -> Self {
        Self::new(resolved)
    }
}

impl Trackable for KnownTrackable {
    fn rule_key(&self) -> &str {
        &self.resolved.rule_key
    }

    fn file(&self) -> &str {
        &self.resolved.file
    }

    fn line(&self) -> Option<u32> {
        self.resolved.line
    }

    fn range(&self) -> Option<TextRange> {
        self.resolved.range
    }

    fn message(&self) -> &str {
        &self.resolved.message
    }

    fn line_hash(&self) -> Option<&str> {
        self.resolved.line_hash.as_deref()
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum MatchKey<'a> {
    LineAndRange(&'a str, &'a str, u32, TextRange),
    Line(&'a str, &'a str, u32),
    Checksum(&'a str, &'a str, &'a str),
}

type Pass = for<'a> fn(&'a dyn Trackable) -> Option<MatchKey<'a>>;

fn line_and_range(item: &dyn Trackable) -> Option<MatchKey<'_>> {
    Some(MatchKey::LineAndRange(
        item.rule_key(),
        item.file(),
        item.line()?,
        item.range()?,
    ))
}

fn line(item: &dyn Trackable) -> Option<MatchKey<'_>> {
    Some(MatchKey::Line(item.rule_key(), item.file(), item.line()?))
}

fn checksum(item: &dyn Trackable) -> Option<MatchKey<'_>> {
    Some(MatchKey::Checksum(
        item.rule_key(),
        item.file(),
        item.line_hash()?,
    ))
}

const PASSES: [Pass; 3] = [line_and_range, line, checksum];

/// Returns the fresh items that pair with no known item, in input order.
///
/// Every known item pairs with at most one fresh item. The result depends
/// only on the inputs and their order.
pub fn unmatched<F, K>(fresh: Vec<F>, known: &[K]) -> Vec<F>
where
    F: Trackable,
    K: Trackable,
{
    let mut matched = vec![false; fresh.len()];
    let mut consumed = vec![false; known.len()];

    for pass in PASSES {
        let mut candidates: HashMap<MatchKey<'_>, VecDeque<usize>> = HashMap::new();
        for (index, item) in known.iter().enumerate() {
            if consumed.get(index).copied().unwrap_or(true) {
                continue;
            }
            if let Some(key) = pass(item) {
                candidates.entry(key).or_default().push_back(index);
            }
        }
        if candidates.is_empty() {
            continue;
        }

        for (item, is_matched) in fresh.iter().zip(matched.iter_mut()) {
            if *is_matched {
                continue;
            }
            let Some(key) = pass(item) else { continue };
            let Some(known_index) = candidates.get_mut(&key).and_then(VecDeque::pop_front) else {
                continue;
            };
            if let Some(slot) = consumed.get_mut(known_index) {
                *slot = true;
            }
            *is_matched = true;
        }
    }

    fresh
        .into_iter()
        .zip(matched)
        .filter_map(|(item, is_matched)| (!is_matched).then_some(item))
        .collect()
}

/// Drops every finding that a resolved finding already accounts for.
///
/// Line checksums for fresh findings are computed from the sources under
/// `base_dir`; unreadable files simply contribute no checksum.
#[must_use]
pub fn reconcile(
    base_dir: &Path,
    findings: Vec<Finding>,
    resolved: Vec<ResolvedFinding>,
) -> Vec<Finding> {
    if resolved.is_empty() {
        return findings;
    }
    let total = findings.len();
    let mut sources = SourceLines::new(base_dir);
    let fresh: Vec<FreshTrackable> = findings
        .into_iter()
        .map(|finding| {
            let hash = sources.hash(&finding.file, finding.line());
            FreshTrackable::new(finding, hash)
        })
        .collect();
    let known: Vec<KnownTrackable> = resolved.into_iter().map(KnownTrackable::new).collect();

    let kept: Vec<Finding> = unmatched(fresh, &known)
        .into_iter()
        .map(FreshTrackable::into_finding)
        .collect();
    debug!(
        target: TRACKING_TARGET,
        fresh = total,
        known = known.len(),
        suppressed = total - kept.len(),
        "reconciled findings"
    );
    kept
}
