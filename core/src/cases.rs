//! Test case list model, parsing, and name filtering.
//!
//! The case list is a tab-separated text file. Each data line is either the
//! legacy 3-column form (`unit`, `case`, `url`) or the 7-column hierarchical
//! form used by the taxon-history family (`bin_no`, `tax_id`, `bin_name`,
//! `key_taxon`, `unit`, `case`, `url`). Lines starting with `#` and blank
//! lines are skipped. Both forms parse into the same [`TestCase`] shape.

use std::path::Path;

use regex_lite::Regex;
use tracing::debug;

use crate::error::{Result, SvcdiffError};

/// Case family whose outputs are stored under nested per-bin directories and
/// whose payloads go through schema canonicalization.
pub const TAXON_HISTORY_CASE_PREFIX: &str = "taxonomyHistoryRegression";

/// Hierarchical storage key carried by 7-column case lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    pub bin: String,
    pub key_taxon: String,
}

/// One named test case. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub unit: String,
    pub case: String,
    pub url: String,
    /// Present only for the hierarchical 7-column form.
    pub storage: Option<StorageKey>,
}

impl TestCase {
    /// Whether this case's payload is a taxonomic history object that must be
    /// schema-canonicalized before diffing.
    pub fn is_taxon_history(&self) -> bool {
        self.unit == "taxonomy" && self.case.starts_with(TAXON_HISTORY_CASE_PREFIX)
    }
}

/// Load and parse the case list file.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path).map_err(|e| SvcdiffError::read(path, e))?;

    let mut cases = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        cases.push(parse_line(path, idx + 1, line)?);
    }
    Ok(cases)
}

fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<TestCase> {
    let parts: Vec<&str> = line.split('\t').collect();
    match parts.as_slice() {
        [unit, case, url] => Ok(TestCase {
            unit: unit.trim().to_string(),
            case: case.trim().to_string(),
            url: url.trim().to_string(),
            storage: None,
        }),
        [_bin_no, _tax_id, bin_name, key_taxon, unit, case, url] => Ok(TestCase {
            unit: unit.trim().to_string(),
            case: case.trim().to_string(),
            url: url.trim().to_string(),
            storage: Some(StorageKey {
                bin: bin_name.trim().to_string(),
                key_taxon: key_taxon.trim().to_string(),
            }),
        }),
        other => Err(SvcdiffError::MalformedCaseLine {
            path: path.to_path_buf(),
            line_no,
            reason: format!("expected 3 or 7 tab-separated columns, got {}", other.len()),
        }),
    }
}

/// Case-insensitive include/exclude filtering against unit or case name.
#[derive(Debug, Default)]
pub struct CaseFilter {
    only: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl CaseFilter {
    pub fn new(only: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            only: compile_patterns(only)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    /// Keep a case when it matches at least one include pattern (or none were
    /// given) and matches no exclude pattern.
    pub fn matches(&self, case: &TestCase) -> bool {
        let hit = |rx: &Regex| rx.is_match(&case.unit) || rx.is_match(&case.case);
        if !self.only.is_empty() && !self.only.iter().any(hit) {
            return false;
        }
        !self.exclude.iter().any(hit)
    }

    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        let kept: Vec<TestCase> = cases.into_iter().filter(|tc| self.matches(tc)).collect();
        debug!(kept = kept.len(), "filtered case list");
        kept
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pat| {
            Regex::new(&format!("(?i){pat}")).map_err(|e| SvcdiffError::InvalidPattern {
                pattern: pat.clone(),
                source: e,
            })
        })
        .collect()
}
