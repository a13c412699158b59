//! Report files: reference timing parsing, the per-run report writer, and
//! the per-unit summary.
//!
//! A run's report starts with `SERVER:` and `IN_FILE:` header lines, then
//! one tab-separated line per case. The report is flushed after every case so
//! a killed run still leaves a usable partial report — which is exactly what
//! the next run loads back as its reference timings.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::compare::Verdict;
use crate::error::{Result, SvcdiffError};

/// Reference timing record for one (unit, case) pair, loaded from a prior
/// run's report.
#[derive(Debug, Clone, PartialEq)]
pub struct RefTiming {
    pub elapsed: f64,
    pub status: String,
}

/// Parse a prior run's report into reference timings.
///
/// A missing report yields an empty map (no reference timings, nothing is
/// flagged). Header lines are skipped; data lines need at least 4 columns,
/// read as (status, elapsed`s`, [pct-change,] unit, case). Lines whose
/// elapsed value does not parse are skipped with a diagnostic.
pub fn load_ref_timings(path: &Path) -> HashMap<(String, String), RefTiming> {
    let mut timings = HashMap::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        debug!(path = %path.display(), "no reference report");
        return timings;
    };

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("SERVER:") || line.starts_with("IN_FILE:") {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        let (status, elapsed_str, unit, case) = match parts.as_slice() {
            // Baseline reports have no percent-change column.
            [status, elapsed, unit, case, ..] if parts.len() == 4 => {
                (*status, *elapsed, *unit, *case)
            }
            [status, elapsed, _pct, unit, case, ..] => (*status, *elapsed, *unit, *case),
            _ => {
                debug!(line_no = idx + 1, "skipping short reference report line");
                continue;
            }
        };

        let Ok(elapsed) = elapsed_str.trim_end_matches('s').parse::<f64>() else {
            warn!(
                line_no = idx + 1,
                elapsed = elapsed_str,
                "skipping reference report line with unparsable elapsed time"
            );
            continue;
        };

        timings.insert(
            (unit.to_string(), case.to_string()),
            RefTiming {
                elapsed,
                status: status.to_string(),
            },
        );
    }

    debug!(count = timings.len(), path = %path.display(), "loaded reference timings");
    timings
}

/// Per-run report file, appended to incrementally and flushed after every
/// case.
#[derive(Debug)]
pub struct ReportWriter {
    writer: BufWriter<File>,
}

impl ReportWriter {
    pub fn create(path: &Path, server: &str, in_file: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| SvcdiffError::write(path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "SERVER:{server}").map_err(|e| SvcdiffError::write(path, e))?;
        writeln!(writer, "IN_FILE:{}", in_file.display())
            .map_err(|e| SvcdiffError::write(path, e))?;
        writer.flush().map_err(|e| SvcdiffError::write(path, e))?;
        Ok(Self { writer })
    }

    /// Append one case line and flush, so a later fatal error cannot lose it.
    pub fn write_case(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

/// Per-unit pass/fail/http tallies, accumulated across a run.
///
/// An explicit value threaded through the per-case step, so the pipeline
/// stays free of ambient state. Units keep first-seen order for the summary.
#[derive(Debug, Default)]
pub struct UnitCounters {
    units: Vec<(String, UnitTally)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnitTally {
    pub pass: u32,
    pub fail: u32,
    pub http: u32,
}

impl UnitCounters {
    pub fn record(&mut self, unit: &str, verdict: Verdict) {
        let idx = match self.units.iter().position(|(name, _)| name == unit) {
            Some(idx) => idx,
            None => {
                self.units.push((unit.to_string(), UnitTally::default()));
                self.units.len() - 1
            }
        };
        let tally = &mut self.units[idx].1;
        match verdict {
            Verdict::Pass => tally.pass += 1,
            Verdict::Fail => tally.fail += 1,
            Verdict::Http => tally.http += 1,
            Verdict::Skip => {}
        }
    }

    pub fn get(&self, unit: &str) -> Option<UnitTally> {
        self.units
            .iter()
            .find(|(name, _)| name == unit)
            .map(|(_, tally)| *tally)
    }

    /// Formatted summary lines, one per unit in first-seen order.
    pub fn summary_lines(&self) -> Vec<String> {
        self.units
            .iter()
            .map(|(unit, tally)| {
                format!(
                    "{unit}\tPASS: {}\tFAIL: {}\tHTTP: {}",
                    tally.pass, tally.fail, tally.http
                )
            })
            .collect()
    }
}

/// Write the end-of-run summary file and return its data lines for echoing.
pub fn write_summary(
    path: &Path,
    server: &str,
    in_file: &Path,
    counters: &UnitCounters,
) -> Result<Vec<String>> {
    let lines = counters.summary_lines();
    let mut content = format!("SERVER:{server}\nIN_FILE:{}\n", in_file.display());
    for line in &lines {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| SvcdiffError::write(path, e))?;
    Ok(lines)
}
