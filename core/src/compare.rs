//! Comparator: renders diff artifacts between two canonical renderings and
//! classifies the case.
//!
//! The verdict comes from a whitespace-insensitive line diff: exit status 0
//! is PASS, any nonzero status is FAIL. The word-level diff artifacts are
//! advisory, for human inspection only, and never influence the verdict; a
//! missing `dwdiff` binary degrades them to empty files with a warning.

use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Result, SvcdiffError};
use crate::layout::{self, CasePaths};

/// Per-case classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
    /// Connection failure on either side; counted separately from FAIL and
    /// never diffed.
    Http,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skip => "SKIP",
            Verdict::Http => "HTTP",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run all three diffs between the reference and candidate renderings,
/// persisting each artifact, and return the line diff's exit status.
pub fn run_diffs(paths: &CasePaths) -> Result<i32> {
    let (status, line_output) = run_line_diff(&paths.ref_decoded, &paths.decoded)?;
    layout::save_file(&paths.line_diff, &line_output)?;

    layout::save_file(
        &paths.word_diff,
        &run_word_diff(&paths.ref_decoded, &paths.decoded),
    )?;
    layout::save_file(
        &paths.word_diff_short,
        &run_word_diff_short(&paths.ref_decoded, &paths.decoded),
    )?;

    debug!(status, diff = %paths.line_diff.display(), "line diff complete");
    Ok(status)
}

/// Derive the exit status from an existing line-diff artifact when nothing
/// was recomputed this run: an empty artifact means the renderings matched.
pub fn status_from_artifact(line_diff: &Path) -> Result<i32> {
    let len = std::fs::metadata(line_diff)
        .map_err(|e| SvcdiffError::stat(line_diff, e))?
        .len();
    Ok(if len == 0 { 0 } else { 2 })
}

/// Whitespace-insensitive line diff. This is the only diff whose exit status
/// matters.
fn run_line_diff(ref_file: &Path, new_file: &Path) -> Result<(i32, String)> {
    let output = Command::new("diff")
        .arg("-w")
        .arg(ref_file)
        .arg(new_file)
        .output()
        .map_err(|e| SvcdiffError::DiffTool {
            tool: "diff",
            source: e,
        })?;
    let status = output.status.code().unwrap_or(2);
    Ok((status, String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Word-level diff, advisory only.
fn run_word_diff(ref_file: &Path, new_file: &Path) -> String {
    let result = Command::new("dwdiff")
        .args(["-P", "--color"])
        .arg(ref_file)
        .arg(new_file)
        .output();
    match result {
        Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
        Err(err) => {
            warn!(%err, "dwdiff unavailable, word diff artifact left empty");
            String::new()
        }
    }
}

/// Unified diff piped through the word differ, advisory only.
fn run_word_diff_short(ref_file: &Path, new_file: &Path) -> String {
    let pipeline = format!(
        "diff -u {} {} | dwdiff -u -P --color",
        shell_quote(ref_file),
        shell_quote(new_file)
    );
    let result = Command::new("sh").arg("-c").arg(&pipeline).output();
    match result {
        Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
        Err(err) => {
            warn!(%err, "short word diff unavailable, artifact left empty");
            String::new()
        }
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
