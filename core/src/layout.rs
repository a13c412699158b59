//! Per-case filesystem layout and small file helpers.
//!
//! Flat layout: `<dir>/<unit>.<case>.txt` for the raw response, plus
//! `.decode.txt` (or `.scrub.txt` in scrub mode) for the canonical rendering
//! and `.decode.diff` / `.decode.dwdiff` / `.decode.dwdiff_short` artifacts.
//! The hierarchical taxon-history family nests everything under
//! `<dir>/<bin>/<key_taxon>/` and always uses the `.decode` suffix.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cases::TestCase;
use crate::error::{Result, SvcdiffError};

/// Resolved file locations for one test case.
#[derive(Debug, Clone)]
pub struct CasePaths {
    /// Raw response as fetched this run.
    pub raw: PathBuf,
    /// Raw reference response from the baseline run.
    pub ref_raw: PathBuf,
    /// Canonical rendering of `raw`.
    pub decoded: PathBuf,
    /// Canonical rendering of `ref_raw`.
    pub ref_decoded: PathBuf,
    /// `diff -w` output.
    pub line_diff: PathBuf,
    /// Word-level diff output.
    pub word_diff: PathBuf,
    /// Unified + word-level diff output.
    pub word_diff_short: PathBuf,
}

/// Resolve the file layout for a case, creating nested directories for the
/// hierarchical family as needed.
pub fn case_paths(
    out_dir: &Path,
    ref_dir: &Path,
    case: &TestCase,
    scrub: bool,
) -> Result<CasePaths> {
    let nested = case
        .case
        .starts_with(crate::cases::TAXON_HISTORY_CASE_PREFIX)
        && case.storage.is_some();

    let (case_dir, case_ref_dir, variant) = if nested {
        let key = case.storage.as_ref().map(|s| (s.bin.as_str(), s.key_taxon.as_str()));
        let (bin, key_taxon) = key.unwrap_or(("", ""));
        let case_dir = out_dir.join(bin).join(key_taxon);
        let case_ref_dir = ref_dir.join(bin).join(key_taxon);
        create_dir_all(&case_dir)?;
        create_dir_all(&case_ref_dir)?;
        (case_dir, case_ref_dir, "decode")
    } else {
        let variant = if scrub { "scrub" } else { "decode" };
        (out_dir.to_path_buf(), ref_dir.to_path_buf(), variant)
    };

    let stem = format!("{}.{}", case.unit, case.case);
    Ok(CasePaths {
        raw: case_dir.join(format!("{stem}.txt")),
        ref_raw: case_ref_dir.join(format!("{stem}.txt")),
        decoded: case_dir.join(format!("{stem}.{variant}.txt")),
        ref_decoded: case_ref_dir.join(format!("{stem}.{variant}.txt")),
        line_diff: case_dir.join(format!("{stem}.{variant}.diff")),
        word_diff: case_dir.join(format!("{stem}.{variant}.dwdiff")),
        word_diff_short: case_dir.join(format!("{stem}.{variant}.dwdiff_short")),
    })
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| SvcdiffError::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn save_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| SvcdiffError::write(path, e))
}

pub fn load_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SvcdiffError::read(path, e))
}

/// Whether a cached raw response records a connection failure. Reads only the
/// leading bytes; any I/O error reads as "no".
pub fn file_starts_with_http(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut prefix = [0u8; 4];
    match file.read_exact(&mut prefix) {
        Ok(()) => &prefix == b"HTTP",
        Err(_) => false,
    }
}
