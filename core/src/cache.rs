//! Staleness-aware decode cache.
//!
//! The canonical rendering of a raw response is expensive enough to cache on
//! disk next to the raw file. A cache entry is valid while it is at least as
//! new as the raw response it was derived from; any later write to the raw
//! file invalidates it and forces recomputation.
//!
//! The staleness test is a pluggable policy. [`ModifiedTime`] preserves the
//! historical behavior (and lets a manual `touch` of a raw file force a
//! recompute); [`ContentHash`] trades that for correctness under clock skew
//! or timestamp-preserving copies. The runner defaults to [`ModifiedTime`].

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, SvcdiffError};
use crate::{escape, layout, schema};

/// Decides whether a derived file must be recomputed from its source.
pub trait StalenessPolicy {
    /// True when `derived` is missing or out of date relative to `source`.
    fn is_stale(&self, source: &Path, derived: &Path) -> Result<bool>;

    /// Called after `derived` has been rewritten from `source`.
    fn record(&self, _source: &Path, _derived: &Path) -> Result<()> {
        Ok(())
    }
}

/// Modification-time staleness: stale when the derived file is missing or
/// strictly older than its source.
#[derive(Debug, Default)]
pub struct ModifiedTime;

impl StalenessPolicy for ModifiedTime {
    fn is_stale(&self, source: &Path, derived: &Path) -> Result<bool> {
        if !derived.exists() {
            return Ok(true);
        }
        if !source.exists() {
            // Nothing to derive from; the existing file stands.
            return Ok(false);
        }
        let source_mtime = std::fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(|e| SvcdiffError::stat(source, e))?;
        let derived_mtime = std::fs::metadata(derived)
            .and_then(|m| m.modified())
            .map_err(|e| SvcdiffError::stat(derived, e))?;
        Ok(source_mtime > derived_mtime)
    }
}

/// Content-hash staleness: a sidecar next to the derived file records the
/// SHA-256 of the source it was computed from.
#[derive(Debug, Default)]
pub struct ContentHash;

impl ContentHash {
    fn sidecar(derived: &Path) -> PathBuf {
        let mut name = derived.as_os_str().to_os_string();
        name.push(".src-sha256");
        PathBuf::from(name)
    }

    fn source_digest(source: &Path) -> Result<String> {
        let content = std::fs::read(source).map_err(|e| SvcdiffError::read(source, e))?;
        let digest = Sha256::digest(&content);
        Ok(format!("{digest:x}"))
    }
}

impl StalenessPolicy for ContentHash {
    fn is_stale(&self, source: &Path, derived: &Path) -> Result<bool> {
        if !derived.exists() {
            return Ok(true);
        }
        if !source.exists() {
            return Ok(false);
        }
        let sidecar = Self::sidecar(derived);
        let Ok(recorded) = std::fs::read_to_string(&sidecar) else {
            return Ok(true);
        };
        Ok(recorded.trim() != Self::source_digest(source)?)
    }

    fn record(&self, source: &Path, derived: &Path) -> Result<()> {
        let digest = Self::source_digest(source)?;
        layout::save_file(&Self::sidecar(derived), &digest)
    }
}

/// Options for one decode pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Aggressive volatile-field scrubbing (see [`escape::normalize`]).
    pub scrub: bool,
    /// Apply the taxon-history schema mapping after escape decoding.
    pub canonicalize_schema: bool,
    /// Tolerate canonical text that fails to parse as JSON, diffing the raw
    /// normalized text instead of aborting.
    pub lenient_pretty: bool,
}

/// Outcome of [`ensure_decoded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The canonical rendering was recomputed and rewritten.
    Recomputed,
    /// The existing cache entry was fresh and left untouched.
    Fresh,
}

/// Produce the canonical rendering of `raw` at `decoded`, unless the cached
/// rendering is still fresh under `policy`.
pub fn ensure_decoded(
    raw: &Path,
    decoded: &Path,
    opts: &DecodeOptions,
    policy: &dyn StalenessPolicy,
) -> Result<DecodeOutcome> {
    if !policy.is_stale(raw, decoded)? {
        debug!(decoded = %decoded.display(), "decode cache fresh");
        return Ok(DecodeOutcome::Fresh);
    }

    debug!(raw = %raw.display(), "decoding");
    let content = layout::load_file(raw)?;
    let rendering = render_canonical(&content, decoded, opts)?;
    layout::save_file(decoded, &rendering)?;
    policy.record(raw, decoded)?;
    Ok(DecodeOutcome::Recomputed)
}

/// Run the full normalization pipeline on raw text: escape decoding,
/// optional schema canonicalization, compact re-serialization, then
/// pretty-printing for a readable diff.
fn render_canonical(content: &str, decoded: &Path, opts: &DecodeOptions) -> Result<String> {
    let mut text = escape::normalize(content, opts.scrub);

    // Invalid JSON falls through to a raw-text diff; the pretty step below
    // decides whether that is fatal.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
        let value = if opts.canonicalize_schema {
            schema::canonicalize(value, &schema::TAXON_HISTORY)
        } else {
            value
        };
        text = serde_json::to_string(&value).map_err(|e| SvcdiffError::JsonSerialize { source: e })?;
    }

    pretty_json_or_raw(&text, decoded, opts.lenient_pretty)
}

/// Re-serialize canonical text indented for readability. On parse failure the
/// text is persisted verbatim with a `.bad` suffix for inspection; strict
/// mode then surfaces the failure as an error.
fn pretty_json_or_raw(text: &str, decoded: &Path, lenient: bool) -> Result<String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            serde_json::to_string_pretty(&value).map_err(|e| SvcdiffError::JsonSerialize { source: e })
        }
        Err(parse_err) => {
            let bad_path = bad_sibling(decoded);
            warn!(
                path = %decoded.display(),
                bad = %bad_path.display(),
                "canonical rendering is not valid JSON"
            );
            layout::save_file(&bad_path, text)?;
            if lenient {
                Ok(text.to_string())
            } else {
                Err(SvcdiffError::PrettyPrint {
                    path: decoded.to_path_buf(),
                    bad_path,
                    source: parse_err,
                })
            }
        }
    }
}

fn bad_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bad");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, when: SystemTime) {
        let file = File::options().write(true).open(path).expect("open");
        file.set_modified(when).expect("set mtime");
    }

    #[test]
    fn fresh_cache_is_not_recomputed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, r#"{"a":1}"#).expect("write");
        std::fs::write(&decoded, "cached rendering").expect("write");

        let base = SystemTime::now();
        set_mtime(&raw, base);
        set_mtime(&decoded, base + Duration::from_secs(10));

        let outcome = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &ModifiedTime)
            .expect("decode");
        assert_eq!(outcome, DecodeOutcome::Fresh);
        assert_eq!(
            std::fs::read_to_string(&decoded).expect("read"),
            "cached rendering"
        );
    }

    #[test]
    fn newer_raw_forces_recompute() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, r#"{"a":1}"#).expect("write");
        std::fs::write(&decoded, "stale rendering").expect("write");

        let base = SystemTime::now();
        set_mtime(&decoded, base);
        set_mtime(&raw, base + Duration::from_secs(10));

        let outcome = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &ModifiedTime)
            .expect("decode");
        assert_eq!(outcome, DecodeOutcome::Recomputed);
        let rendered = std::fs::read_to_string(&decoded).expect("read");
        assert_eq!(rendered, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn missing_decoded_file_forces_recompute() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, r#"{"a":1,"jsonID":null,}"#).expect("write");

        let outcome = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &ModifiedTime)
            .expect("decode");
        assert_eq!(outcome, DecodeOutcome::Recomputed);
        assert_eq!(
            std::fs::read_to_string(&decoded).expect("read"),
            "{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn strict_mode_aborts_on_unparsable_canonical_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, "<html>not json</html>").expect("write");

        let err = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &ModifiedTime)
            .expect_err("should abort");
        assert!(matches!(err, SvcdiffError::PrettyPrint { .. }));
        // The offending content is saved for inspection.
        let bad = dir.path().join("case.decode.txt.bad");
        assert!(bad.exists());
    }

    #[test]
    fn lenient_mode_falls_back_to_raw_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, "<html>not json</html>").expect("write");

        let opts = DecodeOptions {
            lenient_pretty: true,
            ..Default::default()
        };
        let outcome = ensure_decoded(&raw, &decoded, &opts, &ModifiedTime).expect("decode");
        assert_eq!(outcome, DecodeOutcome::Recomputed);
        assert_eq!(
            std::fs::read_to_string(&decoded).expect("read"),
            "<html>not json</html>"
        );
    }

    #[test]
    fn schema_canonicalization_applies_only_when_requested() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        std::fs::write(&raw, r#"{"selectedTaxon":1,"a":2}"#).expect("write");

        let plain = dir.path().join("plain.decode.txt");
        ensure_decoded(&raw, &plain, &DecodeOptions::default(), &ModifiedTime).expect("decode");
        assert!(std::fs::read_to_string(&plain)
            .expect("read")
            .contains("selectedTaxon"));

        let canon = dir.path().join("canon.decode.txt");
        let opts = DecodeOptions {
            canonicalize_schema: true,
            ..Default::default()
        };
        ensure_decoded(&raw, &canon, &opts, &ModifiedTime).expect("decode");
        assert!(!std::fs::read_to_string(&canon)
            .expect("read")
            .contains("selectedTaxon"));
    }

    #[test]
    fn content_hash_policy_recomputes_only_on_content_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("case.txt");
        let decoded = dir.path().join("case.decode.txt");
        std::fs::write(&raw, r#"{"a":1}"#).expect("write");

        let policy = ContentHash;
        let first = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &policy)
            .expect("decode");
        assert_eq!(first, DecodeOutcome::Recomputed);

        // Touching the mtime alone does not invalidate a content-hash entry.
        set_mtime(&raw, SystemTime::now() + Duration::from_secs(60));
        let second = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &policy)
            .expect("decode");
        assert_eq!(second, DecodeOutcome::Fresh);

        std::fs::write(&raw, r#"{"a":2}"#).expect("write");
        let third = ensure_decoded(&raw, &decoded, &DecodeOptions::default(), &policy)
            .expect("decode");
        assert_eq!(third, DecodeOutcome::Recomputed);
    }
}
