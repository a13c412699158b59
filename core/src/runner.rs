//! Case runner: sequential orchestration of fetch, normalize, cache, diff,
//! and timing classification, with incremental report output.
//!
//! Cases run strictly one at a time in input-file order. The filesystem
//! decode cache is the only mutable shared state, which is safe under this
//! sequential model; parallelizing would require per-case-path locking
//! because the staleness check is not atomic.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::{self, DecodeOptions, ModifiedTime, StalenessPolicy};
use crate::cases::{self, CaseFilter, TestCase};
use crate::compare::{self, Verdict};
use crate::error::Result;
use crate::fetch::{CONNECTION_FAILURE_PREFIX, Fetcher};
use crate::layout::{self, file_starts_with_http};
use crate::report::{self, RefTiming, ReportWriter, UnitCounters};
use crate::timing::{self, TimingNote};

/// Configuration surface for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub out_dir: PathBuf,
    pub ref_dir: PathBuf,
    pub in_file: PathBuf,
    pub server: String,
    /// Include patterns; empty means all cases.
    pub only: Vec<String>,
    /// Exclude patterns.
    pub exclude: Vec<String>,
    /// Skip cases that already have a non-error cached output.
    pub update: bool,
    /// Aggressive volatile-field scrubbing.
    pub scrub: bool,
    /// Append the short word-diff path to non-PASS report lines.
    pub show_diff: bool,
    /// False when regenerating the reference baseline: no diffs, no verdicts,
    /// timing capture only.
    pub compare: bool,
    /// Tolerate canonical renderings that fail to parse as JSON.
    pub lenient_pretty: bool,
    /// Percent slowdown before a case is flagged.
    pub pct_change_threshold: f64,
    pub report_name: String,
    pub ref_report_name: String,
    pub summary_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./test_out"),
            ref_dir: PathBuf::from("./test_ref"),
            in_file: PathBuf::from("test_cases.txt"),
            server: String::new(),
            only: Vec::new(),
            exclude: Vec::new(),
            update: false,
            scrub: false,
            show_diff: false,
            compare: true,
            lenient_pretty: false,
            pct_change_threshold: timing::DEFAULT_PCT_CHANGE,
            report_name: "report.txt".to_string(),
            ref_report_name: "report.txt".to_string(),
            summary_name: "report.summary.txt".to_string(),
        }
    }
}

/// Outcome of one case, write-once.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub unit: String,
    pub case: String,
    /// `None` when comparison is disabled (baseline generation).
    pub verdict: Option<Verdict>,
    /// Elapsed seconds, floored to 0.01 before persisting.
    pub elapsed: f64,
    pub pct_change: Option<f64>,
    pub note: Option<TimingNote>,
    /// Short word-diff artifact path, present for non-PASS cases under
    /// `show_diff`.
    pub diff_note: Option<PathBuf>,
    /// The exact line appended to the report file.
    pub report_line: String,
}

/// Aggregated results of a full run.
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<CaseResult>,
    pub counters: UnitCounters,
    /// Formatted per-unit summary lines, as persisted.
    pub summary_lines: Vec<String>,
}

/// Load the case list and apply include/exclude filters. Returns the kept
/// cases and the pre-filter count.
pub fn prepare_cases(config: &RunConfig) -> Result<(Vec<TestCase>, usize)> {
    let all = cases::load_cases(&config.in_file)?;
    let loaded = all.len();
    info!(loaded, in_file = %config.in_file.display(), "loaded test cases");
    let filter = CaseFilter::new(&config.only, &config.exclude)?;
    Ok((filter.apply(all), loaded))
}

/// Convenience wrapper: prepare cases and run them with the default
/// mtime-based staleness policy.
pub fn run(
    config: &RunConfig,
    fetcher: &dyn Fetcher,
    on_case: &mut dyn FnMut(&CaseResult),
) -> Result<RunSummary> {
    let (cases, _) = prepare_cases(config)?;
    run_cases(config, cases, fetcher, &ModifiedTime, on_case)
}

/// Run prepared cases sequentially. `on_case` is invoked after each case's
/// report line has been flushed.
pub fn run_cases(
    config: &RunConfig,
    cases: Vec<TestCase>,
    fetcher: &dyn Fetcher,
    policy: &dyn StalenessPolicy,
    on_case: &mut dyn FnMut(&CaseResult),
) -> Result<RunSummary> {
    let ref_timings = if config.compare {
        report::load_ref_timings(&config.ref_dir.join(&config.ref_report_name))
    } else {
        Default::default()
    };

    layout::create_dir_all(&config.out_dir)?;
    let mut report_writer = ReportWriter::create(
        &config.out_dir.join(&config.report_name),
        &config.server,
        &config.in_file,
    )?;

    let mut counters = UnitCounters::default();
    let mut results = Vec::with_capacity(cases.len());

    for case in cases {
        let ref_timing = ref_timings
            .get(&(case.unit.clone(), case.case.clone()))
            .cloned();
        let result = run_one_case(config, &case, fetcher, policy, ref_timing, &mut counters)?;
        report_writer
            .write_case(&result.report_line)
            .map_err(|e| crate::error::SvcdiffError::FileWrite {
                path: config.out_dir.join(&config.report_name),
                source: e,
            })?;
        on_case(&result);
        results.push(result);
    }

    let summary_lines = report::write_summary(
        &config.out_dir.join(&config.summary_name),
        &config.server,
        &config.in_file,
        &counters,
    )?;

    Ok(RunSummary {
        results,
        counters,
        summary_lines,
    })
}

fn run_one_case(
    config: &RunConfig,
    case: &TestCase,
    fetcher: &dyn Fetcher,
    policy: &dyn StalenessPolicy,
    ref_timing: Option<RefTiming>,
    counters: &mut UnitCounters,
) -> Result<CaseResult> {
    let paths = layout::case_paths(&config.out_dir, &config.ref_dir, case, config.scrub)?;
    let ref_time = ref_timing.as_ref().map_or(0.0, |t| t.elapsed);
    let ref_is_http = ref_timing
        .as_ref()
        .is_some_and(|t| t.status == Verdict::Http.as_str());

    // Fetch, unless update mode can reuse a healthy cached output.
    let mut verdict = None;
    let elapsed;
    if config.update && paths.raw.exists() && !file_starts_with_http(&paths.raw) {
        debug!(unit = %case.unit, case = %case.case, "skipping fetch, cached output present");
        verdict = Some(Verdict::Skip);
        elapsed = ref_time;
    } else {
        debug!(url = %case.url, "fetching");
        let start = Instant::now();
        let (content, status) = fetcher.fetch(&config.server, &case.url);
        elapsed = start.elapsed().as_secs_f64();
        debug!(bytes = content.len(), status, "fetched");
        layout::save_file(&paths.raw, &content)?;
    }

    let mut pct_change = None;
    let mut note = None;

    if ref_is_http {
        // The reference has no valid content to diff against. Re-fail.
        counters.record(&case.unit, Verdict::Http);
        verdict = Some(Verdict::Http);
    } else {
        let opts = DecodeOptions {
            scrub: config.scrub,
            canonicalize_schema: case.is_taxon_history(),
            lenient_pretty: config.lenient_pretty,
        };

        let mut need_compare = false;

        // Reference side decodes against the same staleness test as ours.
        if paths.ref_raw.exists() {
            if file_starts_with_http(&paths.ref_raw) {
                warn!(path = %paths.ref_raw.display(), "reference raw response records a connection failure");
            }
            if cache::ensure_decoded(&paths.ref_raw, &paths.ref_decoded, &opts, policy)?
                == cache::DecodeOutcome::Recomputed
            {
                need_compare = true;
            }
        }

        if file_starts_with_http(&paths.raw) {
            warn!(path = %paths.raw.display(), "raw response records a connection failure");
        }
        if cache::ensure_decoded(&paths.raw, &paths.decoded, &opts, policy)?
            == cache::DecodeOutcome::Recomputed
        {
            need_compare = true;
        }

        // The diff artifacts have their own staleness test.
        if !paths.line_diff.exists()
            || !paths.word_diff.exists()
            || policy.is_stale(&paths.raw, &paths.decoded)?
            || policy.is_stale(&paths.ref_decoded, &paths.line_diff)?
        {
            need_compare = true;
        }

        if config.compare {
            let status = if need_compare {
                compare::run_diffs(&paths)?
            } else {
                compare::status_from_artifact(&paths.line_diff)?
            };
            let outcome = if status == 0 {
                Verdict::Pass
            } else {
                Verdict::Fail
            };
            counters.record(&case.unit, outcome);
            verdict = Some(outcome);
        }

        if let Some(ref_timing) = &ref_timing {
            let delta = timing::classify(elapsed, ref_timing.elapsed, config.pct_change_threshold);
            note = delta.note;
            if config.compare {
                pct_change = Some(delta.pct_change);
            }
        }
    }

    // Never persist a zero that would break future percent computations.
    let elapsed = timing::floor_elapsed(elapsed);

    let diff_note = (config.show_diff && verdict != Some(Verdict::Pass))
        .then(|| paths.word_diff_short.clone());
    let report_line = format_report_line(
        config.compare,
        verdict,
        elapsed,
        pct_change,
        case,
        note,
        diff_note.as_deref(),
    );

    Ok(CaseResult {
        unit: case.unit.clone(),
        case: case.case.clone(),
        verdict,
        elapsed,
        pct_change,
        note,
        diff_note,
        report_line,
    })
}

fn format_report_line(
    compare: bool,
    verdict: Option<Verdict>,
    elapsed: f64,
    pct_change: Option<f64>,
    case: &TestCase,
    note: Option<TimingNote>,
    diff_note: Option<&std::path::Path>,
) -> String {
    let verdict_str = verdict.map(Verdict::as_str).unwrap_or_default();
    let middle = if compare {
        let pct_str = pct_change.map(|p| format!("{p:+3.0}%")).unwrap_or_default();
        format!("{elapsed:05.2}s\t{pct_str}\t{}\t{}", case.unit, case.case)
    } else {
        format!("{elapsed:05.2}s\t{}\t{}", case.unit, case.case)
    };
    let note_str = note.map(TimingNote::as_str).unwrap_or_default();
    let diff_str = diff_note
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    format!("{verdict_str}\t{middle}\t{note_str}\t{diff_str}")
}

/// Raw response text signalling a connection failure.
pub fn is_connection_failure(content: &str) -> bool {
    content.starts_with(CONNECTION_FAILURE_PREFIX)
}
