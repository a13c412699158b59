//! `svcdiff` — regression comparator for paired service backends.
//!
//! Fetches each test case from the server under test, normalizes the
//! response into a canonical rendering, diffs it against the reference
//! baseline directory, and reports PASS/FAIL plus latency deltas.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use svcdiff_core::compare::Verdict;
use svcdiff_core::fetch::HttpFetcher;
use svcdiff_core::runner::{self, CaseResult, RunConfig};
use svcdiff_core::timing::{self, TimingNote};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "svcdiff", about = "Unit test runner comparing two service backends")]
struct Cli {
    /// Directory to save test outputs
    #[arg(long, short = 'o', default_value = "./test_out")]
    out_dir: PathBuf,

    /// Directory containing reference outputs
    #[arg(long, short = 'r', default_value = "./test_ref")]
    ref_dir: PathBuf,

    /// Input file with test cases
    #[arg(long, short = 'i', default_value = "test_cases.txt")]
    in_file: PathBuf,

    /// Base server URL
    #[arg(long, short = 's', default_value = "https://dev.ictv.global")]
    server: String,

    /// Only run cases whose unit or case name matches one of these patterns
    #[arg(long, short = 'u', num_args = 0.., value_name = "PATTERN")]
    only: Vec<String>,

    /// Skip cases whose unit or case name matches one of these patterns
    #[arg(long, short = 'e', num_args = 0.., value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Only run test cases with no healthy cached output file
    #[arg(long)]
    update: bool,

    /// Aggressive content scrubbing, to reduce false negatives
    #[arg(long)]
    scrub: bool,

    /// Print progress as test cases are executed
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Print path to the word diff when a case fails
    #[arg(long, short = 'd')]
    show_diff: bool,

    /// Do not compare against the reference (useful when regenerating it)
    #[arg(long)]
    no_compare: bool,

    /// Do not require a successful parse and pretty print of JSON
    #[arg(long)]
    no_pretty: bool,

    /// How much slower a query must run to be flagged for time change (%)
    #[arg(long, default_value_t = timing::DEFAULT_PCT_CHANGE)]
    pct_change: f64,

    #[arg(long, default_value = "report.txt")]
    report_name: String,

    #[arg(long, default_value = "report.txt")]
    ref_report_name: String,

    #[arg(long, default_value = "report.summary.txt")]
    summary_name: String,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            out_dir: self.out_dir,
            ref_dir: self.ref_dir,
            in_file: self.in_file,
            server: self.server,
            only: self.only,
            exclude: self.exclude,
            update: self.update,
            scrub: self.scrub,
            show_diff: self.show_diff,
            compare: !self.no_compare,
            lenient_pretty: self.no_pretty,
            pct_change_threshold: self.pct_change,
            report_name: self.report_name,
            ref_report_name: self.ref_report_name,
            summary_name: self.summary_name,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.into_config();
    let (cases, loaded) = runner::prepare_cases(&config)?;
    println!("# loaded: {loaded} test cases from {}", config.in_file.display());
    println!("# filtered: {} test cases to run", cases.len());

    let fetcher = HttpFetcher::new();
    let summary = runner::run_cases(
        &config,
        cases,
        &fetcher,
        &svcdiff_core::cache::ModifiedTime,
        &mut |result| println!("{}", render_case(result)),
    )?;

    for line in &summary.summary_lines {
        println!("{line}");
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Render a case's report line with a colored verdict and timing note.
fn render_case(result: &CaseResult) -> String {
    let verdict = match result.verdict {
        Some(Verdict::Pass) => Verdict::Pass.as_str().green().to_string(),
        Some(Verdict::Fail) => Verdict::Fail.as_str().red().to_string(),
        Some(Verdict::Http) => Verdict::Http.as_str().red().to_string(),
        Some(Verdict::Skip) => Verdict::Skip.as_str().blue().to_string(),
        None => String::new(),
    };
    let note = match result.note {
        // Orange, to stand apart from FAIL red.
        Some(TimingNote::Slow) => TimingNote::Slow.as_str().truecolor(255, 165, 0).to_string(),
        Some(TimingNote::SameSpeed) => TimingNote::SameSpeed.as_str().to_string(),
        None => String::new(),
    };

    // Rebuild the plain report line with the colored fields swapped in.
    let mut columns: Vec<String> = result
        .report_line
        .split('\t')
        .map(str::to_string)
        .collect();
    if let Some(first) = columns.first_mut() {
        *first = verdict;
    }
    // NOTE is the second-to-last column; DIFF_PATH is last.
    let len = columns.len();
    if len >= 2 {
        columns[len - 2] = note;
    }
    columns.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_map_onto_run_config() {
        let cli = Cli::parse_from(["svcdiff"]);
        let config = cli.into_config();
        assert!(config.compare);
        assert!(!config.lenient_pretty);
        assert_eq!(config.pct_change_threshold, timing::DEFAULT_PCT_CHANGE);
        assert_eq!(config.report_name, "report.txt");
    }

    #[test]
    fn flags_invert_and_carry_through() {
        let cli = Cli::parse_from([
            "svcdiff",
            "--no-compare",
            "--no-pretty",
            "--scrub",
            "--update",
            "--pct-change",
            "25",
            "--only",
            "history",
            "--exclude",
            "blast",
        ]);
        let config = cli.into_config();
        assert!(!config.compare);
        assert!(config.lenient_pretty);
        assert!(config.scrub);
        assert!(config.update);
        assert_eq!(config.pct_change_threshold, 25.0);
        assert_eq!(config.only, vec!["history".to_string()]);
        assert_eq!(config.exclude, vec!["blast".to_string()]);
    }
}
