//! Timing regression classifier: compares observed fetch time against the
//! recorded reference time and flags cases that slowed down beyond a
//! configurable percentage threshold.

/// Default percent-change threshold before a slower case is flagged.
pub const DEFAULT_PCT_CHANGE: f64 = 15.0;

/// Reference times below this are treated as zero to avoid degenerate
/// percent-change computations.
const MIN_MEANINGFUL_SECONDS: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingNote {
    /// Delta rounds to 0.00s at two decimal places.
    SameSpeed,
    /// Got slower by at least the configured percentage.
    Slow,
}

impl TimingNote {
    pub fn as_str(self) -> &'static str {
        match self {
            TimingNote::SameSpeed => "SAME SPEED",
            TimingNote::Slow => "SLOW",
        }
    }
}

/// Classification of one observed elapsed time against its reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingDelta {
    pub pct_change: f64,
    pub note: Option<TimingNote>,
}

/// Classify `observed` seconds against `reference` seconds.
///
/// Cases that got faster are never flagged; a slowdown is flagged only when
/// the percent change meets `threshold_pct`. Callers with no reference
/// timing record should skip classification entirely.
pub fn classify(observed: f64, reference: f64, threshold_pct: f64) -> TimingDelta {
    let delta = observed - reference;
    let delta_abs = delta.abs();

    let pct_change = if reference < MIN_MEANINGFUL_SECONDS {
        0.0
    } else {
        100.0 * delta_abs / reference
    };

    let note = if (delta_abs * 100.0).round() == 0.0 {
        Some(TimingNote::SameSpeed)
    } else if delta > 0.0 && pct_change >= threshold_pct {
        Some(TimingNote::Slow)
    } else {
        None
    };

    TimingDelta { pct_change, note }
}

/// Floor an observed elapsed time before persisting it, so reference reports
/// never store a zero that would make future percent-change computations
/// degenerate.
pub fn floor_elapsed(observed: f64) -> f64 {
    observed.max(MIN_MEANINGFUL_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_times_are_same_speed() {
        let delta = classify(10.00, 10.00, DEFAULT_PCT_CHANGE);
        assert_eq!(delta.note, Some(TimingNote::SameSpeed));
        assert_eq!(delta.pct_change, 0.0);
    }

    #[test]
    fn twenty_percent_slower_is_flagged() {
        let delta = classify(12.00, 10.00, 15.0);
        assert_eq!(delta.pct_change, 20.0);
        assert_eq!(delta.note, Some(TimingNote::Slow));
    }

    #[test]
    fn faster_cases_are_never_flagged() {
        let delta = classify(9.00, 10.00, 15.0);
        assert_eq!(delta.note, None);
        assert_eq!(delta.pct_change, 10.0);
    }

    #[test]
    fn near_zero_reference_defines_pct_as_zero() {
        let delta = classify(0.50, 0.00, 15.0);
        assert_eq!(delta.pct_change, 0.0);
        assert_eq!(delta.note, None);
    }

    #[test]
    fn slowdown_within_tolerance_gets_no_note() {
        let delta = classify(11.00, 10.00, 15.0);
        assert_eq!(delta.pct_change, 10.0);
        assert_eq!(delta.note, None);
    }

    #[test]
    fn sub_centisecond_delta_is_same_speed_regardless_of_pct() {
        // 0.004s delta on a 0.02s reference is a 20% change but rounds to 0.00.
        let delta = classify(0.024, 0.020, 15.0);
        assert_eq!(delta.note, Some(TimingNote::SameSpeed));
    }

    #[test]
    fn observed_elapsed_is_floored() {
        assert_eq!(floor_elapsed(0.001), 0.01);
        assert_eq!(floor_elapsed(0.5), 0.5);
    }
}
