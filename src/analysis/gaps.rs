//! Missing-data handling for day-indexed series.
//!
//! Two jobs: fill gaps by time-weighted interpolation, and find the longest
//! run of days whose values were present before any filling. The run is what
//! the seasonal decomposition consumes, since it cannot tolerate gaps.
//!
//! Interpolation policy:
//! - interior gaps are filled linearly in elapsed days between the bracketing
//!   present values
//! - trailing gaps carry the last present value forward
//! - leading gaps stay missing
//!
//! Segment policy: among runs of present values, the longest wins; on a tie
//! the earliest run wins.

use chrono::NaiveDate;

/// A maximal stretch of consecutive rows sharing the same present/missing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub len: usize,
    pub present: bool,
}

/// The longest gap-free stretch of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct ContiguousSegment {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Row offset of `start` in the source series.
    pub offset: usize,
    pub values: Vec<f64>,
}

impl ContiguousSegment {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if the segment spans at least `periods` full cycles of `period`.
    pub fn covers_periods(&self, period: usize, periods: usize) -> bool {
        self.len() >= period * periods
    }
}

/// Output of [`handle_gaps`].
#[derive(Debug, Clone, PartialEq)]
pub struct GapReport {
    pub interpolated: Vec<Option<f64>>,
    /// Cells missing in the input.
    pub missing_count: usize,
    /// Cells still missing after interpolation (leading gaps only).
    pub unfilled_count: usize,
    pub segment: Option<ContiguousSegment>,
}

/// Interpolates and finds the longest originally-present run in one pass.
pub fn handle_gaps(days: &[NaiveDate], values: &[Option<f64>]) -> GapReport {
    let interpolated = interpolate_time(days, values);
    GapReport {
        missing_count: values.iter().filter(|v| v.is_none()).count(),
        unfilled_count: interpolated.iter().filter(|v| v.is_none()).count(),
        segment: longest_present_segment(days, values),
        interpolated,
    }
}

/// Time-weighted interpolation. `days` and `values` must be the same length
/// and `days` strictly increasing.
pub fn interpolate_time(days: &[NaiveDate], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut prev: Option<(usize, f64)> = None;

    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };
        if let Some((p, prev_value)) = prev {
            if i > p + 1 {
                let span = (days[i] - days[p]).num_days() as f64;
                for (j, cell) in out.iter_mut().enumerate().take(i).skip(p + 1) {
                    let elapsed = (days[j] - days[p]).num_days() as f64;
                    *cell = Some(prev_value + (current - prev_value) * elapsed / span);
                }
            }
        }
        prev = Some((i, current));
    }

    if let Some((p, last)) = prev {
        for cell in out.iter_mut().skip(p + 1) {
            *cell = Some(last);
        }
    }

    out
}

/// Partitions rows into maximal runs of equal presence.
pub fn presence_runs(values: &[Option<f64>]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (i, value) in values.iter().enumerate() {
        let present = value.is_some();
        match runs.last_mut() {
            Some(run) if run.present == present => run.len += 1,
            _ => runs.push(Run { start: i, len: 1, present }),
        }
    }
    runs
}

/// The longest run of present values; earliest wins ties. `None` if every
/// value is missing.
pub fn longest_present_segment(
    days: &[NaiveDate],
    values: &[Option<f64>],
) -> Option<ContiguousSegment> {
    let mut best: Option<Run> = None;
    for run in presence_runs(values).into_iter().filter(|r| r.present) {
        // Strictly greater keeps the first of equal-length runs
        if best.map_or(true, |b| run.len > b.len) {
            best = Some(run);
        }
    }

    let run = best?;
    let end = run.start + run.len;
    Some(ContiguousSegment {
        start: days[run.start],
        end: days[end - 1],
        offset: run.start,
        values: values[run.start..end].iter().flatten().copied().collect(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn daily_axis(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn pattern(runs: &[(usize, bool)]) -> Vec<Option<f64>> {
        let mut out = Vec::new();
        for &(len, present) in runs {
            for _ in 0..len {
                out.push(if present { Some(out.len() as f64) } else { None });
            }
        }
        out
    }

    #[test]
    fn test_selects_ten_day_run_after_gap() {
        // 3 present, 5 missing, 10 present
        let values = pattern(&[(3, true), (5, false), (10, true)]);
        let days = daily_axis(values.len());

        let segment = longest_present_segment(&days, &values).expect("has present values");
        assert_eq!(segment.len(), 10);
        assert_eq!(segment.offset, 8);
        assert_eq!(segment.start, days[8]);
        assert_eq!(segment.end, days[17]);
        assert_eq!(segment.values.first(), Some(&8.0));
    }

    #[test]
    fn test_longer_missing_run_is_never_selected() {
        let values = pattern(&[(2, true), (20, false), (4, true)]);
        let days = daily_axis(values.len());
        let segment = longest_present_segment(&days, &values).unwrap();
        assert_eq!(segment.len(), 4);
    }

    #[test]
    fn test_tie_goes_to_earliest_run() {
        let values = pattern(&[(5, true), (1, false), (5, true)]);
        let days = daily_axis(values.len());
        let segment = longest_present_segment(&days, &values).unwrap();
        assert_eq!(segment.offset, 0);
    }

    #[test]
    fn test_all_missing_has_no_segment() {
        let values = vec![None; 4];
        let days = daily_axis(4);
        assert!(longest_present_segment(&days, &values).is_none());
    }

    #[test]
    fn test_presence_runs_partition_the_axis() {
        let values = pattern(&[(3, true), (5, false), (10, true)]);
        let runs = presence_runs(&values);
        assert_eq!(
            runs,
            vec![
                Run { start: 0, len: 3, present: true },
                Run { start: 3, len: 5, present: false },
                Run { start: 8, len: 10, present: true },
            ]
        );
    }

    #[test]
    fn test_interior_gap_is_linear_in_elapsed_days() {
        let days = daily_axis(5);
        let values = vec![Some(0.0), None, None, None, Some(8.0)];
        let filled = interpolate_time(&days, &values);
        assert_eq!(filled, vec![Some(0.0), Some(2.0), Some(4.0), Some(6.0), Some(8.0)]);
    }

    #[test]
    fn test_interpolation_weights_by_time_on_irregular_axis() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let days = vec![start, start + Duration::days(1), start + Duration::days(4)];
        let values = vec![Some(0.0), None, Some(4.0)];
        let filled = interpolate_time(&days, &values);
        assert_eq!(filled[1], Some(1.0));
    }

    #[test]
    fn test_leading_gap_kept_and_trailing_gap_carried() {
        let days = daily_axis(5);
        let values = vec![None, Some(1.0), Some(3.0), None, None];
        let filled = interpolate_time(&days, &values);
        assert_eq!(filled, vec![None, Some(1.0), Some(3.0), Some(3.0), Some(3.0)]);
    }

    #[test]
    fn test_handle_gaps_reports_counts() {
        let values = pattern(&[(3, true), (5, false), (10, true)]);
        let days = daily_axis(values.len());
        let report = handle_gaps(&days, &values);

        assert_eq!(report.missing_count, 5);
        assert_eq!(report.unfilled_count, 0);
        assert_eq!(report.segment.as_ref().map(|s| s.len()), Some(10));
        assert!(!report.segment.unwrap().covers_periods(365, 2));
    }
}
