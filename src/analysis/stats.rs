//! Descriptive statistics over columns with missing cells.
//!
//! Every function here ignores missing entries rather than propagating them.

use serde::Serialize;

/// Mean of the present values, `None` if there are none.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Standard deviation of the present values with `ddof` degrees of freedom
/// removed (0 = population, 1 = sample).
pub fn std_dev(values: &[Option<f64>], ddof: usize) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() <= ddof {
        return None;
    }
    let m = present.iter().sum::<f64>() / present.len() as f64;
    let ss: f64 = present.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (present.len() - ddof) as f64).sqrt())
}

/// Linear-interpolated quantile of sorted data, `q` in [0, 1].
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Count, mean, sample std, min, quartiles and max. `None` for an all-missing
/// column. `std` is NaN when there is a single value.
pub fn describe(name: &str, values: &[Option<f64>]) -> Option<ColumnSummary> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    Some(ColumnSummary {
        name: name.to_string(),
        count: sorted.len(),
        mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
        std: std_dev(values, 1).unwrap_or(f64::NAN),
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// Pearson correlation over rows where both cells are present.
///
/// `None` with fewer than two complete pairs or zero variance on either side.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}

/// Pairwise-complete correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()` squared entries.
    pub values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.columns.len() + col]
    }
}

pub fn correlation_matrix(columns: &[(&str, &[Option<f64>])]) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![None; n * n];
    for i in 0..n {
        for j in i..n {
            let r = if i == j {
                pearson(columns[i].1, columns[i].1).map(|_| 1.0)
            } else {
                pearson(columns[i].1, columns[j].1)
            };
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }
    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_describe_matches_hand_computed_quartiles() {
        let values = vec![Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)];
        let summary = describe("x", &values).unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 2.5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.q25, 1.75);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.q75, 3.25);
        assert_eq!(summary.max, 4.0);
        assert!((summary.std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_describe_all_missing_is_none() {
        assert!(describe("x", &[None, None]).is_none());
    }

    #[test]
    fn test_population_vs_sample_std() {
        let values = col(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(std_dev(&values, 0), Some(2.0));
        assert!(std_dev(&values, 1).unwrap() > 2.0);
        assert_eq!(std_dev(&col(&[1.0]), 1), None);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let a = col(&[1.0, 2.0, 3.0, 4.0]);
        let b = col(&[2.0, 4.0, 6.0, 8.0]);
        let c = col(&[4.0, 3.0, 2.0, 1.0]);
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_uses_complete_pairs_only() {
        let a = vec![Some(1.0), Some(2.0), None, Some(3.0)];
        let b = vec![Some(1.0), Some(2.0), Some(100.0), Some(3.0)];
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_matrix_is_symmetric_with_unit_diagonal() {
        let a = col(&[1.0, 2.0, 3.0, 5.0]);
        let b = col(&[2.0, 1.0, 4.0, 3.0]);
        let constant = col(&[1.0, 1.0, 1.0, 1.0]);
        let m = correlation_matrix(&[("a", &a), ("b", &b), ("k", &constant)]);

        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(0, 1), m.get(1, 0));
        assert_eq!(m.get(2, 2), None);
        assert_eq!(m.get(0, 2), None);
    }
}
