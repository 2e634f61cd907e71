//! Scenario variants of a forecast.
//!
//! A scenario scales the point forecast on or after a cutoff date by a
//! constant factor. The uncertainty bounds, and every point before the
//! cutoff, are left exactly as forecast.

use chrono::NaiveDate;

use crate::config::ScenarioConfig;
use crate::forecast::ForecastPoint;
use crate::model::Result;
use crate::table::CombinedTable;

pub const BASELINE_SCENARIO: &str = "normal";

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub factor: f64,
    pub points: Vec<ForecastPoint>,
}

pub fn simulate_scenario(base: &[ForecastPoint], factor: f64, cutoff: NaiveDate) -> Vec<ForecastPoint> {
    base.iter()
        .map(|p| {
            if p.date >= cutoff {
                ForecastPoint {
                    yhat: p.yhat * factor,
                    ..*p
                }
            } else {
                *p
            }
        })
        .collect()
}

/// The unmodified baseline followed by each configured variant.
pub fn build_scenarios(base: &[ForecastPoint], config: &ScenarioConfig) -> Vec<Scenario> {
    let mut scenarios = vec![Scenario {
        name: BASELINE_SCENARIO.to_string(),
        factor: 1.0,
        points: base.to_vec(),
    }];
    scenarios.extend(config.variants.iter().map(|variant| Scenario {
        name: variant.name.clone(),
        factor: variant.factor,
        points: simulate_scenario(base, variant.factor, config.cutoff),
    }));
    scenarios
}

/// One `{name}_yhat`, `{name}_lower`, `{name}_upper` column triple per scenario.
pub fn scenarios_table(scenarios: &[Scenario]) -> Result<CombinedTable> {
    let days: Vec<NaiveDate> = scenarios
        .first()
        .map(|s| s.points.iter().map(|p| p.date).collect())
        .unwrap_or_default();
    let mut table = CombinedTable::new(days);

    for scenario in scenarios {
        let mut yhat = vec![None; table.len()];
        let mut lower = vec![None; table.len()];
        let mut upper = vec![None; table.len()];
        for point in &scenario.points {
            if let Ok(row) = table.days().binary_search(&point.date) {
                yhat[row] = Some(point.yhat);
                lower[row] = Some(point.yhat_lower);
                upper[row] = Some(point.yhat_upper);
            }
        }
        table.insert_column(&format!("{}_yhat", scenario.name), yhat)?;
        table.insert_column(&format!("{}_lower", scenario.name), lower)?;
        table.insert_column(&format!("{}_upper", scenario.name), upper)?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioVariant;
    use chrono::Duration;

    fn base() -> Vec<ForecastPoint> {
        let start = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        (0..5)
            .map(|i| {
                let v = 1.0 + i as f64;
                ForecastPoint {
                    date: start + Duration::days(i),
                    yhat: v,
                    yhat_lower: v - 0.5,
                    yhat_upper: v + 0.5,
                }
            })
            .collect()
    }

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_points_before_cutoff_unchanged() {
        let base = base();
        for factor in [0.8, 1.2] {
            let scaled = simulate_scenario(&base, factor, cutoff());
            assert_eq!(scaled[0], base[0]);
            assert_eq!(scaled[1], base[1]);
        }
    }

    #[test]
    fn test_only_yhat_scaled_from_cutoff() {
        let base = base();
        for factor in [0.8, 1.2] {
            let scaled = simulate_scenario(&base, factor, cutoff());
            for (s, b) in scaled.iter().zip(&base).skip(2) {
                assert_eq!(s.yhat, b.yhat * factor);
                assert_eq!(s.yhat_lower, b.yhat_lower);
                assert_eq!(s.yhat_upper, b.yhat_upper);
            }
        }
    }

    #[test]
    fn test_dry_factor_keeps_bounds() {
        let point = ForecastPoint {
            date: cutoff(),
            yhat: 1.0,
            yhat_lower: 0.5,
            yhat_upper: 1.5,
        };
        let scaled = simulate_scenario(&[point], 0.8, cutoff());
        assert_eq!(scaled[0].yhat, 0.8);
        assert_eq!(scaled[0].yhat_lower, 0.5);
        assert_eq!(scaled[0].yhat_upper, 1.5);
    }

    #[test]
    fn test_build_scenarios_puts_baseline_first() {
        let config = ScenarioConfig {
            cutoff: cutoff(),
            variants: vec![
                ScenarioVariant { name: "dry".to_string(), factor: 0.8 },
                ScenarioVariant { name: "wet".to_string(), factor: 1.2 },
            ],
        };
        let scenarios = build_scenarios(&base(), &config);
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["normal", "dry", "wet"]);
        assert_eq!(scenarios[0].points, base());
    }

    #[test]
    fn test_scenarios_table_columns() {
        let config = ScenarioConfig {
            cutoff: cutoff(),
            variants: vec![ScenarioVariant { name: "dry".to_string(), factor: 0.5 }],
        };
        let table = scenarios_table(&build_scenarios(&base(), &config)).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(
            names,
            vec!["normal_yhat", "normal_lower", "normal_upper", "dry_yhat", "dry_lower", "dry_upper"]
        );
        assert_eq!(table.len(), 5);
        assert_eq!(table.column("dry_yhat").unwrap()[4], Some(2.5));
        assert_eq!(table.column("dry_upper").unwrap()[4], Some(5.5));
    }
}
