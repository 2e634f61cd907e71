//! Agricultural water availability index.
//!
//! The index is the row-wise mean of z-scored components. Missing-value
//! policy, made explicit:
//! - each component is standardized over its own present cells (population
//!   standard deviation); missing cells stay missing
//! - a component with zero variance carries no information and contributes
//!   no cells
//! - the row mean skips missing cells, so a day has an index value if at
//!   least one component is present that day

use crate::analysis::stats::{mean, std_dev};
use crate::model::{Result, AG_WATER_INDEX, SUSTAINABLE_FARMING_DAYS};
use crate::table::{Column, CombinedTable};

/// Standardizes present cells to mean 0 and unit population variance.
pub fn zscore(values: &[Option<f64>]) -> Column {
    let (Some(m), Some(sd)) = (mean(values), std_dev(values, 0)) else {
        return vec![None; values.len()];
    };
    if sd == 0.0 {
        return vec![None; values.len()];
    }
    values.iter().map(|v| v.map(|x| (x - m) / sd)).collect()
}

/// `max(0, index / requirement)`.
pub fn sustainable_farming_days(index: f64, water_requirement_per_day: f64) -> f64 {
    (index / water_requirement_per_day).max(0.0)
}

/// Which candidates made it into the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexComponents {
    pub used: Vec<String>,
    pub missing: Vec<String>,
}

/// Adds `ag_water_index` and `sustainable_farming_days` to the table.
///
/// Returns `None` (and adds nothing) if none of `candidates` is a column of
/// the table.
pub fn build_index(
    table: &mut CombinedTable,
    candidates: &[String],
    water_requirement_per_day: f64,
) -> Result<Option<IndexComponents>> {
    let (used, missing): (Vec<String>, Vec<String>) = candidates
        .iter()
        .cloned()
        .partition(|c| table.has_column(c));

    if used.is_empty() {
        return Ok(None);
    }

    let scored: Vec<Column> = used
        .iter()
        .filter_map(|name| table.column(name))
        .map(zscore)
        .collect();

    let index: Column = (0..table.len())
        .map(|row| {
            let present: Vec<f64> = scored.iter().filter_map(|c| c[row]).collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect();

    let farming_days = index
        .iter()
        .map(|v| v.map(|x| sustainable_farming_days(x, water_requirement_per_day)))
        .collect();

    table.insert_column(AG_WATER_INDEX, index)?;
    table.insert_column(SUSTAINABLE_FARMING_DAYS, farming_days)?;

    Ok(Some(IndexComponents { used, missing }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
