/// Station aggregation.
///
/// Joins per-station daily series into one combined table and derives the
/// group-level columns (category averages, snow-water ratio) from it.

use std::collections::BTreeSet;

use crate::model::{station_column, Result, StationSeries};
use crate::table::CombinedTable;

/// Outer-joins station series on the union of their days.
///
/// Each station becomes a `<STATION>_value` column, in input order. A
/// station with no reading on a given day has a missing cell there.
pub fn combine_stations(series: &[&StationSeries]) -> Result<CombinedTable> {
    let days: BTreeSet<_> = series.iter().flat_map(|s| s.days()).collect();
    let mut table = CombinedTable::new(days);

    for station in series {
        let values = table
            .days()
            .iter()
            .map(|day| station.value_on(*day))
            .collect();
        table.insert_column(&station.column_name(), values)?;
    }

    Ok(table)
}

/// Adds `out_column` as the row mean of whichever `station_ids` have a
/// column in the table.
///
/// Returns how many stations were averaged; `0` means none were available
/// and the column was not added.
pub fn add_group_average(
    table: &mut CombinedTable,
    station_ids: &[String],
    out_column: &str,
) -> Result<usize> {
    let available: Vec<String> = station_ids
        .iter()
        .map(|id| station_column(id))
        .filter(|col| table.has_column(col))
        .collect();

    if available.is_empty() {
        return Ok(0);
    }

    let names: Vec<&str> = available.iter().map(|s| s.as_str()).collect();
    let mean = table.row_mean(&names);
    table.insert_column(out_column, mean)?;
    Ok(available.len())
}

/// Adds `out_column = numerator / denominator` for two station columns.
///
/// Cells are missing where either input is missing or the denominator is
/// zero. Returns `false` (and adds nothing) if either column is absent.
pub fn add_ratio(
    table: &mut CombinedTable,
    numerator_id: &str,
    denominator_id: &str,
    out_column: &str,
) -> Result<bool> {
    let (Some(num), Some(den)) = (
        table.column(&station_column(numerator_id)),
        table.column(&station_column(denominator_id)),
    ) else {
        return Ok(false);
    };

    let ratio = num
        .iter()
        .zip(den)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
            _ => None,
        })
        .collect();

    table.insert_column(out_column, ratio)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
