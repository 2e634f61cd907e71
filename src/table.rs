//! Day-indexed table of named columns.
//!
//! The combined table is the one shared structure every pipeline stage
//! reads and extends: an ordered day axis plus any number of columns with
//! exactly one optional value per day. Missing cells are `None`, never NaN.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;

use crate::model::{Result, WaterError};

/// Header of the day column in CSV exports of the table.
pub const DATE_COLUMN: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub type Column = Vec<Option<f64>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedTable {
    days: Vec<NaiveDate>,
    columns: IndexMap<String, Column>,
}

impl CombinedTable {
    /// Creates an empty-columned table over `days`, which are sorted and
    /// deduplicated.
    pub fn new(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        let days: BTreeSet<NaiveDate> = days.into_iter().collect();
        Self {
            days: days.into_iter().collect(),
            columns: IndexMap::new(),
        }
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Adds or replaces a column. Replacing keeps the original position.
    pub fn insert_column(&mut self, name: &str, values: Column) -> Result<()> {
        if values.len() != self.days.len() {
            return Err(WaterError::LengthMismatch {
                column: name.to_string(),
                expected: self.days.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Value at (`day`, `column`), if the day exists and the cell is present.
    pub fn get(&self, day: NaiveDate, column: &str) -> Option<f64> {
        let row = self.days.binary_search(&day).ok()?;
        self.columns.get(column)?.get(row).copied().flatten()
    }

    /// Reindexes onto every calendar day from the first to the last,
    /// inserting all-missing rows where the axis had holes.
    pub fn to_daily_frequency(&self) -> CombinedTable {
        let (Some(&first), Some(&last)) = (self.days.first(), self.days.last()) else {
            return self.clone();
        };

        let span = (last - first).num_days() as usize + 1;
        let full: Vec<NaiveDate> = (0..span)
            .map(|offset| first + Duration::days(offset as i64))
            .collect();

        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (name, values) in &self.columns {
            let mut reindexed = vec![None; span];
            for (day, value) in self.days.iter().zip(values) {
                let offset = (*day - first).num_days() as usize;
                reindexed[offset] = *value;
            }
            columns.insert(name.clone(), reindexed);
        }

        CombinedTable { days: full, columns }
    }

    /// Row-wise mean over `names`, skipping missing cells and unknown
    /// columns. `None` where every listed cell is missing.
    pub fn row_mean(&self, names: &[&str]) -> Column {
        let cols: Vec<&Column> = names.iter().filter_map(|n| self.columns.get(*n)).collect();
        (0..self.days.len())
            .map(|row| {
                let present: Vec<f64> = cols.iter().filter_map(|c| c[row]).collect();
                if present.is_empty() {
                    None
                } else {
                    Some(present.iter().sum::<f64>() / present.len() as f64)
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // CSV persistence
    // -----------------------------------------------------------------------

    /// Writes the table with a leading `date` column. Missing cells are
    /// written as empty fields; values use the shortest exact representation.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| WaterError::io(path, e))?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        let csv_err = |e: csv::Error| WaterError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(self.columns.keys().cloned());
        writer.write_record(&header).map_err(csv_err)?;

        for (row, day) in self.days.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(day.format(DATE_FORMAT).to_string());
            for values in self.columns.values() {
                record.push(values[row].map(|v| v.to_string()).unwrap_or_default());
            }
            writer.write_record(&record).map_err(csv_err)?;
        }

        let mut inner = writer.into_inner().map_err(|e| WaterError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        inner.flush().map_err(|e| WaterError::io(path, e))
    }

    /// Reads a table previously written by [`CombinedTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<CombinedTable> {
        let file = File::open(path).map_err(|e| WaterError::io(path, e))?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));
        let csv_err = |e: csv::Error| WaterError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let headers = reader.headers().map_err(csv_err)?.clone();
        if headers.get(0) != Some(DATE_COLUMN) {
            return Err(WaterError::Csv {
                path: path.to_path_buf(),
                message: format!("first column must be '{}'", DATE_COLUMN),
            });
        }
        let names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

        let mut days = Vec::new();
        let mut columns: Vec<Column> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let day_field = record.get(0).unwrap_or_default();
            let day = NaiveDate::parse_from_str(day_field, DATE_FORMAT).map_err(|e| {
                WaterError::Csv {
                    path: path.to_path_buf(),
                    message: format!("bad date '{}': {}", day_field, e),
                }
            })?;
            days.push(day);
            for (i, column) in columns.iter_mut().enumerate() {
                let cell = record.get(i + 1).unwrap_or_default().trim();
                column.push(cell.parse::<f64>().ok());
            }
        }

        if days.windows(2).any(|w| w[0] >= w[1]) {
            return Err(WaterError::Csv {
                path: path.to_path_buf(),
                message: "dates must be strictly increasing".to_string(),
            });
        }

        let mut table = CombinedTable {
            days,
            columns: IndexMap::new(),
        };
        for (name, values) in names.into_iter().zip(columns) {
            table.columns.insert(name, values);
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> CombinedTable {
        let mut table = CombinedTable::new([day(2023, 1, 1), day(2023, 1, 2), day(2023, 1, 4)]);
        table
            .insert_column("a", vec![Some(1.0), None, Some(3.0)])
            .unwrap();
        table
            .insert_column("b", vec![Some(0.5), Some(0.25), None])
            .unwrap();
        table
    }

    #[test]
    fn test_new_sorts_and_dedups_days() {
        let table = CombinedTable::new([day(2023, 1, 3), day(2023, 1, 1), day(2023, 1, 3)]);
        assert_eq!(table.days(), &[day(2023, 1, 1), day(2023, 1, 3)]);
    }

    #[test]
    fn test_insert_column_rejects_wrong_length() {
        let mut table = sample();
        let result = table.insert_column("c", vec![Some(1.0)]);
        assert!(matches!(result, Err(WaterError::LengthMismatch { expected: 3, got: 1, .. })));
    }

    #[test]
    fn test_to_daily_frequency_fills_calendar_holes() {
        let daily = sample().to_daily_frequency();
        assert_eq!(daily.len(), 4);
        assert_eq!(daily.days()[2], day(2023, 1, 3));
        assert_eq!(daily.column("a").unwrap(), &[Some(1.0), None, None, Some(3.0)]);
        assert_eq!(daily.get(day(2023, 1, 4), "a"), Some(3.0));
    }

    #[test]
    fn test_row_mean_skips_missing() {
        let table = sample();
        assert_eq!(
            table.row_mean(&["a", "b", "missing"]),
            vec![Some(0.75), Some(0.25), Some(3.0)]
        );
    }

    #[test]
    fn test_csv_round_trip_preserves_present_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_data.csv");
        let mut table = sample();
        table
            .insert_column("c", vec![Some(1.0 / 3.0), Some(-2.5e-7), Some(12345.678)])
            .unwrap();

        table.write_csv(&path).unwrap();
        let reloaded = CombinedTable::read_csv(&path).unwrap();

        assert_eq!(reloaded.days(), table.days());
        let names: Vec<_> = reloaded.column_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        for name in ["a", "b", "c"] {
            for (x, y) in table.column(name).unwrap().iter().zip(reloaded.column(name).unwrap()) {
                match (x, y) {
                    (Some(x), Some(y)) => assert!((x - y).abs() < 1e-12),
                    (None, None) => {}
                    other => panic!("cell mismatch in {}: {:?}", name, other),
                }
            }
        }
    }
}
