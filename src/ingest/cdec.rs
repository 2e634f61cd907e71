/// CDEC (California Data Exchange Center) station export reader
///
/// Each station is exported as its own CSV file. The files carry more
/// columns than we use (STATION_ID, DURATION, SENSOR_NUMBER, SENSOR_TYPE,
/// DATE TIME, OBS DATE, VALUE, DATA_FLAG, UNITS); only `DATE TIME` and
/// `VALUE` are read, located by header name.
///
/// Example rows:
/// ```text
/// STATION_ID,DURATION,SENSOR_NUMBER,SENSOR_TYPE,DATE TIME,OBS DATE,VALUE,DATA_FLAG,UNITS
/// YDR,H,1,RIV STG,20230101 0000,20230101 0000,12.45, ,FEET
/// YDR,H,1,RIV STG,20230101 0100,20230101 0100,---, ,FEET
/// ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::model::{
    Result, StationReading, StationSeries, WaterError, COL_DATE_TIME, COL_VALUE,
    DATE_TIME_FORMAT,
};

// ============================================================================
// Load Results
// ============================================================================

/// A station export after parsing and daily resampling.
#[derive(Debug, Clone)]
pub struct LoadedStation {
    pub series: StationSeries,
    /// Data rows present in the file (header excluded).
    pub rows_read: usize,
    /// Rows dropped because the timestamp or value failed to parse.
    pub rows_dropped: usize,
}

// ============================================================================
// Loading
// ============================================================================

/// Loads `<data_dir>/<station_id>.csv` style exports.
///
/// # Errors
/// - `StationFileMissing` if the path does not exist
/// - `Csv` / `MissingColumn` for structurally broken files
/// - `NoUsableRows` if every row was dropped during coercion
pub fn load_station_csv(path: &Path, station_id: &str) -> Result<LoadedStation> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WaterError::StationFileMissing {
                station: station_id.to_string(),
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(WaterError::io(path, e)),
    };

    parse_station_csv(BufReader::new(file), station_id, path)
}

/// Parses an export from any reader. `origin` is only used in error messages.
pub fn parse_station_csv<R: Read>(
    reader: R,
    station_id: &str,
    origin: &Path,
) -> Result<LoadedStation> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| WaterError::Csv {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?
        .clone();

    let column_index = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| WaterError::MissingColumn {
                station: station_id.to_string(),
                column: name.to_string(),
            })
    };
    let time_idx = column_index(COL_DATE_TIME)?;
    let value_idx = column_index(COL_VALUE)?;

    let mut readings = Vec::new();
    let mut rows_read = 0;
    let mut rows_dropped = 0;

    for record in csv_reader.records() {
        let record = record.map_err(|e| WaterError::Csv {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        rows_read += 1;

        let timestamp = record.get(time_idx).and_then(parse_timestamp);
        let value = record.get(value_idx).and_then(parse_value);

        match (timestamp, value) {
            (Some(timestamp), Some(value)) => readings.push(StationReading { timestamp, value }),
            _ => rows_dropped += 1,
        }
    }

    if readings.is_empty() {
        return Err(WaterError::NoUsableRows(station_id.to_string()));
    }

    Ok(LoadedStation {
        series: StationSeries::from_readings(station_id, &readings),
        rows_read,
        rows_dropped,
    })
}

/// Parses a CDEC `YYYYMMDD HHMM` timestamp. Returns `None` on any failure.
pub fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(field.trim(), DATE_TIME_FORMAT).ok()
}

/// Coerces a value cell to `f64`. CDEC writes `---` for missing readings;
/// that, blanks, and non-finite numbers all yield `None`.
pub fn parse_value(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "STATION_ID,DURATION,SENSOR_NUMBER,SENSOR_TYPE,DATE TIME,OBS DATE,VALUE,DATA_FLAG,UNITS";

    fn parse(text: &str) -> Result<LoadedStation> {
        parse_station_csv(text.as_bytes(), "YDR", Path::new("YDR.csv"))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_cdec_export_and_resamples_daily() {
        let text = format!(
            "{}\n\
             YDR,H,1,RIV STG,20230101 0000,20230101 0000,10.0, ,FEET\n\
             YDR,H,1,RIV STG,20230101 1200,20230101 1200,12.0, ,FEET\n\
             YDR,H,1,RIV STG,20230102 0000,20230102 0000,11.5, ,FEET\n",
            HEADER
        );
        let loaded = parse(&text).expect("well-formed export");

        assert_eq!(loaded.rows_read, 3);
        assert_eq!(loaded.rows_dropped, 0);
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.series.value_on(day(2023, 1, 1)), Some(11.0));
        assert_eq!(loaded.series.value_on(day(2023, 1, 2)), Some(11.5));
    }

    #[test]
    fn test_placeholder_and_bad_timestamps_are_dropped() {
        let text = format!(
            "{}\n\
             YDR,H,1,RIV STG,20230101 0000,20230101 0000,---, ,FEET\n\
             YDR,H,1,RIV STG,not a date,20230101 0100,9.0, ,FEET\n\
             YDR,H,1,RIV STG,20230101 0200,20230101 0200,8.0, ,FEET\n\
             YDR,H,1,RIV STG,20230101 0300,20230101 0300,, ,FEET\n",
            HEADER
        );
        let loaded = parse(&text).expect("partially usable export");

        assert_eq!(loaded.rows_read, 4);
        assert_eq!(loaded.rows_dropped, 3);
        assert_eq!(loaded.series.value_on(day(2023, 1, 1)), Some(8.0));
    }

    #[test]
    fn test_minimal_two_column_file_is_accepted() {
        let loaded = parse("DATE TIME,VALUE\n20230105 0800,3.5\n").expect("minimal export");
        assert_eq!(loaded.series.value_on(day(2023, 1, 5)), Some(3.5));
    }

    #[test]
    fn test_missing_value_column_is_an_error() {
        let result = parse("DATE TIME,READING\n20230105 0800,3.5\n");
        assert!(
            matches!(result, Err(WaterError::MissingColumn { ref column, .. }) if column == "VALUE"),
            "expected MissingColumn, got {:?}",
            result
        );
    }

    #[test]
    fn test_all_rows_dropped_is_no_usable_rows() {
        let result = parse("DATE TIME,VALUE\n20230105 0800,---\n");
        assert!(matches!(result, Err(WaterError::NoUsableRows(_))));
    }

    #[test]
    fn test_missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_station_csv(&dir.path().join("NOPE.csv"), "NOPE");
        assert!(matches!(result, Err(WaterError::StationFileMissing { .. })));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "DATE TIME,VALUE").unwrap();
        writeln!(file, "20231231 2300,1.0").unwrap();
        writeln!(file, "20240101 0100,2.0").unwrap();

        let loaded = load_station_csv(file.path(), "WWS").unwrap();
        let days: Vec<_> = loaded.series.days().collect();
        assert_eq!(days, vec![day(2023, 12, 31), day(2024, 1, 1)]);
    }

    #[test]
    fn test_parse_value_rejects_non_finite() {
        assert_eq!(parse_value(" 4.25 "), Some(4.25));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("---"), None);
    }
}
