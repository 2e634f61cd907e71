//! Station File Verification Module
//!
//! Pre-flight check of the configured station list against the data
//! directory: which stations have a CSV export, whether it parses, and how
//! much usable data it holds.
//!
//! Use this before a full run to see which stations the pipeline will skip.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::ingest::cdec::load_station_csv;
use crate::model::{StationCategory, WaterError};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub data_dir: String,
    pub stations: Vec<StationVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationVerification {
    pub station_id: String,
    pub category: StationCategory,
    pub path: String,
    pub status: VerificationStatus,
    pub file_exists: bool,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub days: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    /// Every row parsed.
    Success,
    /// Usable data, but some rows were dropped during coercion.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Station Verification
// ============================================================================

pub fn verify_station_file(
    config: &RunConfig,
    category: StationCategory,
    station_id: &str,
) -> StationVerification {
    let path = config.station_path(station_id);
    let mut result = StationVerification {
        station_id: station_id.to_string(),
        category,
        path: path.display().to_string(),
        status: VerificationStatus::Failed,
        file_exists: path.is_file(),
        rows_read: 0,
        rows_dropped: 0,
        days: 0,
        first_day: None,
        last_day: None,
        error_message: None,
    };

    match load_station_csv(&path, station_id) {
        Ok(loaded) => {
            result.rows_read = loaded.rows_read;
            result.rows_dropped = loaded.rows_dropped;
            result.days = loaded.series.len();
            result.first_day = loaded.series.first_day();
            result.last_day = loaded.series.last_day();
            result.status = if loaded.rows_dropped == 0 {
                VerificationStatus::Success
            } else {
                VerificationStatus::PartialSuccess
            };
        }
        Err(WaterError::StationFileMissing { .. }) => {
            result.error_message = Some("file not found".to_string());
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn verify_station_files(config: &RunConfig) -> VerificationReport {
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        data_dir: config.data_dir.display().to_string(),
        stations: Vec::new(),
        summary: VerificationSummary::default(),
    };

    for (category, station_id) in config.stations.all() {
        let result = verify_station_file(config, category, station_id);
        report.summary.total += 1;
        match result.status {
            VerificationStatus::Success => report.summary.working += 1,
            VerificationStatus::PartialSuccess => {
                report.summary.working += 1;
                report.summary.partial += 1;
            }
            VerificationStatus::Failed => report.summary.failed += 1,
        }
        report.stations.push(result);
    }

    report
}

pub fn print_summary(report: &VerificationReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("📊 STATION FILE VERIFICATION ({})", report.data_dir);
    println!("═══════════════════════════════════════════════════════════");

    for station in &report.stations {
        match station.status {
            VerificationStatus::Success => println!(
                "  ✓ {:<6} {:<14} {} days",
                station.station_id,
                station.category.as_str(),
                station.days
            ),
            VerificationStatus::PartialSuccess => println!(
                "  ⚠ {:<6} {:<14} {} days ({} of {} rows dropped)",
                station.station_id,
                station.category.as_str(),
                station.days,
                station.rows_dropped,
                station.rows_read
            ),
            VerificationStatus::Failed => println!(
                "  ✗ {:<6} {:<14} {}",
                station.station_id,
                station.category.as_str(),
                station.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }

    println!();
    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Usable: {:.1}% ({}/{}, {} partial, {} failed)",
        success_rate,
        report.summary.working,
        report.summary.total,
        report.summary.partial,
        report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
