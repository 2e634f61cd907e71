/// Station data ingestion.
///
/// Submodules:
/// - `cdec` — reads per-station CDEC CSV exports into daily series.

pub mod cdec;

use crate::config::RunConfig;
use crate::logging::{self, log_load_summary, log_station_failure, Stage};
use crate::model::StationCategory;

/// Result of loading every configured station.
#[derive(Debug, Clone, Default)]
pub struct StationLoad {
    /// Successfully loaded stations, in configuration order.
    pub loaded: Vec<(StationCategory, cdec::LoadedStation)>,
    /// Stations that were skipped, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl StationLoad {
    pub fn series(&self) -> Vec<&crate::model::StationSeries> {
        self.loaded.iter().map(|(_, l)| &l.series).collect()
    }
}

/// Loads every configured station, skipping (and logging) any that fail.
///
/// A missing or broken file never aborts the run; it just removes that
/// station from the combined table.
pub fn load_all_stations(config: &RunConfig) -> StationLoad {
    let mut load = StationLoad::default();
    let stations = config.stations.all();

    for (category, station_id) in &stations {
        let path = config.station_path(station_id);
        match cdec::load_station_csv(&path, station_id) {
            Ok(loaded) => {
                logging::info(
                    Stage::Loader,
                    Some(station_id),
                    &format!(
                        "Loaded {}: {} rows, {} days ({} rows dropped)",
                        station_id,
                        loaded.rows_read,
                        loaded.series.len(),
                        loaded.rows_dropped
                    ),
                );
                load.loaded.push((*category, loaded));
            }
            Err(e) => {
                log_station_failure(station_id, "load", &e);
                load.skipped.push((station_id.to_string(), e.to_string()));
            }
        }
    }

    log_load_summary(stations.len(), load.loaded.len(), load.skipped.len());
    load
}
