/// Station registry for the Central Valley water availability service.
///
/// Defines the canonical list of CDEC stations whose exports feed the
/// composite index, grouped by what they measure. This is the default for
/// the `[stations]` configuration section; a config file may replace any
/// category's list, but every other module should obtain station ids from
/// the run configuration rather than hardcoding them.

use crate::model::StationCategory;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// A single CDEC station.
pub struct Station {
    /// CDEC station id as it appears in the export filename, e.g. `YDR`.
    /// Snow pillows carry the sensor number as a suffix (`YBP3`, `YBP18`).
    pub id: &'static str,
    /// Which group average or index component this station feeds.
    pub category: StationCategory,
}

/// All stations used by default, in category order.
pub static STATION_REGISTRY: &[Station] = &[
    // River stage
    Station { id: "YDR", category: StationCategory::RiverStage },
    Station { id: "TIS", category: StationCategory::RiverStage },
    Station { id: "SUT", category: StationCategory::RiverStage },
    Station { id: "SJP", category: StationCategory::RiverStage },
    Station { id: "SJN", category: StationCategory::RiverStage },
    Station { id: "SJF", category: StationCategory::RiverStage },
    Station { id: "SBS", category: StationCategory::RiverStage },
    Station { id: "RVB", category: StationCategory::RiverStage },
    Station { id: "NIC", category: StationCategory::RiverStage },
    Station { id: "LIS", category: StationCategory::RiverStage },
    Station { id: "KNL", category: StationCategory::RiverStage },
    Station { id: "GRL", category: StationCategory::RiverStage },
    Station { id: "FRE", category: StationCategory::RiverStage },
    Station { id: "FPT", category: StationCategory::RiverStage },
    Station { id: "DLT", category: StationCategory::RiverStage },
    Station { id: "BTC", category: StationCategory::RiverStage },
    // Flow
    Station { id: "YPB", category: StationCategory::Flow },
    Station { id: "WLK", category: StationCategory::Flow },
    Station { id: "VON", category: StationCategory::Flow },
    Station { id: "VIN", category: StationCategory::Flow },
    // Groundwater
    Station { id: "YR1", category: StationCategory::Groundwater },
    // Snow (depth sensor 18, water content sensor 3)
    Station { id: "YBP18", category: StationCategory::Snow },
    Station { id: "YBP3", category: StationCategory::Snow },
    // Precipitation
    Station { id: "WWS", category: StationCategory::Precipitation },
];

/// Returns the station ids registered under `category`, in registry order.
pub fn stations_in_category(category: StationCategory) -> Vec<&'static str> {
    STATION_REGISTRY
        .iter()
        .filter(|s| s.category == category)
        .map(|s| s.id)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_station_ids_are_valid_cdec_format() {
        // CDEC ids are three uppercase alphanumerics, optionally followed by
        // a sensor suffix. Anything else will never match an export file.
        for station in STATION_REGISTRY {
            assert!(
                (3..=5).contains(&station.id.len()),
                "station id '{}' should be 3-5 characters",
                station.id
            );
            assert!(
                station.id[..3].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
                "station id '{}' should start with an uppercase CDEC code",
                station.id
            );
        }
    }

    #[test]
    fn test_no_duplicate_station_ids() {
        let mut seen = std::collections::HashSet::new();
        for station in STATION_REGISTRY {
            assert!(
                seen.insert(station.id),
                "duplicate station id '{}' found in STATION_REGISTRY",
                station.id
            );
        }
    }

    #[test]
    fn test_category_sizes() {
        assert_eq!(stations_in_category(StationCategory::RiverStage).len(), 16);
        assert_eq!(stations_in_category(StationCategory::Flow).len(), 4);
        assert_eq!(stations_in_category(StationCategory::Groundwater), vec!["YR1"]);
        assert_eq!(stations_in_category(StationCategory::Snow), vec!["YBP18", "YBP3"]);
        assert_eq!(stations_in_category(StationCategory::Precipitation), vec!["WWS"]);
    }

    #[test]
    fn test_every_category_has_a_station() {
        for category in StationCategory::ALL {
            assert!(
                !stations_in_category(category).is_empty(),
                "category '{}' has no registered stations",
                category
            );
        }
    }
}
