/// Data organization and feature engineering for the water availability index.
///
/// Submodules:
/// - `aggregate` — joins station series and derives group-level columns.
/// - `features` — interpolation, calendar and rolling features.
/// - `gaps` — gap filling and longest contiguous segment detection.
/// - `index` — z-scored composite index and sustainable farming days.
/// - `stats` — summary statistics and correlation.

pub mod aggregate;
pub mod features;
pub mod gaps;
pub mod index;
pub mod stats;
