//! Central Valley agricultural water availability pipeline.
//!
//! Loads CDEC station exports, builds a z-scored water availability index,
//! forecasts it and writes a markdown report.

pub mod analysis;
pub mod config;
pub mod forecast;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod stations;
pub mod table;
pub mod verify;
